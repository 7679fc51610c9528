pub mod admin;
pub mod backend;
pub mod error;
pub mod http;
pub mod types;

use std::sync::Arc;

pub use admin::{
    ComponentHealth, ERROR_STATUS, HEALTHY_STATUS, LogEntry, LogQuery, SystemStats, SystemStatus,
};
pub use backend::{
    AdminBackend, BoxFuture, ChatBackend, ClientConfig, DEFAULT_BASE_URL, DEFAULT_USER_AGENT,
};
pub use error::{ApiError, ApiResult, UNKNOWN_ERROR_DETAIL};
pub use http::HttpBackend;
pub use types::{
    AuthMode, AuthReply, Conversation, ConversationHistory, ConversationId, Credentials, Message,
    SendReply, SendRequest, SenderType, Timestamp, User,
};

/// Builds the HTTP backend shared by the chat and admin surfaces.
pub fn create_backend(config: ClientConfig) -> ApiResult<Arc<HttpBackend>> {
    tracing::info!(base_url = %config.base_url, "creating chat server backend");
    HttpBackend::new(config).map(Arc::new)
}
