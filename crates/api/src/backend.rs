use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::admin::{LogEntry, LogQuery, SystemStats, SystemStatus};
use super::error::ApiResult;
use super::types::{
    AuthMode, AuthReply, Conversation, ConversationHistory, ConversationId, Credentials,
    SendReply, SendRequest, User,
};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000/";
pub const DEFAULT_USER_AGENT: &str = concat!("parlor/", env!("CARGO_PKG_VERSION"));

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Connection settings handed to a backend at construction time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    /// `None` keeps the transport default.
    pub request_timeout: Option<Duration>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_URL)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().to_string(),
            request_timeout: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// Authentication and conversation endpoints of the chat server.
pub trait ChatBackend: Send + Sync {
    fn current_user(&self) -> BoxFuture<'_, ApiResult<User>>;
    fn authenticate<'a>(
        &'a self,
        mode: AuthMode,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, ApiResult<AuthReply>>;
    fn logout(&self) -> BoxFuture<'_, ApiResult<()>>;
    fn list_conversations(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>>;
    fn conversation_history<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
    ) -> BoxFuture<'a, ApiResult<ConversationHistory>>;
    fn rename_conversation<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
        title: &'a str,
    ) -> BoxFuture<'a, ApiResult<Conversation>>;
    fn create_conversation<'a>(
        &'a self,
        title: Option<&'a str>,
    ) -> BoxFuture<'a, ApiResult<Conversation>>;
    fn send_message(&self, request: SendRequest) -> BoxFuture<'_, ApiResult<SendReply>>;
}

/// Read-only admin endpoints.
pub trait AdminBackend: Send + Sync {
    fn system_status(&self) -> BoxFuture<'_, ApiResult<SystemStatus>>;
    fn system_stats(&self) -> BoxFuture<'_, ApiResult<SystemStats>>;
    fn logs(&self, query: LogQuery) -> BoxFuture<'_, ApiResult<Vec<LogEntry>>>;
    fn users(&self, limit: Option<u32>) -> BoxFuture<'_, ApiResult<Vec<User>>>;
}
