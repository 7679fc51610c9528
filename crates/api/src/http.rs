use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use url::Url;

use super::admin::{
    LogEntry, LogListEnvelope, LogQuery, SystemStats, SystemStatus, UserListEnvelope,
};
use super::backend::{AdminBackend, BoxFuture, ChatBackend, ClientConfig};
use super::error::{
    ApiResult, AuthRequiredSnafu, BuildClientSnafu, DecodeSnafu, InvalidUrlSnafu,
    StatusSnafu, TransportSnafu,
};
use super::types::{
    AuthMode, AuthReply, Conversation, ConversationEnvelope, ConversationHistory, ConversationId,
    ConversationListEnvelope, Credentials, CurrentUserEnvelope, ErrorBody, SendReply,
    SendRequest, TitleBody, User,
};

/// Chat server client over HTTP.
///
/// The underlying client keeps a cookie jar, so the session cookie set by login
/// travels with every later request made through the same backend.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let base_url = normalize_base_url(&config.base_url)?;

        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        let client = builder.build().context(BuildClientSnafu {
            stage: "http-backend-build-client",
        })?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str, stage: &'static str) -> ApiResult<Url> {
        self.base_url.join(path).context(InvalidUrlSnafu {
            stage,
            raw: path.to_string(),
        })
    }

    fn request(&self, method: Method, path: &str, stage: &'static str) -> ApiResult<RequestBuilder> {
        let url = self.endpoint(path, stage)?;
        Ok(self.client.request(method, url))
    }

    /// Sends the request and returns the raw body of a 2xx response.
    async fn dispatch(&self, stage: &'static str, request: RequestBuilder) -> ApiResult<String> {
        let response = request.send().await.context(TransportSnafu { stage })?;
        let status = response.status();
        let body = response.text().await.context(TransportSnafu { stage })?;

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!(stage, "server rejected the session");
            return AuthRequiredSnafu {
                stage,
                message: error_field(&body),
            }
            .fail();
        }

        if !status.is_success() {
            let message = error_field(&body);
            tracing::warn!(
                stage,
                status = status.as_u16(),
                server_error = message.as_deref().unwrap_or(""),
                "chat server returned an error status"
            );
            return StatusSnafu {
                stage,
                status: status.as_u16(),
                message,
            }
            .fail();
        }

        Ok(body)
    }

    async fn execute<T>(&self, stage: &'static str, request: RequestBuilder) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let body = self.dispatch(stage, request).await?;
        serde_json::from_str(&body).context(DecodeSnafu { stage })
    }
}

impl ChatBackend for HttpBackend {
    fn current_user(&self) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move {
            let stage = "current-user";
            let request = self.request(Method::GET, "api/chat/me", stage)?;
            let envelope: CurrentUserEnvelope = self.execute(stage, request).await?;
            Ok(envelope.user)
        })
    }

    fn authenticate<'a>(
        &'a self,
        mode: AuthMode,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, ApiResult<AuthReply>> {
        Box::pin(async move {
            let stage = match mode {
                AuthMode::Login => "login",
                AuthMode::Register => "register",
            };
            let request = self
                .request(Method::POST, mode.path(), stage)?
                .json(credentials);
            self.execute(stage, request).await
        })
    }

    fn logout(&self) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            let stage = "logout";
            let request = self.request(Method::POST, "api/chat/logout", stage)?;
            self.dispatch(stage, request).await?;
            Ok(())
        })
    }

    fn list_conversations(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>> {
        Box::pin(async move {
            let stage = "list-conversations";
            let request = self.request(Method::GET, "api/chat/conversations", stage)?;
            let envelope: ConversationListEnvelope = self.execute(stage, request).await?;
            Ok(envelope.conversations)
        })
    }

    fn conversation_history<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
    ) -> BoxFuture<'a, ApiResult<ConversationHistory>> {
        Box::pin(async move {
            let stage = "conversation-history";
            let path = format!("api/chat/conversations/{conversation_id}/messages");
            let request = self.request(Method::GET, &path, stage)?;
            self.execute(stage, request).await
        })
    }

    fn rename_conversation<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
        title: &'a str,
    ) -> BoxFuture<'a, ApiResult<Conversation>> {
        Box::pin(async move {
            let stage = "rename-conversation";
            let path = format!("api/chat/conversations/{conversation_id}");
            let request = self
                .request(Method::PUT, &path, stage)?
                .json(&TitleBody { title: Some(title) });
            let envelope: ConversationEnvelope = self.execute(stage, request).await?;
            Ok(envelope.conversation)
        })
    }

    fn create_conversation<'a>(
        &'a self,
        title: Option<&'a str>,
    ) -> BoxFuture<'a, ApiResult<Conversation>> {
        Box::pin(async move {
            let stage = "create-conversation";
            let request = self
                .request(Method::POST, "api/chat/new-conversation", stage)?
                .json(&TitleBody { title });
            let envelope: ConversationEnvelope = self.execute(stage, request).await?;
            Ok(envelope.conversation)
        })
    }

    fn send_message(&self, request: SendRequest) -> BoxFuture<'_, ApiResult<SendReply>> {
        Box::pin(async move {
            let stage = "send-message";
            let http_request = self
                .request(Method::POST, "api/chat/send", stage)?
                .json(&request);
            self.execute(stage, http_request).await
        })
    }
}

impl AdminBackend for HttpBackend {
    fn system_status(&self) -> BoxFuture<'_, ApiResult<SystemStatus>> {
        Box::pin(async move {
            let stage = "admin-status";
            let request = self.request(Method::GET, "api/admin/status", stage)?;
            self.execute(stage, request).await
        })
    }

    fn system_stats(&self) -> BoxFuture<'_, ApiResult<SystemStats>> {
        Box::pin(async move {
            let stage = "admin-stats";
            let request = self.request(Method::GET, "api/admin/stats", stage)?;
            self.execute(stage, request).await
        })
    }

    fn logs(&self, query: LogQuery) -> BoxFuture<'_, ApiResult<Vec<LogEntry>>> {
        Box::pin(async move {
            let stage = "admin-logs";
            let request = self
                .request(Method::GET, "api/admin/logs", stage)?
                .query(&query.query_pairs());
            let envelope: LogListEnvelope = self.execute(stage, request).await?;
            Ok(envelope.logs)
        })
    }

    fn users(&self, limit: Option<u32>) -> BoxFuture<'_, ApiResult<Vec<User>>> {
        Box::pin(async move {
            let stage = "admin-users";
            let mut request = self.request(Method::GET, "api/admin/users", stage)?;
            if let Some(limit) = limit {
                request = request.query(&[("limit", limit)]);
            }
            let envelope: UserListEnvelope = self.execute(stage, request).await?;
            Ok(envelope.users)
        })
    }
}

fn normalize_base_url(raw: &str) -> ApiResult<Url> {
    let mut base_url = Url::parse(raw.trim()).context(InvalidUrlSnafu {
        stage: "parse-base-url",
        raw: raw.to_string(),
    })?;

    // Endpoint paths are joined relatively, so a mount prefix like `/chatbot` must end in `/`.
    if !base_url.path().ends_with('/') {
        let path = format!("{}/", base_url.path());
        base_url.set_path(&path);
    }

    Ok(base_url)
}

fn error_field(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
}
