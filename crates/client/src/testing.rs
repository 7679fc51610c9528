use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use parlor_api::{
    AdminBackend, ApiError, ApiResult, AuthMode, AuthReply, BoxFuture, ChatBackend, Conversation,
    ConversationHistory, ConversationId, Credentials, LogEntry, LogQuery, SendReply, SendRequest,
    SystemStats, SystemStatus, Timestamp, User,
};
use tokio::sync::oneshot;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CurrentUser,
    Authenticate { mode: AuthMode, username: String },
    Logout,
    ListConversations,
    ConversationHistory(ConversationId),
    RenameConversation { id: ConversationId, title: String },
    CreateConversation { title: Option<String> },
    SendMessage(SendRequest),
    SystemStatus,
    SystemStats,
    Logs(LogQuery),
    Users(Option<u32>),
}

#[derive(Debug, Clone)]
pub enum Failure {
    Unauthorized,
    Status(u16, Option<String>),
}

impl Failure {
    fn into_error(self, stage: &'static str) -> ApiError {
        match self {
            Self::Unauthorized => ApiError::AuthRequired {
                stage,
                message: None,
            },
            Self::Status(401, message) => ApiError::AuthRequired { stage, message },
            Self::Status(status, message) => ApiError::Status {
                stage,
                status,
                message,
            },
        }
    }
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    current_user: Option<User>,
    current_user_failure: Option<Failure>,
    authenticate_failure: Option<Failure>,
    logout_failure: Option<Failure>,
    conversations: Vec<Conversation>,
    conversations_failure: Option<Failure>,
    histories: HashMap<ConversationId, ConversationHistory>,
    history_gates: HashMap<ConversationId, oneshot::Receiver<()>>,
    history_failure: Option<Failure>,
    rename_failure: Option<Failure>,
    create_failure: Option<Failure>,
    created: u64,
    send_replies: VecDeque<Result<SendReply, Failure>>,
    send_gates: VecDeque<oneshot::Receiver<()>>,
    status: Option<SystemStatus>,
    status_failure: Option<Failure>,
    stats: SystemStats,
    logs: Vec<LogEntry>,
    users: Vec<User>,
}

/// In-memory chat server with a call log and hold-able replies.
pub struct ScriptedBackend {
    script: Mutex<Script>,
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script::default()),
        }
    }

    pub fn server_time() -> Timestamp {
        Timestamp::parse("2024-03-01T10:00:05").unwrap()
    }

    pub fn user(id: u64, username: &str) -> User {
        User {
            id,
            username: username.to_string(),
            email: None,
            is_active: true,
            created_at: None,
        }
    }

    pub fn conversation(id: u64, title: &str) -> Conversation {
        Conversation {
            id: ConversationId::from(id),
            title: title.to_string(),
            message_count: 0,
            updated_at: Some(Self::server_time()),
            created_at: Some(Self::server_time()),
        }
    }

    pub fn reply(response: &str, conversation_id: Option<u64>) -> SendReply {
        SendReply {
            response: response.to_string(),
            conversation_id: conversation_id.map(ConversationId::from),
            timestamp: Self::server_time(),
            mode: None,
            warning: None,
        }
    }

    pub fn log(level: &str, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Some(Self::server_time()),
            level: level.to_string(),
            module: Some("app".to_string()),
            message: message.to_string(),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn send_requests(&self) -> Vec<SendRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::SendMessage(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub fn set_current_user(&self, user: User) {
        let mut script = self.script.lock();
        script.current_user = Some(user);
        script.current_user_failure = None;
    }

    pub fn fail_current_user(&self, failure: Failure) {
        self.script.lock().current_user_failure = Some(failure);
    }

    pub fn fail_authenticate(&self, failure: Failure) {
        self.script.lock().authenticate_failure = Some(failure);
    }

    pub fn fail_logout(&self, failure: Failure) {
        self.script.lock().logout_failure = Some(failure);
    }

    pub fn set_conversations(&self, conversations: Vec<Conversation>) {
        let mut script = self.script.lock();
        script.conversations = conversations;
        script.conversations_failure = None;
    }

    pub fn fail_conversations(&self, failure: Failure) {
        self.script.lock().conversations_failure = Some(failure);
    }

    pub fn set_history(&self, history: ConversationHistory) {
        self.script
            .lock()
            .histories
            .insert(history.conversation.id.clone(), history);
    }

    /// Holds the next history response for `id` until the sender fires or drops.
    pub fn hold_history(&self, id: ConversationId) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.script.lock().history_gates.insert(id, receiver);
        sender
    }

    pub fn fail_history(&self, failure: Failure) {
        self.script.lock().history_failure = Some(failure);
    }

    pub fn fail_create(&self, failure: Failure) {
        self.script.lock().create_failure = Some(failure);
    }

    pub fn fail_rename(&self, failure: Failure) {
        self.script.lock().rename_failure = Some(failure);
    }

    pub fn push_send_reply(&self, reply: Result<SendReply, Failure>) {
        self.script.lock().send_replies.push_back(reply);
    }

    /// Holds the next send response until the sender fires or drops.
    pub fn hold_next_send(&self) -> oneshot::Sender<()> {
        let (sender, receiver) = oneshot::channel();
        self.script.lock().send_gates.push_back(receiver);
        sender
    }

    pub fn set_status(&self, status: SystemStatus) {
        let mut script = self.script.lock();
        script.status = Some(status);
        script.status_failure = None;
    }

    pub fn fail_status(&self, failure: Failure) {
        self.script.lock().status_failure = Some(failure);
    }

    pub fn set_stats(&self, stats: SystemStats) {
        self.script.lock().stats = stats;
    }

    pub fn set_logs(&self, logs: Vec<LogEntry>) {
        self.script.lock().logs = logs;
    }

    pub fn set_users(&self, users: Vec<User>) {
        self.script.lock().users = users;
    }

    fn record(&self, call: Call) {
        self.script.lock().calls.push(call);
    }
}

async fn wait_gate(gate: Option<oneshot::Receiver<()>>) {
    if let Some(gate) = gate {
        let _ = gate.await;
    }
}

impl ChatBackend for ScriptedBackend {
    fn current_user(&self) -> BoxFuture<'_, ApiResult<User>> {
        Box::pin(async move {
            self.record(Call::CurrentUser);
            let script = self.script.lock();
            if let Some(failure) = script.current_user_failure.clone() {
                return Err(failure.into_error("current-user"));
            }
            script
                .current_user
                .clone()
                .ok_or_else(|| Failure::Unauthorized.into_error("current-user"))
        })
    }

    fn authenticate<'a>(
        &'a self,
        mode: AuthMode,
        credentials: &'a Credentials,
    ) -> BoxFuture<'a, ApiResult<AuthReply>> {
        Box::pin(async move {
            self.record(Call::Authenticate {
                mode,
                username: credentials.username.clone(),
            });
            if let Some(failure) = self.script.lock().authenticate_failure.clone() {
                return Err(failure.into_error("login"));
            }
            let message = match mode {
                AuthMode::Login => "Login successful",
                AuthMode::Register => "Registration successful",
            };
            Ok(AuthReply {
                message: Some(message.to_string()),
                user: Self::user(1, &credentials.username),
            })
        })
    }

    fn logout(&self) -> BoxFuture<'_, ApiResult<()>> {
        Box::pin(async move {
            self.record(Call::Logout);
            match self.script.lock().logout_failure.clone() {
                Some(failure) => Err(failure.into_error("logout")),
                None => Ok(()),
            }
        })
    }

    fn list_conversations(&self) -> BoxFuture<'_, ApiResult<Vec<Conversation>>> {
        Box::pin(async move {
            self.record(Call::ListConversations);
            let script = self.script.lock();
            match script.conversations_failure.clone() {
                Some(failure) => Err(failure.into_error("list-conversations")),
                None => Ok(script.conversations.clone()),
            }
        })
    }

    fn conversation_history<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
    ) -> BoxFuture<'a, ApiResult<ConversationHistory>> {
        Box::pin(async move {
            self.record(Call::ConversationHistory(conversation_id.clone()));
            let gate = self.script.lock().history_gates.remove(conversation_id);
            wait_gate(gate).await;

            let script = self.script.lock();
            if let Some(failure) = script.history_failure.clone() {
                return Err(failure.into_error("conversation-history"));
            }
            script
                .histories
                .get(conversation_id)
                .cloned()
                .ok_or_else(|| {
                    Failure::Status(404, Some("Conversation not found".to_string()))
                        .into_error("conversation-history")
                })
        })
    }

    fn rename_conversation<'a>(
        &'a self,
        conversation_id: &'a ConversationId,
        title: &'a str,
    ) -> BoxFuture<'a, ApiResult<Conversation>> {
        Box::pin(async move {
            self.record(Call::RenameConversation {
                id: conversation_id.clone(),
                title: title.to_string(),
            });
            let script = self.script.lock();
            if let Some(failure) = script.rename_failure.clone() {
                return Err(failure.into_error("rename-conversation"));
            }
            let mut conversation = script
                .conversations
                .iter()
                .find(|conversation| &conversation.id == conversation_id)
                .cloned()
                .unwrap_or_else(|| Self::conversation(0, title));
            conversation.id = conversation_id.clone();
            conversation.title = title.to_string();
            Ok(conversation)
        })
    }

    fn create_conversation<'a>(
        &'a self,
        title: Option<&'a str>,
    ) -> BoxFuture<'a, ApiResult<Conversation>> {
        Box::pin(async move {
            self.record(Call::CreateConversation {
                title: title.map(str::to_string),
            });
            let mut script = self.script.lock();
            if let Some(failure) = script.create_failure.clone() {
                return Err(failure.into_error("create-conversation"));
            }
            script.created += 1;
            let id = 1000 + script.created;
            Ok(Self::conversation(id, title.unwrap_or("New Conversation")))
        })
    }

    fn send_message(&self, request: SendRequest) -> BoxFuture<'_, ApiResult<SendReply>> {
        Box::pin(async move {
            self.record(Call::SendMessage(request.clone()));
            let gate = self.script.lock().send_gates.pop_front();
            wait_gate(gate).await;

            let scripted = self.script.lock().send_replies.pop_front();
            match scripted {
                Some(Ok(reply)) => Ok(reply),
                Some(Err(failure)) => Err(failure.into_error("send-message")),
                None => Ok(SendReply {
                    response: format!("echo: {}", request.message),
                    conversation_id: request
                        .conversation_id
                        .or_else(|| Some(ConversationId::from(1))),
                    timestamp: Self::server_time(),
                    mode: None,
                    warning: None,
                }),
            }
        })
    }
}

impl AdminBackend for ScriptedBackend {
    fn system_status(&self) -> BoxFuture<'_, ApiResult<SystemStatus>> {
        Box::pin(async move {
            self.record(Call::SystemStatus);
            let script = self.script.lock();
            if let Some(failure) = script.status_failure.clone() {
                return Err(failure.into_error("admin-status"));
            }
            script
                .status
                .clone()
                .ok_or_else(|| Failure::Status(500, None).into_error("admin-status"))
        })
    }

    fn system_stats(&self) -> BoxFuture<'_, ApiResult<SystemStats>> {
        Box::pin(async move {
            self.record(Call::SystemStats);
            Ok(self.script.lock().stats.clone())
        })
    }

    fn logs(&self, query: LogQuery) -> BoxFuture<'_, ApiResult<Vec<LogEntry>>> {
        Box::pin(async move {
            self.record(Call::Logs(query.clone()));
            let script = self.script.lock();
            let limit = query.limit.map_or(usize::MAX, |limit| limit as usize);
            Ok(script
                .logs
                .iter()
                .filter(|entry| {
                    query
                        .level
                        .as_deref()
                        .is_none_or(|level| entry.level == level)
                })
                .take(limit)
                .cloned()
                .collect())
        })
    }

    fn users(&self, limit: Option<u32>) -> BoxFuture<'_, ApiResult<Vec<User>>> {
        Box::pin(async move {
            self.record(Call::Users(limit));
            let script = self.script.lock();
            let limit = limit.map_or(usize::MAX, |limit| limit as usize);
            Ok(script.users.iter().take(limit).cloned().collect())
        })
    }
}
