use std::sync::Arc;

use parlor_api::{ApiError, ChatBackend, Conversation, ConversationId, SendReply, Timestamp};
use snafu::ensure;
use tokio::sync::watch;

use super::state::{ChatSnapshot, ChatState, ReplyApplied, SendAdmission, SendTag};
use crate::error::{Banner, ChatError, ChatResult, FailureKind, ValidationSnafu};
use crate::observed::Observed;
use crate::session::SessionStore;

pub const CONVERSATIONS_AUTH_MESSAGE: &str = "Please login to access your conversations.";
pub const CONVERSATIONS_FAILED_MESSAGE: &str = "Failed to load conversations.";
pub const CONVERSATION_AUTH_MESSAGE: &str = "Please login to access conversations.";
pub const CONVERSATION_FAILED_MESSAGE: &str = "Failed to load conversation.";
pub const CREATE_FAILED_MESSAGE: &str = "Failed to create conversation.";
pub const TITLE_REQUIRED_MESSAGE: &str = "Please enter a title";
pub const RENAME_FAILED_MESSAGE: &str = "Failed to rename conversation. Please try again.";
pub const MESSAGE_REQUIRED_MESSAGE: &str = "Please enter a message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Another send was still in flight; nothing was appended or sent.
    Skipped,
    Delivered {
        created: Option<ConversationId>,
        mode: Option<String>,
        warning: Option<String>,
    },
    /// The failure notice was appended to the stream.
    Failed { detail: String },
    /// The view changed while the request was in flight.
    Discarded,
}

/// Clears the pending flag when a send settles or its future is dropped.
struct PendingGuard<'a> {
    state: &'a Observed<ChatState>,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.state.edit().finish_send();
    }
}

/// Conversation list, active conversation and the send pipeline.
pub struct ChatStore {
    backend: Arc<dyn ChatBackend>,
    session: Arc<SessionStore>,
    state: Observed<ChatState>,
}

impl ChatStore {
    pub fn new(backend: Arc<dyn ChatBackend>, session: Arc<SessionStore>) -> Self {
        Self {
            backend,
            session,
            state: Observed::new(ChatState::default()),
        }
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.state.read().snapshot()
    }

    /// Revision that advances whenever the chat view changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.state.subscribe()
    }

    pub async fn load_conversations(&self) -> ChatResult<()> {
        match self.backend.list_conversations().await {
            Ok(conversations) => {
                tracing::debug!(count = conversations.len(), "loaded conversations");
                let mut state = self.state.edit();
                state.replace_conversations(conversations);
                state.set_banner(None);
                Ok(())
            }
            Err(source) => {
                let error = self.classify(
                    source,
                    "load-conversations",
                    CONVERSATIONS_AUTH_MESSAGE,
                    CONVERSATIONS_FAILED_MESSAGE,
                );
                self.state.edit().set_banner(Some(Banner::from(&error)));
                Err(error)
            }
        }
    }

    /// Loads a conversation's history and makes it active.
    ///
    /// Returns `Ok(false)` when a later switch superseded this load before it arrived.
    pub async fn load_conversation(&self, conversation_id: &ConversationId) -> ChatResult<bool> {
        let ticket = self.state.edit().begin_load();

        match self.backend.conversation_history(conversation_id).await {
            Ok(history) => {
                let mut state = self.state.edit();
                if !state.apply_history(ticket, conversation_id, history) {
                    tracing::debug!(conversation_id = %conversation_id, "dropped superseded history load");
                    return Ok(false);
                }
                state.set_banner(None);
                Ok(true)
            }
            Err(source) => {
                let error = self.classify(
                    source,
                    "load-conversation",
                    CONVERSATION_AUTH_MESSAGE,
                    CONVERSATION_FAILED_MESSAGE,
                );
                let mut state = self.state.edit();
                if state.is_current_load(ticket) {
                    state.set_banner(Some(Banner::from(&error)));
                }
                Err(error)
            }
        }
    }

    /// Renames a conversation; local state is only touched on success.
    pub async fn rename(
        &self,
        conversation_id: &ConversationId,
        new_title: &str,
    ) -> ChatResult<Conversation> {
        let title = new_title.trim();
        ensure!(
            !title.is_empty(),
            ValidationSnafu {
                stage: "rename-conversation",
                message: TITLE_REQUIRED_MESSAGE,
            }
        );

        let updated = match self.backend.rename_conversation(conversation_id, title).await {
            Ok(updated) => updated,
            Err(source) => {
                return Err(self.classify(
                    source,
                    "rename-conversation",
                    RENAME_FAILED_MESSAGE,
                    RENAME_FAILED_MESSAGE,
                ));
            }
        };

        if !self.state.edit().apply_rename(updated.clone()) {
            tracing::debug!(conversation_id = %conversation_id, "renamed conversation is not in the loaded list");
        }
        Ok(updated)
    }

    pub fn start_new(&self) {
        self.state.edit().start_new();
    }

    /// Creates an empty conversation on the server and switches to it.
    pub async fn create_conversation(&self, title: Option<&str>) -> ChatResult<Conversation> {
        let title = title.map(str::trim).filter(|title| !title.is_empty());

        match self.backend.create_conversation(title).await {
            Ok(conversation) => {
                tracing::info!(conversation_id = %conversation.id, "created conversation");
                let mut state = self.state.edit();
                state.insert_created(conversation.clone());
                state.set_banner(None);
                Ok(conversation)
            }
            Err(source) => {
                let error = self.classify(
                    source,
                    "create-conversation",
                    CONVERSATIONS_AUTH_MESSAGE,
                    CREATE_FAILED_MESSAGE,
                );
                self.state.edit().set_banner(Some(Banner::from(&error)));
                Err(error)
            }
        }
    }

    pub fn dismiss_banner(&self) {
        self.state.edit().set_banner(None);
    }

    pub fn reset(&self) {
        self.state.edit().reset();
    }

    /// Sends a message from the active view.
    ///
    /// The user's text is echoed before the request goes out. Failures are reported
    /// in-stream through the returned outcome; only blank input is an error.
    pub async fn send(&self, text: &str) -> ChatResult<SendOutcome> {
        let admission = self.state.edit().begin_send(text, Timestamp::now());
        let (tag, request) = match admission {
            SendAdmission::Blank => {
                return ValidationSnafu {
                    stage: "send-message",
                    message: MESSAGE_REQUIRED_MESSAGE,
                }
                .fail();
            }
            SendAdmission::Busy => {
                tracing::debug!("send ignored while another is in flight");
                return Ok(SendOutcome::Skipped);
            }
            SendAdmission::Admitted { tag, request } => (tag, request),
        };

        let pending = PendingGuard { state: &self.state };
        let result = self.backend.send_message(request).await;
        let (outcome, created) = match result {
            Ok(reply) => self.settle_reply(&tag, reply),
            Err(source) => (self.settle_failure(&tag, source), None),
        };
        drop(pending);

        if let Some(conversation_id) = created {
            tracing::info!(conversation_id = %conversation_id, "server opened a new conversation");
            if let Err(error) = self.load_conversations().await {
                tracing::debug!(error = %error, "conversation list refresh after first send failed");
            }
        }

        Ok(outcome)
    }

    /// Reloads the list and the active conversation from the server.
    pub async fn resync(&self) -> ChatResult<()> {
        self.load_conversations().await?;
        let active = self.state.read().active_id().cloned();
        if let Some(conversation_id) = active {
            self.load_conversation(&conversation_id).await?;
        }
        Ok(())
    }

    fn settle_reply(
        &self,
        tag: &SendTag,
        reply: SendReply,
    ) -> (SendOutcome, Option<ConversationId>) {
        let mode = reply.mode.clone();
        let warning = reply.warning.clone();
        if let Some(warning) = &warning {
            tracing::warn!(mode = mode.as_deref().unwrap_or(""), warning = %warning, "server answered in fallback mode");
        }

        let applied = self.state.edit().apply_reply(tag, reply);
        match applied {
            Ok(ReplyApplied::Appended { created }) => (
                SendOutcome::Delivered {
                    created: created.clone(),
                    mode,
                    warning,
                },
                created,
            ),
            Ok(ReplyApplied::Discarded { created }) => {
                tracing::debug!("dropped reply for a conversation that is no longer displayed");
                (SendOutcome::Discarded, created)
            }
            Err(source) => (self.settle_failure(tag, source), None),
        }
    }

    fn settle_failure(&self, tag: &SendTag, source: ApiError) -> SendOutcome {
        if source.is_auth_required() {
            self.session.expire();
        }

        let detail = source.detail();
        tracing::warn!(error = %source, "send failed");

        if self
            .state
            .edit()
            .apply_failure(tag, &detail, Timestamp::now())
        {
            SendOutcome::Failed { detail }
        } else {
            SendOutcome::Discarded
        }
    }

    fn classify(
        &self,
        source: ApiError,
        stage: &'static str,
        auth_message: &str,
        upstream_message: &str,
    ) -> ChatError {
        tracing::warn!(stage, error = %source, "chat request failed");
        let error = ChatError::from_api(source, stage, auth_message, upstream_message);
        if error.kind() == FailureKind::AuthRequired {
            self.session.expire();
        }
        error
    }
}
