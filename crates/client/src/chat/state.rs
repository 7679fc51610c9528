use parlor_api::{
    ApiError, Conversation, ConversationHistory, ConversationId, Message, SendReply, SendRequest,
    Timestamp,
};

use crate::error::Banner;

/// Counter that advances every time the displayed conversation is swapped out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ViewGeneration(pub u64);

impl ViewGeneration {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

/// Identifies the view a send was issued from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SendTag {
    pub conversation_id: Option<ConversationId>,
    pub generation: ViewGeneration,
}

/// Handle for one history load; only the most recent ticket may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendAdmission {
    Blank,
    Busy,
    Admitted { tag: SendTag, request: SendRequest },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyApplied {
    Appended {
        /// Id adopted from the server when the send opened a new conversation.
        created: Option<ConversationId>,
    },
    Discarded {
        created: Option<ConversationId>,
    },
}

impl ReplyApplied {
    pub fn created(&self) -> Option<&ConversationId> {
        match self {
            Self::Appended { created } | Self::Discarded { created } => created.as_ref(),
        }
    }
}

/// Read-only copy of the chat view handed to renderers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub conversations: Vec<Conversation>,
    pub active_id: Option<ConversationId>,
    pub active_title: Option<String>,
    pub messages: Vec<Message>,
    pub pending: bool,
    pub banner: Option<Banner>,
}

impl ChatSnapshot {
    pub fn is_active(&self, conversation: &Conversation) -> bool {
        self.active_id.as_ref() == Some(&conversation.id)
    }
}

/// Conversation list, active conversation and its messages.
///
/// `messages` always belongs to `active_id`. Every operation that swaps the active
/// conversation replaces the list wholesale and advances the view generation, which
/// invalidates replies and history loads issued against the previous view.
#[derive(Debug, Default)]
pub struct ChatState {
    conversations: Vec<Conversation>,
    active_id: Option<ConversationId>,
    active_title: Option<String>,
    messages: Vec<Message>,
    generation: ViewGeneration,
    load_sequence: u64,
    pending: bool,
    banner: Option<Banner>,
}

impl ChatState {
    pub fn conversations(&self) -> &[Conversation] {
        &self.conversations
    }

    pub fn active_id(&self) -> Option<&ConversationId> {
        self.active_id.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn generation(&self) -> ViewGeneration {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn banner(&self) -> Option<&Banner> {
        self.banner.as_ref()
    }

    pub fn set_banner(&mut self, banner: Option<Banner>) {
        self.banner = banner;
    }

    pub fn replace_conversations(&mut self, conversations: Vec<Conversation>) {
        self.conversations = conversations;
    }

    /// Admits a send, echoing the trimmed text as a user message.
    pub fn begin_send(&mut self, text: &str, now: Timestamp) -> SendAdmission {
        let text = text.trim();
        if text.is_empty() {
            return SendAdmission::Blank;
        }
        if self.pending {
            return SendAdmission::Busy;
        }

        self.pending = true;
        self.messages.push(Message::user(text, now));

        SendAdmission::Admitted {
            tag: SendTag {
                conversation_id: self.active_id.clone(),
                generation: self.generation,
            },
            request: SendRequest {
                message: text.to_string(),
                conversation_id: self.active_id.clone(),
            },
        }
    }

    pub fn finish_send(&mut self) {
        self.pending = false;
    }

    /// Returns true while the view a send was issued from is still displayed.
    pub fn accepts(&self, tag: &SendTag) -> bool {
        tag.generation == self.generation && tag.conversation_id == self.active_id
    }

    pub fn apply_reply(&mut self, tag: &SendTag, reply: SendReply) -> Result<ReplyApplied, ApiError> {
        let created = match (&tag.conversation_id, reply.conversation_id) {
            (None, Some(assigned)) => Some(assigned),
            (None, None) => {
                return Err(ApiError::MissingConversationId {
                    stage: "apply-send-reply",
                });
            }
            (Some(_), _) => None,
        };

        if !self.accepts(tag) {
            return Ok(ReplyApplied::Discarded { created });
        }

        if let Some(assigned) = &created {
            self.active_id = Some(assigned.clone());
        }
        self.messages.push(Message::bot(reply.response, reply.timestamp));

        Ok(ReplyApplied::Appended { created })
    }

    /// Appends the in-stream failure notice; returns false when the view moved on.
    pub fn apply_failure(&mut self, tag: &SendTag, detail: &str, now: Timestamp) -> bool {
        if !self.accepts(tag) {
            return false;
        }

        self.messages.push(Message::bot(failure_notice(detail), now));
        true
    }

    pub fn begin_load(&mut self) -> LoadTicket {
        self.load_sequence += 1;
        LoadTicket(self.load_sequence)
    }

    pub fn is_current_load(&self, ticket: LoadTicket) -> bool {
        ticket.0 == self.load_sequence
    }

    /// Replaces the active conversation with a loaded history unless a later
    /// switch superseded the ticket.
    ///
    /// Reloading the conversation that is already active keeps the view
    /// generation, so a reply still in flight for it lands on the fresh history.
    pub fn apply_history(
        &mut self,
        ticket: LoadTicket,
        requested: &ConversationId,
        history: ConversationHistory,
    ) -> bool {
        if !self.is_current_load(ticket) {
            return false;
        }

        if self.active_id.as_ref() != Some(requested) {
            self.active_id = Some(requested.clone());
            self.generation = self.generation.next();
        }
        self.active_title = Some(history.conversation.title);
        self.messages = history.messages;
        true
    }

    pub fn start_new(&mut self) {
        self.active_id = None;
        self.active_title = None;
        self.messages.clear();
        self.invalidate_view();
    }

    /// Forgets everything loaded for the previous user.
    pub fn reset(&mut self) {
        self.conversations.clear();
        self.banner = None;
        self.start_new();
    }

    /// Prepends a server-created conversation and makes it active.
    pub fn insert_created(&mut self, conversation: Conversation) {
        self.conversations.retain(|existing| existing.id != conversation.id);
        self.active_id = Some(conversation.id.clone());
        self.active_title = Some(conversation.title.clone());
        self.messages.clear();
        self.conversations.insert(0, conversation);
        self.invalidate_view();
    }

    /// Swaps the matching entry in place; returns false when no entry matched.
    pub fn apply_rename(&mut self, updated: Conversation) -> bool {
        let Some(slot) = self
            .conversations
            .iter_mut()
            .find(|conversation| conversation.id == updated.id)
        else {
            return false;
        };

        if self.active_id.as_ref() == Some(&updated.id) {
            self.active_title = Some(updated.title.clone());
        }
        *slot = updated;
        true
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            conversations: self.conversations.clone(),
            active_id: self.active_id.clone(),
            active_title: self.active_title.clone(),
            messages: self.messages.clone(),
            pending: self.pending,
            banner: self.banner.clone(),
        }
    }

    fn invalidate_view(&mut self) {
        self.generation = self.generation.next();
        self.load_sequence += 1;
    }
}

pub fn failure_notice(detail: &str) -> String {
    format!("Sorry, I encountered an error: {detail}. Please try again.")
}
