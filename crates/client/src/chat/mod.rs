/// Pure conversation state and the tags that guard it against stale replies.
pub mod state;
/// Async store driving the chat endpoints.
pub mod store;

pub use state::{
    ChatSnapshot, ChatState, LoadTicket, ReplyApplied, SendAdmission, SendTag, ViewGeneration,
    failure_notice,
};
pub use store::{ChatStore, SendOutcome};
