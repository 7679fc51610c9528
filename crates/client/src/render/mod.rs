//! Text and markup views over chat and admin snapshots.
//!
//! Both adapters share [`format_relative`], so a timestamp reads the same in
//! every front end.

pub mod markup;
pub mod terminal;

use chrono::{DateTime, Utc};
use parlor_api::Timestamp;

use crate::admin::AdminSnapshot;
use crate::chat::ChatSnapshot;

pub use markup::{MarkupRenderer, escape_html};
pub use terminal::TerminalRenderer;

pub const WELCOME_TITLE: &str = "Welcome to AI Chatbot!";
pub const WELCOME_BODY: &str = "Ask me anything and I'll do my best to help you.";
pub const TYPING_TEXT: &str = "AI is typing...";
pub const EMPTY_LIST_TEXT: &str = "No conversations yet";
pub const NEW_CHAT_TITLE: &str = "AI Assistant";
pub const CRASH_TITLE: &str = "Something went wrong";
pub const CRASH_BODY: &str = "We're sorry, but something unexpected happened.";

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 3_600_000;
const DAY_MS: i64 = 86_400_000;

pub trait Renderer {
    fn chat(&self, snapshot: &ChatSnapshot, now: DateTime<Utc>) -> String;
    fn admin(&self, snapshot: &AdminSnapshot, now: DateTime<Utc>) -> String;
    /// Fallback shown when rendering itself failed.
    fn crash(&self, detail: Option<&str>) -> String;
}

/// Relative age of `timestamp` as seen at `now`.
///
/// Under a minute (including future instants) reads "Just now", then whole
/// minutes, then whole hours, and from one day on the calendar date.
pub fn format_relative(timestamp: Timestamp, now: DateTime<Utc>) -> String {
    let elapsed = now
        .signed_duration_since(timestamp.as_datetime())
        .num_milliseconds();

    if elapsed < MINUTE_MS {
        "Just now".to_string()
    } else if elapsed < HOUR_MS {
        format!("{}m ago", elapsed / MINUTE_MS)
    } else if elapsed < DAY_MS {
        format!("{}h ago", elapsed / HOUR_MS)
    } else {
        timestamp.as_datetime().format("%Y-%m-%d").to_string()
    }
}

pub(crate) fn format_optional(timestamp: Option<Timestamp>, now: DateTime<Utc>) -> String {
    timestamp
        .map(|timestamp| format_relative(timestamp, now))
        .unwrap_or_default()
}

pub(crate) fn format_count(value: Option<u64>) -> String {
    value.map_or_else(|| "-".to_string(), |value| value.to_string())
}

pub(crate) fn health_label(healthy: bool) -> &'static str {
    if healthy { "Healthy" } else { "Error" }
}
