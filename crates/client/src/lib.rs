#![deny(unsafe_code)]

/// Read-only admin dashboards and their poller.
pub mod admin;
/// Conversation state and the send pipeline.
pub mod chat;
pub mod console;
pub mod error;
mod observed;
/// Text and markup renderers.
pub mod render;
pub mod route;
pub mod session;
/// Client settings persistence.
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::{AdminConfig, AdminMount, AdminPanel, AdminSnapshot};
pub use chat::{ChatSnapshot, ChatStore, SendOutcome};
pub use console::{Command, Console, ConsoleEvent, Flow};
pub use error::{Banner, ChatError, ChatResult, FailureKind};
pub use render::{MarkupRenderer, Renderer, TerminalRenderer, format_relative};
pub use route::{Route, RouteDecision, RouteGuard};
pub use session::{LoginForm, LoginOutcome, Session, SessionStore};
pub use settings::{ClientSettings, SettingsError, SettingsStore};
