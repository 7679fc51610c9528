use chrono::{DateTime, Utc};
use parlor_api::Message;

use super::{
    CRASH_BODY, CRASH_TITLE, EMPTY_LIST_TEXT, NEW_CHAT_TITLE, Renderer, TYPING_TEXT,
    WELCOME_BODY, WELCOME_TITLE, format_count, format_optional, format_relative, health_label,
};
use crate::admin::AdminSnapshot;
use crate::chat::ChatSnapshot;

/// Plain-text lines for the console front end.
#[derive(Debug, Clone, Default)]
pub struct TerminalRenderer;

impl TerminalRenderer {
    fn message_line(message: &Message, now: DateTime<Utc>) -> String {
        let speaker = if message.is_user() { "You" } else { "AI" };
        format!(
            "[{}] {speaker}: {}",
            format_relative(message.timestamp, now),
            message.content
        )
    }
}

impl Renderer for TerminalRenderer {
    fn chat(&self, snapshot: &ChatSnapshot, now: DateTime<Utc>) -> String {
        let mut lines = Vec::new();

        if let Some(banner) = &snapshot.banner {
            lines.push(format!("! {}", banner.message));
        }

        lines.push("== Conversations ==".to_string());
        if snapshot.conversations.is_empty() {
            lines.push(format!("  {EMPTY_LIST_TEXT}"));
        }
        for conversation in &snapshot.conversations {
            let marker = if snapshot.is_active(conversation) { '*' } else { ' ' };
            let updated = format_optional(conversation.updated_at, now);
            lines.push(format!(
                "{marker} [{}] {} ({} messages{})",
                conversation.id,
                conversation.title,
                conversation.message_count,
                if updated.is_empty() {
                    String::new()
                } else {
                    format!(", {updated}")
                }
            ));
        }

        let title = snapshot.active_title.as_deref().unwrap_or(NEW_CHAT_TITLE);
        lines.push(format!("== {title} =="));
        if snapshot.messages.is_empty() {
            lines.push(WELCOME_TITLE.to_string());
            lines.push(WELCOME_BODY.to_string());
        }
        lines.extend(
            snapshot
                .messages
                .iter()
                .map(|message| Self::message_line(message, now)),
        );
        if snapshot.pending {
            lines.push(TYPING_TEXT.to_string());
        }

        lines.join("\n")
    }

    fn admin(&self, snapshot: &AdminSnapshot, now: DateTime<Utc>) -> String {
        let mut lines = vec!["== System status ==".to_string()];
        match &snapshot.status {
            Some(status) => {
                lines.push(format!(
                    "overall: {}",
                    health_label(status.is_healthy())
                ));
                lines.push(format!(
                    "database: {} ({})",
                    health_label(status.database.healthy),
                    status.database.status
                ));
                lines.push(format!(
                    "ai service: {} ({})",
                    health_label(status.ai_service.healthy),
                    status.ai_service.status
                ));
            }
            None => lines.push("loading...".to_string()),
        }

        let stats = snapshot.stats.clone().unwrap_or_default();
        lines.push("== Statistics ==".to_string());
        lines.push(format!(
            "users: {}  conversations: {}  messages: {}  active (24h): {}",
            format_count(stats.users),
            format_count(stats.conversations),
            format_count(stats.messages),
            format_count(stats.active_conversations_24h)
        ));

        lines.push(format!(
            "== Logs ({}) ==",
            snapshot.log_filter.as_deref().unwrap_or("all levels")
        ));
        for entry in &snapshot.logs {
            lines.push(format!(
                "[{}] {:<8} {}: {}",
                format_optional(entry.timestamp, now),
                entry.level,
                entry.module.as_deref().unwrap_or("-"),
                entry.message
            ));
        }

        lines.push("== Users ==".to_string());
        for user in &snapshot.users {
            lines.push(format!(
                "#{} {} <{}> {}{}",
                user.id,
                user.username,
                user.email.as_deref().unwrap_or("-"),
                if user.is_active { "active" } else { "inactive" },
                user.created_at
                    .map(|created| format!(", joined {}", format_relative(created, now)))
                    .unwrap_or_default()
            ));
        }

        lines.join("\n")
    }

    fn crash(&self, detail: Option<&str>) -> String {
        let mut lines = vec![
            format!("!! {CRASH_TITLE}"),
            CRASH_BODY.to_string(),
        ];
        if let Some(detail) = detail {
            lines.push(format!("   {detail}"));
        }
        lines.push("Type /reload to re-sync with the server.".to_string());
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Banner, FailureKind};
    use crate::testing::ScriptedBackend;
    use parlor_api::{ConversationId, SystemStatus};

    fn now() -> DateTime<Utc> {
        ScriptedBackend::server_time().as_datetime() + chrono::Duration::minutes(5)
    }

    #[test]
    fn empty_chat_shows_welcome_and_empty_list() {
        let output = TerminalRenderer.chat(&ChatSnapshot::default(), now());

        assert!(output.contains(EMPTY_LIST_TEXT));
        assert!(output.contains(WELCOME_TITLE));
        assert!(!output.contains(TYPING_TEXT));
    }

    #[test]
    fn active_conversation_and_pending_send_are_marked() {
        let snapshot = ChatSnapshot {
            conversations: vec![
                ScriptedBackend::conversation(1, "Trip"),
                ScriptedBackend::conversation(2, "Recipes"),
            ],
            active_id: Some(ConversationId::from(2)),
            active_title: Some("Recipes".to_string()),
            messages: vec![Message::user("pasta?", ScriptedBackend::server_time())],
            pending: true,
            banner: Some(Banner {
                kind: FailureKind::Upstream,
                message: "Failed to load conversations.".to_string(),
            }),
        };

        let output = TerminalRenderer.chat(&snapshot, now());

        assert!(output.starts_with("! Failed to load conversations."));
        assert!(output.contains("  [1] Trip (0 messages, 5m ago)"));
        assert!(output.contains("* [2] Recipes"));
        assert!(output.contains("[5m ago] You: pasta?"));
        assert!(output.ends_with(TYPING_TEXT));
    }

    #[test]
    fn unavailable_status_reads_as_error() {
        let snapshot = AdminSnapshot {
            status: Some(SystemStatus::unavailable()),
            ..AdminSnapshot::default()
        };

        let output = TerminalRenderer.admin(&snapshot, now());

        assert!(output.contains("overall: Error"));
        assert!(output.contains("database: Error (error)"));
        assert!(output.contains("users: -"));
    }
}
