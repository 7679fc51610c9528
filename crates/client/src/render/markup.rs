use chrono::{DateTime, Utc};
use parlor_api::{Conversation, Message};

use super::{
    CRASH_BODY, CRASH_TITLE, EMPTY_LIST_TEXT, NEW_CHAT_TITLE, Renderer, TYPING_TEXT,
    WELCOME_BODY, WELCOME_TITLE, format_count, format_optional, format_relative, health_label,
};
use crate::admin::AdminSnapshot;
use crate::chat::ChatSnapshot;
use crate::error::FailureKind;

/// HTML fragments using the chat page's class names.
#[derive(Debug, Clone, Default)]
pub struct MarkupRenderer;

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for character in raw.chars() {
        match character {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

impl MarkupRenderer {
    fn conversation_item(
        &self,
        conversation: &Conversation,
        active: bool,
        now: DateTime<Utc>,
    ) -> String {
        let class = if active {
            "list-group-item conversation-item active"
        } else {
            "list-group-item conversation-item"
        };
        format!(
            concat!(
                "<div class=\"{class}\" data-conversation-id=\"{id}\">",
                "<div class=\"conversation-title\">{title}</div>",
                "<div class=\"conversation-preview\">{count} messages</div>",
                "<small class=\"text-muted\">{updated}</small>",
                "</div>"
            ),
            class = class,
            id = escape_html(conversation.id.as_str()),
            title = escape_html(&conversation.title),
            count = conversation.message_count,
            updated = format_optional(conversation.updated_at, now),
        )
    }

    fn message(&self, message: &Message, now: DateTime<Utc>) -> String {
        let (sender, icon) = if message.is_user() {
            ("user", "fa-user")
        } else {
            ("bot", "fa-robot")
        };
        let avatar = format!("<div class=\"message-avatar\"><i class=\"fas {icon}\"></i></div>");
        let bubble = format!(
            "<div class=\"message-bubble\">{}<small class=\"message-time\">{}</small></div>",
            escape_html(&message.content),
            format_relative(message.timestamp, now)
        );

        if message.is_user() {
            format!("<div class=\"message {sender}\">{bubble}{avatar}</div>")
        } else {
            format!("<div class=\"message {sender}\">{avatar}{bubble}</div>")
        }
    }
}

impl Renderer for MarkupRenderer {
    fn chat(&self, snapshot: &ChatSnapshot, now: DateTime<Utc>) -> String {
        let mut html = String::new();

        if let Some(banner) = &snapshot.banner {
            let variant = match banner.kind {
                FailureKind::Validation => "warning",
                FailureKind::AuthRequired | FailureKind::Upstream => "danger",
            };
            html.push_str(&format!(
                "<div class=\"alert alert-{variant} alert-dismissible\">{}</div>",
                escape_html(&banner.message)
            ));
        }

        html.push_str("<div class=\"list-group conversation-list\">");
        if snapshot.conversations.is_empty() {
            html.push_str(&format!(
                "<div class=\"list-group-item text-center text-muted py-4\">{EMPTY_LIST_TEXT}</div>"
            ));
        }
        for conversation in &snapshot.conversations {
            html.push_str(&self.conversation_item(
                conversation,
                snapshot.is_active(conversation),
                now,
            ));
        }
        html.push_str("</div>");

        html.push_str(&format!(
            "<h5 class=\"chat-title\">{}</h5>",
            escape_html(snapshot.active_title.as_deref().unwrap_or(NEW_CHAT_TITLE))
        ));

        html.push_str("<div class=\"chat-messages\">");
        if snapshot.messages.is_empty() {
            html.push_str(&format!(
                "<div class=\"welcome-message\"><h5>{WELCOME_TITLE}</h5><p>{}</p></div>",
                escape_html(WELCOME_BODY)
            ));
        }
        for message in &snapshot.messages {
            html.push_str(&self.message(message, now));
        }
        if snapshot.pending {
            html.push_str(&format!(
                concat!(
                    "<div class=\"message bot typing-indicator\">",
                    "<div class=\"message-avatar\"><i class=\"fas fa-robot\"></i></div>",
                    "<div class=\"message-bubble\"><div class=\"loading-spinner\"></div>{}</div>",
                    "</div>"
                ),
                TYPING_TEXT
            ));
        }
        html.push_str("</div>");

        html
    }

    fn admin(&self, snapshot: &AdminSnapshot, now: DateTime<Utc>) -> String {
        let mut html = String::from("<div class=\"admin-status\">");
        if let Some(status) = &snapshot.status {
            for (name, healthy, detail) in [
                ("Overall", status.is_healthy(), status.overall_status.as_str()),
                ("Database", status.database.healthy, status.database.status.as_str()),
                ("AI Service", status.ai_service.healthy, status.ai_service.status.as_str()),
            ] {
                let variant = if healthy { "success" } else { "danger" };
                html.push_str(&format!(
                    "<div class=\"status-row\">{name}: <span class=\"badge bg-{variant}\" title=\"{}\">{}</span></div>",
                    escape_html(detail),
                    health_label(healthy)
                ));
            }
        }
        html.push_str("</div>");

        let stats = snapshot.stats.clone().unwrap_or_default();
        html.push_str(&format!(
            concat!(
                "<div class=\"admin-stats\">",
                "<div class=\"stat\" data-stat=\"users\">{}</div>",
                "<div class=\"stat\" data-stat=\"conversations\">{}</div>",
                "<div class=\"stat\" data-stat=\"messages\">{}</div>",
                "<div class=\"stat\" data-stat=\"active_conversations_24h\">{}</div>",
                "</div>"
            ),
            format_count(stats.users),
            format_count(stats.conversations),
            format_count(stats.messages),
            format_count(stats.active_conversations_24h)
        ));

        html.push_str("<table class=\"table admin-logs\"><tbody>");
        for entry in &snapshot.logs {
            html.push_str(&format!(
                "<tr><td>{}</td><td><span class=\"badge\">{}</span></td><td>{}</td><td>{}</td></tr>",
                format_optional(entry.timestamp, now),
                escape_html(&entry.level),
                escape_html(entry.module.as_deref().unwrap_or("")),
                escape_html(&entry.message)
            ));
        }
        html.push_str("</tbody></table>");

        html.push_str("<table class=\"table admin-users\"><tbody>");
        for user in &snapshot.users {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                user.id,
                escape_html(&user.username),
                escape_html(user.email.as_deref().unwrap_or("")),
                format_optional(user.created_at, now),
                if user.is_active { "Active" } else { "Inactive" }
            ));
        }
        html.push_str("</tbody></table>");

        html
    }

    fn crash(&self, detail: Option<&str>) -> String {
        let detail = detail
            .map(|detail| format!("<pre>{}</pre>", escape_html(detail)))
            .unwrap_or_default();
        format!(
            concat!(
                "<div class=\"alert alert-danger\">",
                "<h4 class=\"alert-heading\">{}</h4><p>{}</p>{}",
                "<button class=\"btn btn-outline-danger\" data-action=\"reload\">Reload Page</button>",
                "</div>"
            ),
            CRASH_TITLE,
            escape_html(CRASH_BODY),
            detail
        )
    }
}
