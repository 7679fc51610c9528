use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Offset-less layouts the chat server uses for its ISO timestamps.
const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Server-assigned conversation identifier.
///
/// Persisted conversations carry integer ids, while the server's AI-only fallback
/// mode hands out UUID strings. Both decode into the same opaque token and render
/// back verbatim into URL paths and request bodies.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the numeric form when the id round-trips exactly as an integer.
    pub fn as_number(&self) -> Option<u64> {
        self.0
            .parse::<u64>()
            .ok()
            .filter(|number| number.to_string() == self.0)
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<u64> for ConversationId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for ConversationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for ConversationId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self.as_number() {
            Some(number) => serializer.serialize_u64(number),
            None => serializer.serialize_str(&self.0),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawConversationId {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for ConversationId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match RawConversationId::deserialize(deserializer)? {
            RawConversationId::Number(number) => Self::from(number),
            RawConversationId::Text(text) => Self(text),
        })
    }
}

/// Instant attached to messages, conversations and log rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Parses RFC 3339 strings, and offset-less ISO strings as UTC.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(Self(parsed.with_timezone(&Utc)));
        }

        NAIVE_TIMESTAMP_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
            .map(|naive| Self(naive.and_utc()))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(value: DateTime<Utc>) -> Self {
        Self(value)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0.to_rfc3339())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).ok_or_else(|| {
            <D::Error as serde::de::Error>::custom(format!("unrecognized timestamp '{raw}'"))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,
    pub title: String,
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub updated_at: Option<Timestamp>,
    #[serde(default)]
    pub created_at: Option<Timestamp>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Bot,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Absent on optimistic and synthetic messages that were never persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    pub content: String,
    pub sender_type: SenderType,
    pub timestamp: Timestamp,
}

impl Message {
    pub fn user(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: None,
            content: content.into(),
            sender_type: SenderType::User,
            timestamp,
        }
    }

    pub fn bot(content: impl Into<String>, timestamp: Timestamp) -> Self {
        Self {
            id: None,
            content: content.into(),
            sender_type: SenderType::Bot,
            timestamp,
        }
    }

    pub fn is_user(&self) -> bool {
        self.sender_type == SenderType::User
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthMode {
    Login,
    Register,
}

impl AuthMode {
    pub(crate) fn path(self) -> &'static str {
        match self {
            Self::Login => "api/chat/login",
            Self::Register => "api/chat/register",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AuthReply {
    #[serde(default)]
    pub message: Option<String>,
    pub user: User,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConversationHistory {
    pub conversation: Conversation,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SendRequest {
    pub message: String,
    /// `None` serializes as `null`, which asks the server to open a new conversation.
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SendReply {
    pub response: String,
    #[serde(default)]
    pub conversation_id: Option<ConversationId>,
    pub timestamp: Timestamp,
    /// Set to `fallback` or `emergency_fallback` when the server answered without its database.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CurrentUserEnvelope {
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationListEnvelope {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConversationEnvelope {
    pub conversation: Conversation,
}

#[derive(Debug, Serialize)]
pub(crate) struct TitleBody<'a> {
    pub title: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_id_accepts_numbers_and_fallback_uuids() {
        let numeric: ConversationId = serde_json::from_str("42").unwrap();
        let opaque: ConversationId =
            serde_json::from_str("\"7f1c2b1e-0d7a-4b8e-9a51-3c2f1d0e4b6a\"").unwrap();

        assert_eq!(numeric, ConversationId::from(42));
        assert_eq!(numeric.as_number(), Some(42));
        assert_eq!(opaque.as_number(), None);
        assert_eq!(serde_json::to_string(&numeric).unwrap(), "42");
        assert_eq!(
            serde_json::to_string(&opaque).unwrap(),
            "\"7f1c2b1e-0d7a-4b8e-9a51-3c2f1d0e4b6a\""
        );
    }

    #[test]
    fn zero_padded_ids_stay_textual() {
        let padded = ConversationId::new("007");
        assert_eq!(padded.as_number(), None);
        assert_eq!(serde_json::to_string(&padded).unwrap(), "\"007\"");
    }

    #[test]
    fn new_conversation_send_serializes_null_id() {
        let request = SendRequest {
            message: "hello".to_string(),
            conversation_id: None,
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({ "message": "hello", "conversation_id": null })
        );
    }

    #[test]
    fn offset_less_timestamps_are_read_as_utc() {
        let naive = Timestamp::parse("2024-03-01T10:15:30.123456").unwrap();
        let explicit = Timestamp::parse("2024-03-01T10:15:30.123456Z").unwrap();
        let whole_seconds = Timestamp::parse("2024-03-01T10:15:30").unwrap();

        assert_eq!(naive, explicit);
        assert_eq!(whole_seconds.as_datetime().timestamp(), 1_709_288_130);
        assert!(Timestamp::parse("yesterday").is_none());
    }

    #[test]
    fn minimal_user_payload_from_me_endpoint_decodes() {
        let user: User = serde_json::from_str(r#"{"id": 3, "username": "ada"}"#).unwrap();

        assert_eq!(user.username, "ada");
        assert!(user.is_active);
        assert_eq!(user.email, None);
        assert_eq!(user.created_at, None);
    }

    #[test]
    fn history_payload_decodes_sender_types() {
        let history: ConversationHistory = serde_json::from_str(
            r#"{
                "conversation": {"id": 9, "user_id": 1, "title": "Trip", "message_count": 2,
                                 "created_at": "2024-03-01T09:00:00", "updated_at": "2024-03-01T10:00:00",
                                 "is_active": true},
                "messages": [
                    {"id": 1, "conversation_id": 9, "content": "hi", "sender_type": "user",
                     "timestamp": "2024-03-01T09:59:00", "token_count": null},
                    {"id": 2, "conversation_id": 9, "content": "hello!", "sender_type": "bot",
                     "timestamp": "2024-03-01T10:00:00", "token_count": 4}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(history.conversation.id, ConversationId::from(9));
        assert_eq!(history.messages.len(), 2);
        assert!(history.messages[0].is_user());
        assert_eq!(history.messages[1].sender_type, SenderType::Bot);
    }
}
