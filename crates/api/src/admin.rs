use serde::Deserialize;

use super::types::{Timestamp, User};

pub const HEALTHY_STATUS: &str = "healthy";
pub const ERROR_STATUS: &str = "error";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ComponentHealth {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub healthy: bool,
}

impl ComponentHealth {
    pub fn error() -> Self {
        Self {
            status: ERROR_STATUS.to_string(),
            healthy: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SystemStatus {
    #[serde(default = "ComponentHealth::error")]
    pub database: ComponentHealth,
    #[serde(default = "ComponentHealth::error")]
    pub ai_service: ComponentHealth,
    #[serde(default)]
    pub overall_status: String,
}

impl SystemStatus {
    /// Status shown when the health probe itself could not be completed.
    pub fn unavailable() -> Self {
        Self {
            database: ComponentHealth::error(),
            ai_service: ComponentHealth::error(),
            overall_status: ERROR_STATUS.to_string(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.overall_status == HEALTHY_STATUS
    }
}

/// Aggregate counters; a missing counter renders as `-`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SystemStats {
    #[serde(default)]
    pub users: Option<u64>,
    #[serde(default)]
    pub conversations: Option<u64>,
    #[serde(default)]
    pub messages: Option<u64>,
    #[serde(default)]
    pub active_conversations_24h: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub timestamp: Option<Timestamp>,
    pub level: String,
    #[serde(default)]
    pub module: Option<String>,
    pub message: String,
}

/// Server-side filter for the log feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub level: Option<String>,
    pub limit: Option<u32>,
}

impl LogQuery {
    pub fn new(level: Option<String>, limit: Option<u32>) -> Self {
        Self { level, limit }
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(level) = self.level.as_deref().filter(|level| !level.is_empty()) {
            pairs.push(("level", level.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct LogListEnvelope {
    #[serde(default)]
    pub logs: Vec<LogEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserListEnvelope {
    #[serde(default)]
    pub users: Vec<User>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_status_payload_marks_missing_components_unhealthy() {
        let status: SystemStatus = serde_json::from_str(
            r#"{"database": {"status": "connected", "healthy": true}, "overall_status": "degraded"}"#,
        )
        .unwrap();

        assert!(status.database.healthy);
        assert_eq!(status.ai_service, ComponentHealth::error());
        assert!(!status.is_healthy());
    }

    #[test]
    fn empty_level_is_not_sent_as_a_filter() {
        let unfiltered = LogQuery::new(Some(String::new()), Some(100));
        let filtered = LogQuery::new(Some("ERROR".to_string()), None);

        assert_eq!(unfiltered.query_pairs(), vec![("limit", "100".to_string())]);
        assert_eq!(filtered.query_pairs(), vec![("level", "ERROR".to_string())]);
    }
}
