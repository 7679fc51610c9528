use std::sync::Arc;
use std::time::Duration;

use parlor_api::{AdminBackend, ApiError, LogEntry, LogQuery, SystemStats, SystemStatus, User};
use tokio::sync::watch;

use super::poller::PollHandle;
use crate::observed::Observed;
use crate::session::SessionStore;
use crate::settings::{DEFAULT_LOG_LIMIT, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_USER_LIMIT};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminConfig {
    pub poll_interval: Duration,
    pub log_limit: Option<u32>,
    pub user_limit: Option<u32>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            log_limit: Some(DEFAULT_LOG_LIMIT),
            user_limit: Some(DEFAULT_USER_LIMIT),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdminSnapshot {
    /// `None` until the first probe settles.
    pub status: Option<SystemStatus>,
    pub stats: Option<SystemStats>,
    pub logs: Vec<LogEntry>,
    pub users: Vec<User>,
    pub log_filter: Option<String>,
}

/// Read-only admin dashboards: health, counters, log feed and users.
pub struct AdminPanel {
    backend: Arc<dyn AdminBackend>,
    session: Arc<SessionStore>,
    config: AdminConfig,
    state: Observed<AdminSnapshot>,
}

impl AdminPanel {
    pub fn new(
        backend: Arc<dyn AdminBackend>,
        session: Arc<SessionStore>,
        config: AdminConfig,
    ) -> Self {
        Self {
            backend,
            session,
            config,
            state: Observed::new(AdminSnapshot::default()),
        }
    }

    pub fn snapshot(&self) -> AdminSnapshot {
        self.state.read().clone()
    }

    /// Revision that advances whenever a panel refreshes, including poller ticks.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.state.subscribe()
    }

    /// A failed probe shows every component as errored.
    pub async fn refresh_status(&self) {
        let status = match self.backend.system_status().await {
            Ok(status) => status,
            Err(error) => {
                self.report("admin-status", &error);
                SystemStatus::unavailable()
            }
        };
        self.state.edit().status = Some(status);
    }

    pub async fn refresh_stats(&self) {
        match self.backend.system_stats().await {
            Ok(stats) => self.state.edit().stats = Some(stats),
            Err(error) => self.report("admin-stats", &error),
        }
    }

    pub async fn refresh_logs(&self) {
        let filter = self.state.read().log_filter.clone();
        let query = LogQuery::new(filter.clone(), self.config.log_limit);

        match self.backend.logs(query).await {
            Ok(logs) => {
                let mut state = self.state.edit();
                if state.log_filter == filter {
                    state.logs = logs;
                } else {
                    tracing::debug!("dropped log page fetched for a replaced filter");
                }
            }
            Err(error) => self.report("admin-logs", &error),
        }
    }

    pub async fn refresh_users(&self) {
        match self.backend.users(self.config.user_limit).await {
            Ok(users) => self.state.edit().users = users,
            Err(error) => self.report("admin-users", &error),
        }
    }

    /// Health and counters, refreshed by the poller.
    pub async fn refresh_health(&self) {
        futures::join!(self.refresh_status(), self.refresh_stats());
    }

    pub async fn refresh_all(&self) {
        futures::join!(
            self.refresh_status(),
            self.refresh_stats(),
            self.refresh_logs(),
            self.refresh_users()
        );
    }

    /// Switches the server-side level filter; an empty level means all levels.
    ///
    /// Returns false without fetching when the filter did not change.
    pub async fn set_log_filter(&self, level: &str) -> bool {
        let level = level.trim();
        let filter = (!level.is_empty()).then(|| level.to_string());

        {
            let mut state = self.state.edit();
            if state.log_filter == filter {
                return false;
            }
            state.log_filter = filter;
        }

        self.refresh_logs().await;
        true
    }

    /// Loads every panel, then keeps health and counters fresh until the mount drops.
    pub async fn mount(self: &Arc<Self>) -> AdminMount {
        self.refresh_all().await;

        let panel = Arc::clone(self);
        let poller = PollHandle::spawn(self.config.poll_interval, move || {
            let panel = Arc::clone(&panel);
            async move { panel.refresh_health().await }
        });

        AdminMount { poller }
    }

    fn report(&self, stage: &'static str, error: &ApiError) {
        tracing::warn!(stage, error = %error, "admin request failed");
        if error.is_auth_required() {
            self.session.expire();
        }
    }
}

/// Keeps the admin poller alive; dropping it stops polling.
pub struct AdminMount {
    poller: PollHandle,
}

impl AdminMount {
    pub fn is_polling(&self) -> bool {
        !self.poller.is_cancelled()
    }

    pub async fn unmount(self) {
        self.poller.stop().await;
    }
}
