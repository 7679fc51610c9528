use std::sync::Arc;

use parlor_api::{AuthMode, ChatBackend, Credentials, User};
use snafu::ensure;
use tokio::sync::watch;

use crate::error::{ChatError, ChatResult, GENERIC_FAILURE_MESSAGE, ValidationSnafu};

pub const MISSING_CREDENTIALS_MESSAGE: &str = "Username and password are required";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords do not match";

/// Process-wide authentication state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user: Option<User>,
    pub loading: bool,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }
}

impl Session {
    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }

    pub fn username(&self) -> Option<&str> {
        self.user.as_ref().map(|user| user.username.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginForm {
    pub mode: AuthMode,
    pub username: String,
    pub password: String,
    /// Only checked in register mode.
    pub confirm_password: String,
}

impl LoginForm {
    pub fn login(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::Login,
            username: username.into(),
            password: password.into(),
            confirm_password: String::new(),
        }
    }

    pub fn register(
        username: impl Into<String>,
        password: impl Into<String>,
        confirm_password: impl Into<String>,
    ) -> Self {
        Self {
            mode: AuthMode::Register,
            username: username.into(),
            password: password.into(),
            confirm_password: confirm_password.into(),
        }
    }

    fn validate(&self) -> ChatResult<Credentials> {
        let username = self.username.trim();
        ensure!(
            !username.is_empty() && !self.password.is_empty(),
            ValidationSnafu {
                stage: "validate-login-form",
                message: MISSING_CREDENTIALS_MESSAGE,
            }
        );
        ensure!(
            self.mode != AuthMode::Register || self.password == self.confirm_password,
            ValidationSnafu {
                stage: "validate-login-form",
                message: PASSWORD_MISMATCH_MESSAGE,
            }
        );

        Ok(Credentials::new(username, self.password.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user: User,
    /// Confirmation text from the server, e.g. "Login successful".
    pub message: Option<String>,
}

/// Owns the session and publishes every change on a watch channel.
pub struct SessionStore {
    backend: Arc<dyn ChatBackend>,
    state: watch::Sender<Session>,
}

impl SessionStore {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        let (state, _) = watch::channel(Session::default());
        Self { backend, state }
    }

    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> Session {
        self.state.borrow().clone()
    }

    pub fn current_user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    /// Probes the server for the logged-in user. Any failure means "not logged in".
    pub async fn check_auth(&self) -> Option<User> {
        self.state.send_modify(|session| session.loading = true);

        let user = match self.backend.current_user().await {
            Ok(user) => Some(user),
            Err(error) => {
                tracing::debug!(error = %error, "auth probe failed, treating session as anonymous");
                None
            }
        };

        self.state.send_modify(|session| {
            session.user = user.clone();
            session.loading = false;
        });
        user
    }

    pub async fn login(&self, form: &LoginForm) -> ChatResult<LoginOutcome> {
        let credentials = form.validate()?;
        let stage = match form.mode {
            AuthMode::Login => "login",
            AuthMode::Register => "register",
        };

        let reply = match self.backend.authenticate(form.mode, &credentials).await {
            Ok(reply) => reply,
            Err(source) => {
                let message = source
                    .server_message()
                    .unwrap_or(GENERIC_FAILURE_MESSAGE)
                    .to_string();
                tracing::info!(stage, error = %source, "authentication rejected");
                return Err(ChatError::from_api(source, stage, &message, &message));
            }
        };

        tracing::info!(stage, username = %reply.user.username, "authenticated");
        self.state.send_modify(|session| {
            session.user = Some(reply.user.clone());
            session.loading = false;
        });

        Ok(LoginOutcome {
            user: reply.user,
            message: reply.message,
        })
    }

    /// Notifies the server when possible, then always clears the local user.
    pub async fn logout(&self) {
        if let Err(error) = self.backend.logout().await {
            tracing::warn!(error = %error, "logout request failed, clearing local session anyway");
        }
        self.clear_user();
    }

    /// Clears the user after a store observed a 401.
    pub fn expire(&self) {
        if self.clear_user() {
            tracing::info!("session expired");
        }
    }

    fn clear_user(&self) -> bool {
        self.state.send_if_modified(|session| {
            let changed = session.user.is_some() || session.loading;
            session.user = None;
            session.loading = false;
            changed
        })
    }
}
