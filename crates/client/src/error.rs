use parlor_api::ApiError;
use snafu::{IntoError, Snafu};

pub const GENERIC_FAILURE_MESSAGE: &str = "An error occurred. Please try again.";

/// Store-level failure carrying a display-ready message.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatError {
    #[snafu(display("{message}"))]
    AuthRequired {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("{message}"))]
    Validation {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("{message}"))]
    Upstream {
        stage: &'static str,
        message: String,
        source: ApiError,
    },
}

pub type ChatResult<T> = Result<T, ChatError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    AuthRequired,
    Validation,
    Upstream,
}

impl ChatError {
    /// Splits an API failure into the auth-required and upstream kinds.
    pub(crate) fn from_api(
        source: ApiError,
        stage: &'static str,
        auth_message: &str,
        upstream_message: &str,
    ) -> Self {
        if source.is_auth_required() {
            return AuthRequiredSnafu {
                stage,
                message: auth_message,
            }
            .build();
        }
        UpstreamSnafu {
            stage,
            message: upstream_message,
        }
        .into_error(source)
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::AuthRequired { .. } => FailureKind::AuthRequired,
            Self::Validation { .. } => FailureKind::Validation,
            Self::Upstream { .. } => FailureKind::Upstream,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::AuthRequired { message, .. }
            | Self::Validation { message, .. }
            | Self::Upstream { message, .. } => message,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            Self::AuthRequired { stage, .. }
            | Self::Validation { stage, .. }
            | Self::Upstream { stage, .. } => stage,
        }
    }
}

/// Dismissible notice shown above the chat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    pub kind: FailureKind,
    pub message: String,
}

impl From<&ChatError> for Banner {
    fn from(error: &ChatError) -> Self {
        Self {
            kind: error.kind(),
            message: error.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_api_errors_become_auth_required() {
        let source = ApiError::AuthRequired {
            stage: "list-conversations",
            message: None,
        };
        let error = ChatError::from_api(source, "load-conversations", "login first", "failed");

        assert_eq!(error.kind(), FailureKind::AuthRequired);
        assert_eq!(error.to_string(), "login first");
    }

    #[test]
    fn other_api_errors_keep_their_source() {
        let source = ApiError::Status {
            stage: "list-conversations",
            status: 500,
            message: None,
        };
        let error = ChatError::from_api(source, "load-conversations", "login first", "failed");
        let banner = Banner::from(&error);

        assert_eq!(banner.kind, FailureKind::Upstream);
        assert_eq!(banner.message, "failed");
        assert!(matches!(
            error,
            ChatError::Upstream {
                source: ApiError::Status { status: 500, .. },
                ..
            }
        ));
    }
}
