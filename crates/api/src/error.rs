use snafu::Snafu;

/// Detail used when neither the server nor the transport explains a failure.
pub const UNKNOWN_ERROR_DETAIL: &str = "Unknown error";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ApiError {
    #[snafu(display("authentication required on `{stage}`"))]
    AuthRequired {
        stage: &'static str,
        message: Option<String>,
    },
    #[snafu(display("server returned status {status} on `{stage}`"))]
    Status {
        stage: &'static str,
        status: u16,
        message: Option<String>,
    },
    #[snafu(display("request failed on `{stage}`: {source}"))]
    Transport {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("failed to decode response on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("invalid URL '{raw}' on `{stage}`: {source}"))]
    InvalidUrl {
        stage: &'static str,
        raw: String,
        source: url::ParseError,
    },
    #[snafu(display("failed to build HTTP client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("server did not assign a conversation id to the new conversation"))]
    MissingConversationId { stage: &'static str },
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn is_auth_required(&self) -> bool {
        matches!(self, Self::AuthRequired { .. })
    }

    /// The `error` field the server put in the response body, if any.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            Self::AuthRequired { message, .. } | Self::Status { message, .. } => message
                .as_deref()
                .map(str::trim)
                .filter(|message| !message.is_empty()),
            _ => None,
        }
    }

    /// Human-readable failure detail: server message, then error text, then a generic marker.
    pub fn detail(&self) -> String {
        if let Some(message) = self.server_message() {
            return message.to_string();
        }

        let rendered = self.to_string();
        if rendered.trim().is_empty() {
            UNKNOWN_ERROR_DETAIL.to_string()
        } else {
            rendered
        }
    }
}
