use thiserror::Error;

use pony_types::api::ErrorBody;

/// Shown when an error carries nothing a user can act on.
pub const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Every way a request can fail, from before it is sent to after the
/// response is parsed. `Clone` so one failed fetch can be handed to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The request never produced a response (connect failure, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status.
    #[error("{message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    /// A body could not be encoded, or a success body did not match the
    /// endpoint's schema.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Rejected on the client before any request was made.
    #[error("{0}")]
    Validation(String),

    /// The operation needs a session and there is none.
    #[error("not logged in")]
    Unauthenticated,
}

impl ApiError {
    /// Build an error from a non-2xx status and its raw body.
    pub fn from_response(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<ErrorBody>(body) {
            Ok(ErrorBody { error, message }) => Self::Api {
                status,
                code: error,
                message,
            },
            Err(_) => Self::Api {
                status,
                code: "unknown".into(),
                message: format!("Request failed with status {status}"),
            },
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// 403: missing membership, bad token, acting for someone else.
    pub fn is_forbidden(&self) -> bool {
        self.status() == Some(403)
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Text fit for display. Server and validation messages pass through
    /// verbatim; anything else collapses to a generic line.
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { message, .. } | Self::Validation(message) => message.clone(),
            Self::Unauthenticated => "You must be logged in to do that.".into(),
            Self::Network(_) | Self::Serialization(_) => GENERIC_FAILURE.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network(format!("request timed out: {e}"))
        } else {
            Self::Network(e.to_string())
        }
    }
}
