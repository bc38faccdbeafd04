use thiserror::Error;

/// everything that can go wrong talking to the api
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// the request never got a response: connection refused, timeout, dns...
    #[error("request failed: {0}")]
    Transport(String),
    /// the server answered but the envelope's `code` wasn't a success. Holds the server's `msg`
    #[error("{0}")]
    Application(String),
    /// 401 - the session token is missing or stale
    #[error("not logged in")]
    Unauthorized,
    /// 403 - the account has been banned
    #[error("access forbidden")]
    Forbidden,
    /// any other non-2xx status
    #[error("server responded with {status}: {message}")]
    Status { status: u16, message: String },
    /// the body wasn't the json we expected
    #[error("could not read response: {0}")]
    Decode(String),
}

impl ApiError {
    /// authorization failures are handled by the session, not shown as a generic failure
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::Unauthorized | Self::Forbidden)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Transport("request timed out".to_string())
        } else {
            Self::Transport(value.to_string())
        }
    }
}
