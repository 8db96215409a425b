use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The server answered with a non-2xx status; `message` is its explanation.
    #[error("{status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("session file: {0}")]
    SessionIo(#[from] std::io::Error),

    #[error("session file is corrupt: {0}")]
    SessionFormat(#[from] serde_json::Error),

    /// Input rejected before anything was sent.
    #[error("{0}")]
    Validation(String),

    #[error("not logged in")]
    NotLoggedIn,
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }
}
