#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Session decode error: {0}")]
    Decode(String),
    #[error("admin login failed: {status} {body}")]
    Auth { status: u16, body: String },
    #[error("No accessToken received: {0}")]
    MissingToken(&'static str),
    #[error("{0}")]
    Validation(String),
    #[error("{status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },
    #[cfg(feature = "reqwest")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Storage error: {0}")]
    Store(String),
    #[error("Action already in progress")]
    Busy,
}

impl Error {
    /// Whether the error was raised locally, before any request left the process.
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::Busy | Self::Decode(_))
    }
}
