use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, rejected before any I/O.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transport failure while streaming a remote file.
    #[error("network failure: {0}")]
    Network(String),

    /// Failure reported by the record store, auth or object storage.
    #[error("backend failure: {0}")]
    Backend(String),

    #[error("failed to save file: {0}")]
    Save(#[source] std::io::Error),

    #[error("authentication required")]
    AuthRequired,

    #[error("admin access required")]
    Forbidden,
}

impl Error {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidRequest(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Error::Backend(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Error::Network(msg.into())
    }

    /// Text suitable for a notice: validation messages verbatim, everything else as displayed.
    pub fn user_message(&self) -> String {
        match self {
            Error::InvalidRequest(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
