//! Unified error types for the companion cache controller.

use tokio_rusqlite::rusqlite;

/// Unified error types shared by the store, the fetch client and the controller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an unknown command).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Network fetch did not settle within the configured bound.
    #[error("FETCH_TIMEOUT: {0}")]
    FetchTimeout(String),

    /// Fetch response too large.
    #[error("FETCH_TOO_LARGE: {0}")]
    FetchTooLarge(String),

    /// Transport-level failure (the fetch rejected).
    #[error("HTTP_ERROR: {0}")]
    HttpError(String),

    /// Operation not allowed in the controller's current lifecycle state.
    #[error("STATE_ERROR: {0}")]
    State(String),
}

impl Error {
    /// Whether this error came from the network rather than the local store.
    pub fn is_network(&self) -> bool {
        matches!(self, Error::FetchTimeout(_) | Error::FetchTooLarge(_) | Error::HttpError(_))
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidUrl("https://app.test/schedule".to_string());
        assert!(err.to_string().contains("INVALID_URL"));
        assert!(err.to_string().contains("/schedule"));
    }

    #[test]
    fn test_network_classification() {
        assert!(Error::HttpError("connection refused".into()).is_network());
        assert!(Error::FetchTimeout("20000ms".into()).is_network());
        assert!(!Error::State("not active".into()).is_network());
        assert!(!Error::MigrationFailed("bad".into()).is_network());
    }
}
