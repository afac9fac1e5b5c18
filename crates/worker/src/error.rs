//! Errors surfaced by the stdio host.
//!
//! Every variant maps to a stable code in the error reply.

use companion_core::Error;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A line that is not a known event.
    #[error("INVALID_EVENT: {0}")]
    InvalidEvent(String),

    /// The cache store could not be opened, so nothing was registered.
    #[error("NOT_REGISTERED: no controller is registered")]
    NotRegistered,

    #[error(transparent)]
    Controller(#[from] Error),

    #[error("IO_ERROR: {0}")]
    Io(#[from] std::io::Error),
}

impl HostError {
    /// Stable code for the error reply.
    pub fn code(&self) -> &'static str {
        match self {
            HostError::InvalidEvent(_) => "INVALID_EVENT",
            HostError::NotRegistered => "NOT_REGISTERED",
            HostError::Controller(Error::State(_)) => "STATE_ERROR",
            HostError::Controller(e) if e.is_network() => "NETWORK_ERROR",
            HostError::Controller(_) => "CONTROLLER_ERROR",
            HostError::Io(_) => "IO_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(HostError::InvalidEvent("x".into()).code(), "INVALID_EVENT");
        assert_eq!(HostError::NotRegistered.code(), "NOT_REGISTERED");
        assert_eq!(HostError::from(Error::State("x".into())).code(), "STATE_ERROR");
        assert_eq!(HostError::from(Error::FetchTimeout("x".into())).code(), "NETWORK_ERROR");
        assert_eq!(HostError::from(Error::CorruptEntry("x".into())).code(), "CONTROLLER_ERROR");
    }

    #[test]
    fn test_display() {
        assert_eq!(HostError::InvalidEvent("bad json".into()).to_string(), "INVALID_EVENT: bad json");
        assert_eq!(HostError::from(Error::State("nope".into())).to_string(), "STATE_ERROR: nope");
    }
}
