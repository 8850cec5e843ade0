//! [`Error`][core::error::Error] types used across the crate

use core::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// Result alias used by every fallible operation in the crate
pub type Result<T, E = EventSourceError> = core::result::Result<T, E>;

/// Everything that can go wrong while addressing, opening or reading a stream.
///
/// The lifecycle loop never gives up on any of these; they are handed to the
/// error listener and followed by the usual retry delay.
#[derive(Debug, Error)]
pub enum EventSourceError {
    /// The target could not be parsed as an absolute URI
    #[error("invalid uri: {0}")]
    InvalidUri(#[from] url::ParseError),

    /// The target uses a scheme no transport is available for
    #[error("unsupported uri scheme `{0}`")]
    UnsupportedScheme(String),

    /// The resource does not exist (missing file, 404 or 410)
    #[error("resource not found: {0}")]
    NotFound(String),

    /// The server answered with a status that does not carry a stream
    #[error("unexpected response status {0}")]
    Status(StatusCode),

    /// Connecting or waiting for the next chunk took longer than the read timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Transport level failure inside the HTTP client
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Transport level failure while reading a local resource
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The server closed the stream without signalling `204 No Content`
    #[error("stream ended")]
    StreamEnded,

    /// An EventSource was constructed outside of a tokio runtime
    #[error("no tokio runtime available to drive the event source")]
    NoRuntime,
}

impl EventSourceError {
    /// `true` for errors caused by the target address itself rather than the network
    pub fn is_addressing(&self) -> bool {
        matches!(self, Self::InvalidUri(_) | Self::UnsupportedScheme(_))
    }

    /// `true` if a connect or read timed out
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Http(e) => e.is_timeout(),
            Self::Io(e) => e.kind() == std::io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let err = EventSourceError::from(url::Url::parse("not/an/absolute/url").unwrap_err());
        assert!(err.is_addressing());
        assert!(!err.is_timeout());

        assert!(EventSourceError::UnsupportedScheme("gopher".into()).is_addressing());
        assert!(EventSourceError::Timeout(Duration::from_millis(500)).is_timeout());
        assert!(!EventSourceError::StreamEnded.is_addressing());
    }

    #[test]
    fn display() {
        assert_eq!(
            EventSourceError::Status(StatusCode::INTERNAL_SERVER_ERROR).to_string(),
            "unexpected response status 500 Internal Server Error"
        );
        assert_eq!(
            EventSourceError::UnsupportedScheme("gopher".into()).to_string(),
            "unsupported uri scheme `gopher`"
        );
    }
}
