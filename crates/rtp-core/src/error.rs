use std::io;
use thiserror::Error;

/// Error raised while decoding RTP or RTCP wire data.
///
/// Always recoverable: the offending datagram is dropped.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Fewer bytes than a field or declared length requires
    #[error("Truncated packet: need {required} bytes but have {available}")]
    Truncated { required: usize, available: usize },

    /// Version field is not 2
    #[error("Invalid version: {0}")]
    InvalidVersion(u8),

    /// Declared length disagrees with the datagram
    #[error("Invalid length: declared {declared} bytes but have {available}")]
    InvalidLength { declared: usize, available: usize },

    /// Structurally invalid contents
    #[error("Malformed packet: {0}")]
    Malformed(String),
}

/// Error raised while encoding RTP or RTCP wire data
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    /// Output buffer cannot hold the encoded packet
    #[error("Buffer too small: need {required} but have {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// A field value cannot be represented on the wire
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Error type for session operations
#[derive(Debug, Error, Clone)]
pub enum Error {
    /// Wire data could not be decoded
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Packet could not be encoded
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Operation attempted before the required negotiation
    #[error("Session not ready: {0}")]
    NotReady(String),

    /// Underlying transport is gone
    #[error("Transport closed")]
    TransportClosed,

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(String),

    /// SRTP protect/unprotect failure
    #[error("Security error: {0}")]
    Security(String),

    /// IO error when sending/receiving packets
    #[error("IO error: {0}")]
    Io(String),
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => Error::TransportClosed,
            _ => Error::Io(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let truncated = ParseError::Truncated { required: 12, available: 4 };
        assert_eq!(truncated.to_string(), "Truncated packet: need 12 bytes but have 4");

        let buffer_err = EncodeError::BufferTooSmall { required: 100, available: 50 };
        assert_eq!(buffer_err.to_string(), "Buffer too small: need 100 but have 50");

        let err: Error = buffer_err.into();
        assert!(err.to_string().starts_with("Encode error"));

        let io_err = Error::from(io::Error::new(io::ErrorKind::NotFound, "file not found"));
        assert!(io_err.to_string().contains("IO error"));
    }

    #[test]
    fn test_broken_pipe_is_transport_closed() {
        let err = Error::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(matches!(err, Error::TransportClosed));
    }
}
