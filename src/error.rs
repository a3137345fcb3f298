//! Unified error types for fmp4-remux

use std::fmt;

/// Result type alias using the library's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for remuxing operations
#[derive(Debug)]
pub enum Error {
    /// The chunk yielded no video NAL units and no audio frames
    EmptyInput,
    /// The remuxer has been closed
    Closed,
    /// Invalid configuration
    Config(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(
                f,
                "Input chunk must carry video and/or audio data that yields at least one unit"
            ),
            Error::Closed => write!(f, "Remuxer closed"),
            Error::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

/// Bitstream parsing errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaError {
    /// Sequence parameter set could not be parsed
    InvalidSps,
    /// ADTS header is malformed
    InvalidAdtsHeader,
    /// AudioSpecificConfig is malformed
    InvalidAudioConfig,
    /// Exp-Golomb or fixed-width read ran past the end of the RBSP
    UnexpectedEof,
}

impl fmt::Display for MediaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaError::InvalidSps => write!(f, "Invalid sequence parameter set"),
            MediaError::InvalidAdtsHeader => write!(f, "Invalid ADTS header"),
            MediaError::InvalidAudioConfig => write!(f, "Invalid AudioSpecificConfig"),
            MediaError::UnexpectedEof => write!(f, "Unexpected end of bitstream"),
        }
    }
}

impl std::error::Error for MediaError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as StdError;

    #[test]
    fn test_error_display() {
        assert!(Error::EmptyInput.to_string().contains("video and/or audio"));
        assert!(Error::Closed.to_string().contains("closed"));

        let err = Error::Config("fps must be positive".into());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("fps"));
    }

    #[test]
    fn test_error_has_no_source() {
        assert!(StdError::source(&Error::EmptyInput).is_none());
        assert!(StdError::source(&Error::Closed).is_none());
    }

    #[test]
    fn test_media_error_display() {
        assert!(MediaError::InvalidSps
            .to_string()
            .contains("sequence parameter set"));
        assert!(MediaError::InvalidAdtsHeader.to_string().contains("ADTS"));
        assert!(MediaError::InvalidAudioConfig
            .to_string()
            .contains("AudioSpecificConfig"));
        assert!(MediaError::UnexpectedEof.to_string().contains("end"));
    }
}
