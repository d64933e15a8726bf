//! Error types for rawmux

use crate::{AudioCodec, Container, VideoCodec};
use thiserror::Error;

/// Result type alias for rawmux operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for rawmux operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid input parameter or buffer
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Operation is not valid in the session's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Container lacks a usable codec for one of the media kinds
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Container and audio codec combination is not supported
    #[error("Container {container:?} does not support audio codec {codec:?}")]
    ContainerAudioMismatch { container: Container, codec: AudioCodec },

    /// Container and video codec combination is not supported
    #[error("Container {container:?} does not support video codec {codec:?}")]
    ContainerVideoMismatch { container: Container, codec: VideoCodec },

    /// Unsupported parameter combination (sample rate, frame size, dimensions)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Buffer or context construction failure
    #[error("Allocation error: {0}")]
    Allocation(String),

    /// Codec could not be opened
    #[error("Codec open error: {0}")]
    CodecOpen(String),

    /// Encoding error
    #[error("Encoding error: {0}")]
    Encode(String),

    /// Internal invariant violated (resampler sample count mismatch)
    #[error("Consistency fault: {0}")]
    ConsistencyFault(String),

    /// Muxing error
    #[error("Muxing error: {0}")]
    Mux(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error leaves codec or container state unrecoverable.
    ///
    /// A session that sees one of these from a supply call only permits `close`.
    pub fn is_fatal_to_session(&self) -> bool {
        matches!(
            self,
            Error::Encode(_) | Error::ConsistencyFault(_) | Error::Mux(_) | Error::Io(_)
        )
    }
}

/// Error code for FFI
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub enum ErrorCode {
    /// Success
    Ok = 0,
    /// Invalid input parameter
    InvalidInput = 1,
    /// Operation not valid in the current state
    InvalidState = 2,
    /// Unsupported container/codec/sample rate combination
    ConfigurationError = 3,
    /// Buffer allocation failure
    AllocationError = 4,
    /// Encoding error
    EncodeError = 5,
    /// Internal consistency fault
    ConsistencyFault = 6,
    /// I/O error
    IoError = 7,
    /// Codec could not be opened
    CodecOpenError = 8,
}

impl From<&Error> for ErrorCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::InvalidInput(_) => ErrorCode::InvalidInput,
            Error::InvalidState(_) => ErrorCode::InvalidState,
            Error::UnsupportedFormat(_) => ErrorCode::ConfigurationError,
            Error::ContainerAudioMismatch { .. } => ErrorCode::ConfigurationError,
            Error::ContainerVideoMismatch { .. } => ErrorCode::ConfigurationError,
            Error::Configuration(_) => ErrorCode::ConfigurationError,
            Error::Allocation(_) => ErrorCode::AllocationError,
            Error::CodecOpen(_) => ErrorCode::CodecOpenError,
            Error::Encode(_) => ErrorCode::EncodeError,
            Error::ConsistencyFault(_) => ErrorCode::ConsistencyFault,
            Error::Mux(_) => ErrorCode::IoError,
            Error::Io(_) => ErrorCode::IoError,
        }
    }
}
