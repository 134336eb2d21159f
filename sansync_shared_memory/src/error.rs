//! Error types for shared memory operations

use sansync::config::ConfigError;
use thiserror::Error;

/// Errors that can occur during shared memory operations
#[derive(Error, Debug)]
pub enum ShmError {
    /// Segment is not mapped or the lifecycle is not ready
    #[error("Segment not ready")]
    NotReady,

    /// Lifecycle is mid-transition and cannot accept the request
    #[error("Lifecycle busy: {phase}")]
    InvalidState {
        /// Phase observed when the request arrived
        phase: &'static str,
    },

    /// Argument rejected before touching shared memory
    #[error("Invalid argument: {reason}")]
    InvalidArgument {
        /// What was wrong with the argument
        reason: &'static str,
    },

    /// Payload does not fit the region together with its terminator
    #[error("Payload too large: {len} bytes (capacity {capacity}, terminator included)")]
    PayloadTooLarge {
        /// Payload length
        len: usize,
        /// Region capacity
        capacity: usize,
    },

    /// Destination buffer cannot hold the value and its terminator
    #[error("Buffer too small: need {required} bytes, got {capacity}")]
    BufferTooSmall {
        /// Bytes required, terminator included
        required: usize,
        /// Bytes offered by the caller
        capacity: usize,
    },

    /// Access descriptor rejected
    #[error("Invalid access descriptor: {reason}")]
    InvalidDescriptor {
        /// Why the descriptor is unusable
        reason: String,
    },

    /// Segment name is not a valid POSIX shared memory name
    #[error("Invalid segment name: {name:?}")]
    InvalidName {
        /// Offending name
        name: String,
    },

    /// Segment or byte span has the wrong size
    #[error("Invalid segment size: {size} bytes (need at least {required})")]
    InvalidSize {
        /// Observed size in bytes
        size: usize,
        /// Required size in bytes
        required: usize,
    },

    /// Segment not found
    #[error("Segment not found: {name}")]
    NotFound {
        /// Segment name
        name: String,
    },

    /// Permission denied
    #[error("Permission denied accessing segment: {name}")]
    PermissionDenied {
        /// Segment name
        name: String,
    },

    /// Drain loop thread could not be spawned
    #[error("Failed to start drain loop: {source}")]
    DrainStart {
        /// Source IO error
        source: std::io::Error,
    },

    /// IO error
    #[error("IO error: {source}")]
    Io {
        /// Source IO error
        #[from]
        source: std::io::Error,
    },

    /// Nix system call error
    #[error("System call error: {source}")]
    Nix {
        /// Source nix error
        #[from]
        source: nix::Error,
    },

    /// JSON serialization/deserialization error
    #[error("JSON error: {source}")]
    Json {
        /// Source JSON error
        #[from]
        source: serde_json::Error,
    },

    /// Configuration error
    #[error("Configuration error: {source}")]
    Config {
        /// Source configuration error
        #[from]
        source: ConfigError,
    },
}

impl ShmError {
    /// Underlying OS error code, when the failure came from the OS.
    pub fn os_code(&self) -> Option<i32> {
        match self {
            ShmError::Io { source } | ShmError::DrainStart { source } => source.raw_os_error(),
            ShmError::Nix { source } => Some(*source as i32),
            _ => None,
        }
    }
}

/// Result type for shared memory operations
pub type ShmResult<T> = Result<T, ShmError>;
