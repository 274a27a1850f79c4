//! Shared error taxonomy for the pipeline.
//!
//! Transient kinds (`ReadTimeout`, `MalformedFrame`,
//! `InsufficientDetections`, `WriteShort`) are logged at the worker loop
//! and never propagate across stages. `DeviceUnavailable` on a mandatory
//! transport and `ConfigInvalid` are fatal at startup.

use thiserror::Error;

/// Errors that can occur in pipeline workers and transports.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required device could not be opened.
    #[error("device unavailable: {device}: {reason}")]
    DeviceUnavailable {
        /// Device path or identifier.
        device: String,
        /// Underlying failure description.
        reason: String,
    },

    /// A device read did not complete within its poll timeout.
    #[error("read timeout on {device}")]
    ReadTimeout {
        /// Device path or identifier.
        device: String,
    },

    /// Received bytes did not form a valid frame.
    #[error("malformed frame: {reason}")]
    MalformedFrame {
        /// What failed to parse.
        reason: String,
    },

    /// No usable detections this cycle (recovered by the selector TTL).
    #[error("insufficient detections this cycle")]
    InsufficientDetections,

    /// Serial write completed short.
    #[error("short write: {written} of {expected} bytes")]
    WriteShort {
        /// Bytes actually written.
        written: usize,
        /// Bytes expected.
        expected: usize,
    },

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    /// IO error from the underlying transport.
    #[error("io error: {source}")]
    Io {
        /// Source IO error.
        #[from]
        source: std::io::Error,
    },
}

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
