//! Error types for the edge agent client.
//!
//! This module defines the errors that can occur while resolving the media
//! source, talking to the edge agent and running the inference loop.
//!
//! The main error type is `EdgeAgentError`. Each variant belongs to one
//! `ErrorClass`, which decides how the command-line client exits.

use std::time::Duration;
use thiserror::Error;

use crate::types::ModelStatus;

/// Represents all possible errors that can occur in the edge agent client.
#[derive(Error, Debug)]
pub enum EdgeAgentError {
    /// Indicates a failure in file system operations when accessing the input.
    ///
    /// This error occurs when the image or video file does not exist or
    /// cannot be read.
    #[error("Failed to access input file: {0}")]
    FileError(#[from] std::io::Error),

    /// Indicates that the source string is neither a known image or video
    /// file name nor a camera index.
    #[error("Unrecognized source '{0}': expected an image (jpg, jpeg, png), a video (avi, mp4, flv) or a camera index")]
    UnrecognizedSource(String),

    /// Indicates that an image file could not be decoded.
    #[error("Failed to decode image: {0}")]
    ImageError(#[from] image::ImageError),

    /// Indicates that a video file or camera could not be opened.
    ///
    /// This error occurs when:
    /// - The capture pipeline cannot be built or prerolled
    /// - The camera device does not exist or is busy
    /// - The stream does not expose usable frame dimensions
    #[error("Unable to open {0}")]
    SourceUnavailable(String),

    /// Indicates that the requested source kind is not compiled in.
    #[error("Unsupported source: {0}")]
    Unsupported(String),

    /// Indicates that the edge agent socket could not be reached.
    ///
    /// This error occurs when:
    /// - The socket file never appears within the connect timeout
    /// - The socket refuses connections for an unexpected reason
    #[error("Socket communication error: {0}")]
    SocketError(String),

    /// Indicates a failure to establish the gRPC channel.
    #[error("Transport error: {0}")]
    Transport(#[from] tonic::transport::Error),

    /// Indicates that the edge agent answered a call with a non-OK status.
    #[error("{method} failed with {code:?}: {message}")]
    RemoteCall {
        /// The RPC that failed, e.g. `DetectAnomalies`
        method: &'static str,
        /// The gRPC status code returned by the agent
        code: tonic::Code,
        /// The status message returned by the agent
        message: String,
    },

    /// Indicates that the edge agent did not answer within the call timeout.
    #[error("{method} timed out after {timeout:?}")]
    Timeout {
        /// The RPC that timed out
        method: &'static str,
        /// The per-call timeout that expired
        timeout: Duration,
    },

    /// Indicates that the model did not become runnable and the configured
    /// policy forbids running inference against it.
    #[error("Model '{model}' is not ready (last status: {status})")]
    ModelNotReady {
        /// The model component name
        model: String,
        /// The last status reported by the agent
        status: ModelStatus,
    },

    /// Indicates that a frame cannot be expressed in the wire format.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Indicates that results could not be written to the console.
    #[error("Failed to write results: {0}")]
    Output(std::io::Error),

    /// Indicates that the local async runtime could not be started.
    #[error("Runtime error: {0}")]
    Runtime(String),
}

/// Coarse grouping of errors, used to pick the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The media source could not be resolved. No RPC was attempted.
    InputResolution,
    /// The model never became runnable and the policy is to abort.
    ModelReadiness,
    /// Transport or service-side failure.
    RemoteCall,
    /// A frame could not be encoded for the wire.
    InvalidInput,
    /// Results could not be written out.
    Output,
}

impl EdgeAgentError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EdgeAgentError::FileError(_)
            | EdgeAgentError::UnrecognizedSource(_)
            | EdgeAgentError::ImageError(_)
            | EdgeAgentError::SourceUnavailable(_)
            | EdgeAgentError::Unsupported(_) => ErrorClass::InputResolution,
            EdgeAgentError::ModelNotReady { .. } => ErrorClass::ModelReadiness,
            EdgeAgentError::SocketError(_)
            | EdgeAgentError::Transport(_)
            | EdgeAgentError::RemoteCall { .. }
            | EdgeAgentError::Timeout { .. }
            | EdgeAgentError::Runtime(_) => ErrorClass::RemoteCall,
            EdgeAgentError::InvalidInput(_) => ErrorClass::InvalidInput,
            EdgeAgentError::Output(_) => ErrorClass::Output,
        }
    }

    /// Process exit code for this error.
    ///
    /// Input resolution failures exit with 255, which is how a shell sees the
    /// `-1` returned by the reference client. Everything else exits with 1.
    pub fn exit_code(&self) -> u8 {
        match self.class() {
            ErrorClass::InputResolution => 255,
            ErrorClass::ModelReadiness
            | ErrorClass::RemoteCall
            | ErrorClass::InvalidInput
            | ErrorClass::Output => 1,
        }
    }

    /// Build a `RemoteCall` error from a gRPC status.
    pub(crate) fn from_status(method: &'static str, status: tonic::Status) -> Self {
        EdgeAgentError::RemoteCall {
            method,
            code: status.code(),
            message: status.message().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_exit_with_255() {
        let err = EdgeAgentError::UnrecognizedSource("foo".to_string());
        assert_eq!(err.class(), ErrorClass::InputResolution);
        assert_eq!(err.exit_code(), 255);

        let err = EdgeAgentError::FileError(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "missing.mp4",
        ));
        assert_eq!(err.exit_code(), 255);
    }

    #[test]
    fn remote_errors_exit_with_1() {
        let err = EdgeAgentError::from_status(
            "DetectAnomalies",
            tonic::Status::unavailable("agent restarting"),
        );
        assert_eq!(err.class(), ErrorClass::RemoteCall);
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "DetectAnomalies failed with Unavailable: agent restarting"
        );
    }
}
