//! Backend abstraction for talking to the edge agent
//!
//! The readiness poller and the inference loop only see the
//! `EdgeAgentBackend` trait. The production implementation is the gRPC
//! backend, which reaches the agent over its Unix domain socket; tests plug in
//! a scripted backend instead.

use crate::error::EdgeAgentError;
use crate::types::{DetectionRequest, DetectionResult, ModelDescription, ModelStatus};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub mod grpc;

/// Well-known socket the edge agent listens on.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/aws.iot.lookoutvision.EdgeAgent.sock";

/// Configuration for different backend types
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// gRPC over a Unix domain socket
    Grpc {
        /// Path to the agent's socket
        socket_path: PathBuf,
        /// How long to wait for the socket to accept connections
        connect_timeout: Duration,
        /// Upper bound for every individual call
        call_timeout: Duration,
    },
}

impl Default for BackendConfig {
    fn default() -> Self {
        BackendConfig::Grpc {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            connect_timeout: Duration::from_secs(10),
            call_timeout: Duration::from_secs(30),
        }
    }
}

/// Trait for edge agent backends
///
/// Every call blocks until the agent answers, the transport fails or the
/// backend's timeout expires.
pub trait EdgeAgentBackend {
    /// Fetch the model's description, including its lifecycle status
    fn describe_model(&mut self, model_component: &str)
        -> Result<ModelDescription, EdgeAgentError>;

    /// Ask the agent to start the model; returns the status it reports
    fn start_model(&mut self, model_component: &str) -> Result<ModelStatus, EdgeAgentError>;

    /// Run anomaly detection on one frame
    fn detect_anomalies(
        &mut self,
        request: &DetectionRequest,
    ) -> Result<DetectionResult, EdgeAgentError>;
}

impl<B: EdgeAgentBackend + ?Sized> EdgeAgentBackend for Box<B> {
    fn describe_model(
        &mut self,
        model_component: &str,
    ) -> Result<ModelDescription, EdgeAgentError> {
        (**self).describe_model(model_component)
    }

    fn start_model(&mut self, model_component: &str) -> Result<ModelStatus, EdgeAgentError> {
        (**self).start_model(model_component)
    }

    fn detect_anomalies(
        &mut self,
        request: &DetectionRequest,
    ) -> Result<DetectionResult, EdgeAgentError> {
        (**self).detect_anomalies(request)
    }
}

impl<B: EdgeAgentBackend + ?Sized> EdgeAgentBackend for &mut B {
    fn describe_model(
        &mut self,
        model_component: &str,
    ) -> Result<ModelDescription, EdgeAgentError> {
        (**self).describe_model(model_component)
    }

    fn start_model(&mut self, model_component: &str) -> Result<ModelStatus, EdgeAgentError> {
        (**self).start_model(model_component)
    }

    fn detect_anomalies(
        &mut self,
        request: &DetectionRequest,
    ) -> Result<DetectionResult, EdgeAgentError> {
        (**self).detect_anomalies(request)
    }
}

/// Factory function to create the appropriate backend
pub fn create_backend(
    config: &BackendConfig,
) -> Result<Box<dyn EdgeAgentBackend>, EdgeAgentError> {
    match config {
        BackendConfig::Grpc { .. } => Ok(Box::new(grpc::GrpcBackend::connect(config)?)),
    }
}

/// Run a remote call, retrying it once if the first attempt fails.
///
/// The first failure is logged with its status code; the second is returned.
/// Only remote-call errors are retried.
pub fn retry_once<T, F>(method: &str, mut call: F) -> Result<T, EdgeAgentError>
where
    F: FnMut() -> Result<T, EdgeAgentError>,
{
    match call() {
        Ok(value) => Ok(value),
        Err(err) if err.class() == crate::error::ErrorClass::RemoteCall => {
            match &err {
                EdgeAgentError::RemoteCall { code, .. } => {
                    warn!(method, code = ?code, "call failed, retrying once: {err}");
                }
                _ => warn!(method, "call failed, retrying once: {err}"),
            }
            call()
        }
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unavailable() -> EdgeAgentError {
        EdgeAgentError::RemoteCall {
            method: "DescribeModel",
            code: tonic::Code::Unavailable,
            message: "busy".to_string(),
        }
    }

    #[test]
    fn retry_once_recovers_from_single_failure() {
        let mut calls = 0;
        let result = retry_once("DescribeModel", || {
            calls += 1;
            if calls == 1 {
                Err(unavailable())
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls, 2);
    }

    #[test]
    fn retry_once_gives_up_after_second_failure() {
        let mut calls = 0;
        let result: Result<(), _> = retry_once("DescribeModel", || {
            calls += 1;
            Err(unavailable())
        });
        assert!(matches!(
            result,
            Err(EdgeAgentError::RemoteCall {
                code: tonic::Code::Unavailable,
                ..
            })
        ));
        assert_eq!(calls, 2);
    }

    #[test]
    fn retry_once_does_not_retry_input_errors() {
        let mut calls = 0;
        let result: Result<(), _> = retry_once("DetectAnomalies", || {
            calls += 1;
            Err(EdgeAgentError::InvalidInput("too wide".to_string()))
        });
        assert!(matches!(result, Err(EdgeAgentError::InvalidInput(_))));
        assert_eq!(calls, 1);
    }
}
