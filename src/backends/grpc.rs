//! gRPC backend implementation
//!
//! This module provides the backend that talks to the edge agent over its
//! Unix domain socket. Calls are async in tonic; the backend owns a
//! current-thread Tokio runtime and drives each call to completion, so callers
//! see a blocking API with a per-call timeout.

use super::{BackendConfig, EdgeAgentBackend};
use crate::error::EdgeAgentError;
use crate::messages::edge_agent_client::EdgeAgentClient;
use crate::messages::{DescribeModelRequest, DetectAnomaliesRequest, StartModelRequest};
use crate::types::{DetectionRequest, DetectionResult, ModelDescription, ModelStatus};
use hyper_util::rt::TokioIo;
use std::future::Future;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::Path;
use std::time::{Duration, Instant};
use tokio::net::UnixStream;
use tokio::runtime::Runtime;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;
use tracing::{debug, info};

/// Largest response the client accepts. Anomaly masks are full-resolution
/// bitmaps, well above tonic's 4MB default.
const MAX_MESSAGE_BYTES: usize = 64 * 1024 * 1024;

/// gRPC backend for the edge agent
pub struct GrpcBackend {
    /// Upper bound for every individual call
    call_timeout: Duration,
    /// Runtime driving the tonic client
    runtime: Runtime,
    /// Client stub bound to the socket channel
    client: EdgeAgentClient<Channel>,
}

impl GrpcBackend {
    /// Connect to the edge agent described by `config`.
    pub fn connect(config: &BackendConfig) -> Result<Self, EdgeAgentError> {
        let BackendConfig::Grpc {
            socket_path,
            connect_timeout,
            call_timeout,
        } = config;

        // Wait until the agent is accepting connections
        Self::connect_with_retry(socket_path, *connect_timeout)?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| EdgeAgentError::Runtime(format!("Failed to start runtime: {e}")))?;

        let path = socket_path.clone();
        let channel = runtime.block_on(async move {
            // The URI is ignored by the connector; it only has to parse.
            Endpoint::try_from("http://[::]:50051")?
                .connect_timeout(*connect_timeout)
                .connect_with_connector(service_fn(move |_: Uri| {
                    let path = path.clone();
                    async move {
                        let stream = UnixStream::connect(path).await?;
                        Ok::<_, std::io::Error>(TokioIo::new(stream))
                    }
                }))
                .await
        })?;

        info!("Connected to edge agent at {}", socket_path.display());

        let client = EdgeAgentClient::new(channel).max_decoding_message_size(MAX_MESSAGE_BYTES);

        Ok(Self {
            call_timeout: *call_timeout,
            runtime,
            client,
        })
    }

    /// Attempts to connect to the Unix socket with a retry mechanism
    ///
    /// NotFound and ConnectionRefused are expected while the agent is still
    /// creating its socket, so those are retried until `timeout` expires. Any
    /// other error is returned immediately.
    pub(crate) fn connect_with_retry(
        socket_path: &Path,
        timeout: Duration,
    ) -> Result<(), EdgeAgentError> {
        debug!("Attempting to connect to socket: {}", socket_path.display());
        let start = Instant::now();
        let retry_interval = Duration::from_millis(100);

        loop {
            match StdUnixStream::connect(socket_path) {
                Ok(_probe) => return Ok(()),
                Err(e)
                    if e.kind() != std::io::ErrorKind::NotFound
                        && e.kind() != std::io::ErrorKind::ConnectionRefused =>
                {
                    return Err(EdgeAgentError::SocketError(format!(
                        "Failed to connect to socket {}: {e}",
                        socket_path.display()
                    )));
                }
                Err(_) => {}
            }
            if start.elapsed() >= timeout {
                break;
            }
            std::thread::sleep(retry_interval);
        }

        Err(EdgeAgentError::SocketError(format!(
            "Timeout waiting for socket {} to become available",
            socket_path.display()
        )))
    }

    /// Drive one call to completion under the per-call timeout
    fn call<T, F>(&self, method: &'static str, fut: F) -> Result<T, EdgeAgentError>
    where
        F: Future<Output = Result<tonic::Response<T>, tonic::Status>>,
    {
        let timeout = self.call_timeout;
        let outcome = self
            .runtime
            .block_on(async { tokio::time::timeout(timeout, fut).await });

        match outcome {
            Ok(Ok(response)) => Ok(response.into_inner()),
            Ok(Err(status)) => Err(EdgeAgentError::from_status(method, status)),
            Err(_elapsed) => Err(EdgeAgentError::Timeout { method, timeout }),
        }
    }
}

impl EdgeAgentBackend for GrpcBackend {
    fn describe_model(
        &mut self,
        model_component: &str,
    ) -> Result<ModelDescription, EdgeAgentError> {
        let request = DescribeModelRequest {
            model_component: model_component.to_string(),
        };
        let mut client = self.client.clone();
        let response = self.call("DescribeModel", client.describe_model(request))?;

        let description = response.model_description.ok_or_else(|| EdgeAgentError::RemoteCall {
            method: "DescribeModel",
            code: tonic::Code::Internal,
            message: "response carried no model description".to_string(),
        })?;
        debug!(status = description.status, "DescribeModel answered");
        Ok(description.into())
    }

    fn start_model(&mut self, model_component: &str) -> Result<ModelStatus, EdgeAgentError> {
        let request = StartModelRequest {
            model_component: model_component.to_string(),
        };
        let mut client = self.client.clone();
        let response = self.call("StartModel", client.start_model(request))?;
        Ok(ModelStatus::from_wire(response.status))
    }

    fn detect_anomalies(
        &mut self,
        request: &DetectionRequest,
    ) -> Result<DetectionResult, EdgeAgentError> {
        let bitmap = &request.bitmap;
        if i32::try_from(bitmap.width).is_err() || i32::try_from(bitmap.height).is_err() {
            return Err(EdgeAgentError::InvalidInput(format!(
                "frame {}x{} does not fit the bitmap wire format",
                bitmap.width, bitmap.height
            )));
        }

        let wire = DetectAnomaliesRequest {
            model_component: request.model_component.clone(),
            bitmap: Some(bitmap.into()),
        };
        debug!(
            width = bitmap.width,
            height = bitmap.height,
            bytes = bitmap.data.len(),
            "sending DetectAnomalies"
        );

        let mut client = self.client.clone();
        let response = self.call("DetectAnomalies", client.detect_anomalies(wire))?;

        let result = response
            .detect_anomaly_result
            .ok_or_else(|| EdgeAgentError::RemoteCall {
                method: "DetectAnomalies",
                code: tonic::Code::Internal,
                message: "response carried no detection result".to_string(),
            })?;
        Ok(result.into())
    }
}
