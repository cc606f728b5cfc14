//! Wire types for the `AWS.LookoutVision.EdgeAgent` gRPC service.
//!
//! The message structs and the client stub have the same shape as
//! `tonic-build` output for the edge agent's `edge-agent.proto`. They are
//! written out by hand so the crate builds without `protoc`.
//!
//! The service exposes:
//! - Model lifecycle calls (`DescribeModel`, `StartModel`, `StopModel`, `ListModels`)
//! - Inference (`DetectAnomalies`)
//!
//! Conversions into the client's own types (`crate::types`) live at the bottom
//! of this module.

use crate::types;

/// Pixel payload. The agent accepts either inline bytes or a shared memory
/// segment; this client always sends inline bytes.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Bitmap {
    #[prost(int32, tag = "1")]
    pub width: i32,
    #[prost(int32, tag = "2")]
    pub height: i32,
    #[prost(oneof = "bitmap::Data", tags = "3, 4")]
    pub data: ::core::option::Option<bitmap::Data>,
}

pub mod bitmap {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Data {
        #[prost(bytes = "vec", tag = "3")]
        ByteData(::prost::alloc::vec::Vec<u8>),
        #[prost(message, tag = "4")]
        SharedMemoryHandle(super::SharedMemoryHandle),
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SharedMemoryHandle {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(uint64, tag = "2")]
    pub size: u64,
    #[prost(uint64, tag = "3")]
    pub offset: u64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DetectAnomaliesRequest {
    #[prost(string, tag = "1")]
    pub model_component: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub bitmap: ::core::option::Option<Bitmap>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DetectAnomaliesResponse {
    #[prost(message, optional, tag = "1")]
    pub detect_anomaly_result: ::core::option::Option<DetectAnomalyResult>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DetectAnomalyResult {
    #[prost(bool, tag = "1")]
    pub is_anomalous: bool,
    #[prost(float, tag = "2")]
    pub confidence: f32,
    #[prost(message, optional, tag = "3")]
    pub anomaly_mask: ::core::option::Option<Bitmap>,
    #[prost(message, repeated, tag = "4")]
    pub anomalies: ::prost::alloc::vec::Vec<Anomaly>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Anomaly {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "2")]
    pub pixel_anomaly: ::core::option::Option<PixelAnomaly>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PixelAnomaly {
    #[prost(float, tag = "1")]
    pub total_percentage_area: f32,
    #[prost(string, tag = "2")]
    pub hex_color: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartModelRequest {
    #[prost(string, tag = "1")]
    pub model_component: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartModelResponse {
    #[prost(enumeration = "ModelStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopModelRequest {
    #[prost(string, tag = "1")]
    pub model_component: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopModelResponse {
    #[prost(enumeration = "ModelStatus", tag = "1")]
    pub status: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListModelsRequest {}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ListModelsResponse {
    #[prost(message, repeated, tag = "1")]
    pub models: ::prost::alloc::vec::Vec<ModelMetadata>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DescribeModelRequest {
    #[prost(string, tag = "1")]
    pub model_component: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct DescribeModelResponse {
    #[prost(message, optional, tag = "1")]
    pub model_description: ::core::option::Option<ModelDescription>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelMetadata {
    #[prost(string, tag = "1")]
    pub model_component: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub lookout_vision_project: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub model_version: ::prost::alloc::string::String,
    #[prost(enumeration = "ModelStatus", tag = "4")]
    pub status: i32,
    #[prost(string, tag = "5")]
    pub status_message: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ModelDescription {
    #[prost(string, tag = "1")]
    pub model_component: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub lookout_vision_project: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub model_version: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub lookout_vision_edge_agent_version: ::prost::alloc::string::String,
    #[prost(enumeration = "ModelStatus", tag = "5")]
    pub status: i32,
    #[prost(string, tag = "6")]
    pub status_message: ::prost::alloc::string::String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ModelStatus {
    Stopped = 0,
    Starting = 1,
    Running = 2,
    Failed = 3,
    Stopping = 4,
}

/// Client stub for the `EdgeAgent` service.
pub mod edge_agent_client {
    #![allow(unused_variables, dead_code, missing_docs, clippy::let_unit_value)]
    use tonic::codegen::http::Uri;
    use tonic::codegen::*;

    const SERVICE: &str = "AWS.LookoutVision.EdgeAgent";

    #[derive(Debug, Clone)]
    pub struct EdgeAgentClient<T> {
        inner: tonic::client::Grpc<T>,
    }

    impl<T> EdgeAgentClient<T>
    where
        T: tonic::client::GrpcService<tonic::body::BoxBody>,
        T::Error: Into<StdError>,
        T::ResponseBody: Body<Data = Bytes> + std::marker::Send + 'static,
        <T::ResponseBody as Body>::Error: Into<StdError> + std::marker::Send,
    {
        pub fn new(inner: T) -> Self {
            let inner = tonic::client::Grpc::new(inner);
            Self { inner }
        }

        pub fn with_origin(inner: T, origin: Uri) -> Self {
            let inner = tonic::client::Grpc::with_origin(inner, origin);
            Self { inner }
        }

        /// Limits the maximum size of a decoded message.
        ///
        /// Default: `4MB`
        #[must_use]
        pub fn max_decoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_decoding_message_size(limit);
            self
        }

        /// Limits the maximum size of an encoded message.
        ///
        /// Default: `usize::MAX`
        #[must_use]
        pub fn max_encoding_message_size(mut self, limit: usize) -> Self {
            self.inner = self.inner.max_encoding_message_size(limit);
            self
        }

        async fn ready(&mut self) -> std::result::Result<(), tonic::Status> {
            self.inner
                .ready()
                .await
                .map_err(|e| tonic::Status::unknown(format!("Service was not ready: {}", e.into())))
        }

        pub async fn detect_anomalies(
            &mut self,
            request: impl tonic::IntoRequest<super::DetectAnomaliesRequest>,
        ) -> std::result::Result<tonic::Response<super::DetectAnomaliesResponse>, tonic::Status>
        {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path = http::uri::PathAndQuery::from_static(
                "/AWS.LookoutVision.EdgeAgent/DetectAnomalies",
            );
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE, "DetectAnomalies"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn start_model(
            &mut self,
            request: impl tonic::IntoRequest<super::StartModelRequest>,
        ) -> std::result::Result<tonic::Response<super::StartModelResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/AWS.LookoutVision.EdgeAgent/StartModel");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE, "StartModel"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn stop_model(
            &mut self,
            request: impl tonic::IntoRequest<super::StopModelRequest>,
        ) -> std::result::Result<tonic::Response<super::StopModelResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/AWS.LookoutVision.EdgeAgent/StopModel");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE, "StopModel"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn list_models(
            &mut self,
            request: impl tonic::IntoRequest<super::ListModelsRequest>,
        ) -> std::result::Result<tonic::Response<super::ListModelsResponse>, tonic::Status> {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/AWS.LookoutVision.EdgeAgent/ListModels");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE, "ListModels"));
            self.inner.unary(req, path, codec).await
        }

        pub async fn describe_model(
            &mut self,
            request: impl tonic::IntoRequest<super::DescribeModelRequest>,
        ) -> std::result::Result<tonic::Response<super::DescribeModelResponse>, tonic::Status>
        {
            self.ready().await?;
            let codec = tonic::codec::ProstCodec::default();
            let path =
                http::uri::PathAndQuery::from_static("/AWS.LookoutVision.EdgeAgent/DescribeModel");
            let mut req = request.into_request();
            req.extensions_mut()
                .insert(GrpcMethod::new(SERVICE, "DescribeModel"));
            self.inner.unary(req, path, codec).await
        }
    }
}

impl From<&types::Bitmap> for Bitmap {
    fn from(bitmap: &types::Bitmap) -> Self {
        Self {
            // Dimensions are validated against i32 before a request is built.
            width: bitmap.width as i32,
            height: bitmap.height as i32,
            data: Some(bitmap::Data::ByteData(bitmap.data.clone())),
        }
    }
}

impl From<Bitmap> for types::Bitmap {
    fn from(bitmap: Bitmap) -> Self {
        let data = match bitmap.data {
            Some(bitmap::Data::ByteData(bytes)) => bytes,
            // Shared memory masks are not mapped by this client.
            Some(bitmap::Data::SharedMemoryHandle(_)) | None => Vec::new(),
        };
        Self {
            width: bitmap.width.max(0) as u32,
            height: bitmap.height.max(0) as u32,
            data,
        }
    }
}

impl From<Anomaly> for types::Anomaly {
    fn from(anomaly: Anomaly) -> Self {
        let pixel = anomaly.pixel_anomaly.unwrap_or_default();
        Self {
            name: anomaly.name,
            total_percentage_area: pixel.total_percentage_area,
            hex_color: pixel.hex_color,
        }
    }
}

impl From<DetectAnomalyResult> for types::DetectionResult {
    fn from(result: DetectAnomalyResult) -> Self {
        Self {
            is_anomalous: result.is_anomalous,
            confidence: result.confidence,
            anomaly_mask: result.anomaly_mask.map(Into::into),
            anomalies: result.anomalies.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<ModelDescription> for types::ModelDescription {
    fn from(description: ModelDescription) -> Self {
        Self {
            model_component: description.model_component,
            status: types::ModelStatus::from_wire(description.status),
            status_message: description.status_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anomaly_without_pixel_data_defaults() {
        let anomaly: types::Anomaly = Anomaly {
            name: "background".to_string(),
            pixel_anomaly: None,
        }
        .into();
        assert_eq!(anomaly.total_percentage_area, 0.0);
        assert!(anomaly.hex_color.is_empty());
    }

    #[test]
    fn result_conversion_keeps_mask_dimensions() {
        let wire = DetectAnomalyResult {
            is_anomalous: true,
            confidence: 0.75,
            anomaly_mask: Some(Bitmap {
                width: 8,
                height: 6,
                data: Some(bitmap::Data::ByteData(vec![0; 8 * 6 * 3])),
            }),
            anomalies: vec![Anomaly {
                name: "crack".to_string(),
                pixel_anomaly: Some(PixelAnomaly {
                    total_percentage_area: 0.02,
                    hex_color: "#FF0000".to_string(),
                }),
            }],
        };

        let result: types::DetectionResult = wire.into();
        let mask = result.anomaly_mask.expect("mask");
        assert_eq!((mask.height, mask.width), (6, 8));
        assert_eq!(result.anomalies.len(), 1);
        assert_eq!(result.anomalies[0].name, "crack");
        assert_eq!(result.anomalies[0].hex_color, "#FF0000");
    }
}
