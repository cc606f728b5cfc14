//! Test doubles for the edge agent and media sources.

use crate::backends::EdgeAgentBackend;
use crate::error::EdgeAgentError;
use crate::media::{FrameLimit, FrameSource};
use crate::types::{
    Anomaly, Bitmap, DetectionRequest, DetectionResult, ModelDescription, ModelStatus,
};
use std::collections::VecDeque;

/// Scripted edge agent that records every call.
///
/// `DescribeModel` answers with the scripted statuses in order and keeps
/// repeating the last one.
pub(crate) struct MockAgent {
    statuses: VecDeque<ModelStatus>,
    pub status_message: String,
    pub detect_failures: u32,
    pub describe_calls: u32,
    pub start_calls: u32,
    pub detect_calls: u32,
    pub requests: Vec<(String, u32, u32)>,
}

impl MockAgent {
    pub fn with_statuses(statuses: impl IntoIterator<Item = ModelStatus>) -> Self {
        Self {
            statuses: statuses.into_iter().collect(),
            status_message: String::new(),
            detect_failures: 0,
            describe_calls: 0,
            start_calls: 0,
            detect_calls: 0,
            requests: Vec::new(),
        }
    }

    pub fn total_calls(&self) -> u32 {
        self.describe_calls + self.start_calls + self.detect_calls
    }
}

impl EdgeAgentBackend for MockAgent {
    fn describe_model(
        &mut self,
        model_component: &str,
    ) -> Result<ModelDescription, EdgeAgentError> {
        self.describe_calls += 1;
        let status = if self.statuses.len() > 1 {
            self.statuses.pop_front()
        } else {
            self.statuses.front().copied()
        }
        .unwrap_or(ModelStatus::Running);

        Ok(ModelDescription {
            model_component: model_component.to_string(),
            status,
            status_message: self.status_message.clone(),
        })
    }

    fn start_model(&mut self, _model_component: &str) -> Result<ModelStatus, EdgeAgentError> {
        self.start_calls += 1;
        Ok(ModelStatus::Starting)
    }

    fn detect_anomalies(
        &mut self,
        request: &DetectionRequest,
    ) -> Result<DetectionResult, EdgeAgentError> {
        self.detect_calls += 1;
        if self.detect_failures > 0 {
            self.detect_failures -= 1;
            return Err(EdgeAgentError::RemoteCall {
                method: "DetectAnomalies",
                code: tonic::Code::Unavailable,
                message: "model not loaded".to_string(),
            });
        }

        self.requests.push((
            request.model_component.clone(),
            request.bitmap.width,
            request.bitmap.height,
        ));
        Ok(DetectionResult {
            is_anomalous: true,
            confidence: 0.92,
            anomaly_mask: Some(Bitmap {
                width: request.bitmap.width,
                height: request.bitmap.height,
                data: Vec::new(),
            }),
            anomalies: vec![Anomaly {
                name: "scratch".to_string(),
                total_percentage_area: 0.05,
                hex_color: "#23A436".to_string(),
            }],
        })
    }
}

/// Frame source that serves a fixed number of blank frames, then ends.
pub(crate) struct ScriptedSource {
    pub remaining: u64,
    pub limit: FrameLimit,
    pub reads: u64,
}

impl ScriptedSource {
    pub fn new(available: u64, limit: FrameLimit) -> Self {
        Self {
            remaining: available,
            limit,
            reads: 0,
        }
    }
}

impl FrameSource for ScriptedSource {
    fn dimensions(&self) -> (u32, u32) {
        (2, 3)
    }

    fn frame_limit(&self) -> FrameLimit {
        self.limit
    }

    fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
        self.reads += 1;
        if self.remaining == 0 {
            return Ok(None);
        }
        self.remaining -= 1;
        Bitmap::rgb(3, 2, vec![0; 3 * 2 * 3]).map(Some)
    }
}
