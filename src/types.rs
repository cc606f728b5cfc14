//! Common types used throughout the edge agent client.
//!
//! These are the client's own view of the edge agent's data: model status,
//! bitmaps and detection results. The protobuf wire types live in
//! `messages` and are converted into these at the backend boundary.

use std::fmt;

use crate::error::EdgeAgentError;
use crate::messages;

/// Lifecycle status of a model as tracked by the edge agent.
///
/// The agent owns this state; the client only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelStatus {
    Stopped,
    Starting,
    Running,
    Failed,
    Stopping,
    /// A status value this client does not know, with its raw wire code.
    Unknown(i32),
}

impl ModelStatus {
    /// Convert the raw enumeration value carried on the wire.
    pub fn from_wire(raw: i32) -> Self {
        match messages::ModelStatus::try_from(raw) {
            Ok(messages::ModelStatus::Stopped) => ModelStatus::Stopped,
            Ok(messages::ModelStatus::Starting) => ModelStatus::Starting,
            Ok(messages::ModelStatus::Running) => ModelStatus::Running,
            Ok(messages::ModelStatus::Failed) => ModelStatus::Failed,
            Ok(messages::ModelStatus::Stopping) => ModelStatus::Stopping,
            Err(_) => ModelStatus::Unknown(raw),
        }
    }

    /// Display label, as the agent's own tooling prints it.
    pub fn label(&self) -> &'static str {
        match self {
            ModelStatus::Stopped => "STOPPED",
            ModelStatus::Starting => "STARTING",
            ModelStatus::Running => "RUNNING",
            ModelStatus::Failed => "FAILED",
            ModelStatus::Stopping => "STOPPING",
            ModelStatus::Unknown(_) => "UNKNOWN",
        }
    }
}

impl fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelStatus::Unknown(raw) => write!(f, "UNKNOWN({raw})"),
            known => f.write_str(known.label()),
        }
    }
}

/// Description of a model as returned by `DescribeModel`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelDescription {
    /// Name of the model component
    pub model_component: String,
    /// Current lifecycle status
    pub status: ModelStatus,
    /// Free-form status message from the agent, may be empty
    pub status_message: String,
}

/// Raw pixel payload exchanged with the edge agent.
///
/// Pixel data is row-major. Requests always carry packed RGB, three bytes per
/// pixel; anomaly masks use whatever layout the agent sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel bytes
    pub data: Vec<u8>,
}

impl Bitmap {
    /// Number of colour channels in request bitmaps.
    pub const RGB_CHANNELS: usize = 3;

    /// Create an RGB bitmap, checking that the buffer matches the dimensions.
    pub fn rgb(width: u32, height: u32, data: Vec<u8>) -> Result<Self, EdgeAgentError> {
        let expected = width as usize * height as usize * Self::RGB_CHANNELS;
        if data.len() != expected {
            return Err(EdgeAgentError::InvalidInput(format!(
                "RGB buffer for {width}x{height} must be {expected} bytes, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }
}

/// A single inference request, built fresh for every frame.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    /// Model component to run
    pub model_component: String,
    /// Frame to analyse, packed RGB
    pub bitmap: Bitmap,
}

/// A named anomaly region found by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Anomaly {
    /// Anomaly label, e.g. `scratch`
    pub name: String,
    /// Share of the image covered by this anomaly
    pub total_percentage_area: f32,
    /// Display colour used for this anomaly in the mask, e.g. `#23A436`
    pub hex_color: String,
}

/// Decoded result of a `DetectAnomalies` call.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionResult {
    /// Whether the frame as a whole is anomalous
    pub is_anomalous: bool,
    /// Confidence of the overall prediction (usually 0.0 to 1.0)
    pub confidence: f32,
    /// Segmentation mask, only present for segmentation models
    pub anomaly_mask: Option<Bitmap>,
    /// Named anomalies, only present for segmentation models
    pub anomalies: Vec<Anomaly>,
}

impl fmt::Display for DetectionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "    is_anomalous: {}", self.is_anomalous)?;
        writeln!(f, "    confidence: {}", self.confidence)?;
        for (i, anomaly) in self.anomalies.iter().enumerate() {
            writeln!(f, "    Anomaly #{}", i + 1)?;
            writeln!(f, "        ---------------------")?;
            writeln!(
                f,
                "        Total Percentage Area: {:.6}",
                anomaly.total_percentage_area
            )?;
            writeln!(f, "        Hex Color: {}", anomaly.hex_color)?;
            writeln!(f, "        Name: {}", anomaly.name)?;
            writeln!(f, "        ---------------------")?;
        }
        match &self.anomaly_mask {
            Some(mask) => writeln!(
                f,
                "    Anomaly Mask Size (HxW): ({},{})",
                mask.height, mask.width
            ),
            None => writeln!(f, "    Anomaly Mask: none"),
        }
    }
}
