//! Media sources that feed frames into the inference loop.
//!
//! A source string is classified into one of three kinds:
//! - Still images (`jpg`, `jpeg`, `png`), decoded with the `image` crate
//! - Video files (`avi`, `mp4`, `flv`), captured with GStreamer (feature: gstreamer)
//! - Camera devices given as a non-negative index, captured with GStreamer (feature: gstreamer)
//!
//! Every source yields packed RGB frames. Any colour conversion happens here,
//! so the loop can put frames on the wire as they are.

mod capture;
mod still;

pub use capture::{CameraStream, VideoStream};
pub use still::StillImage;

use crate::error::EdgeAgentError;
use crate::types::Bitmap;
use std::fmt;
use std::path::Path;
use tracing::info;

const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];
const VIDEO_EXTENSIONS: [&str; 3] = ["avi", "mp4", "flv"];

/// What a source string refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceKind {
    Image,
    Video,
    /// Camera device index
    Camera(u32),
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Image => f.write_str("image"),
            SourceKind::Video => f.write_str("video"),
            SourceKind::Camera(index) => write!(f, "camera {index}"),
        }
    }
}

/// How many frames a source will produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLimit {
    Bounded(u64),
    Unbounded,
}

/// A source of RGB frames.
pub trait FrameSource {
    /// Frame dimensions as `(height, width)`
    fn dimensions(&self) -> (u32, u32);

    /// Upper bound on the number of frames the loop should request
    fn frame_limit(&self) -> FrameLimit;

    /// Read the next frame. `Ok(None)` means the stream has ended.
    fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError>;
}

/// Exactly one of these is open per run.
pub enum MediaSource {
    StillImage(StillImage),
    Video(VideoStream),
    Camera(CameraStream),
}

impl MediaSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            MediaSource::StillImage(_) => SourceKind::Image,
            MediaSource::Video(_) => SourceKind::Video,
            MediaSource::Camera(camera) => SourceKind::Camera(camera.index()),
        }
    }

    fn inner(&self) -> &dyn FrameSource {
        match self {
            MediaSource::StillImage(image) => image,
            MediaSource::Video(video) => video,
            MediaSource::Camera(camera) => camera,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn FrameSource {
        match self {
            MediaSource::StillImage(image) => image,
            MediaSource::Video(video) => video,
            MediaSource::Camera(camera) => camera,
        }
    }
}

impl FrameSource for MediaSource {
    fn dimensions(&self) -> (u32, u32) {
        self.inner().dimensions()
    }

    fn frame_limit(&self) -> FrameLimit {
        self.inner().frame_limit()
    }

    fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
        self.inner_mut().next_frame()
    }
}

/// Decide what kind of source a string names.
///
/// Extensions are matched case-insensitively. A string without a known
/// extension made only of decimal digits names a camera; an index too large
/// for a device number fails as `SourceUnavailable`.
pub fn classify_source(source: &str) -> Result<SourceKind, EdgeAgentError> {
    let extension = source.rsplit_once('.').map(|(_, ext)| ext);

    if let Some(ext) = extension {
        if IMAGE_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)) {
            return Ok(SourceKind::Image);
        }
        if VIDEO_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)) {
            return Ok(SourceKind::Video);
        }
    }

    if source.is_empty() || !source.bytes().all(|b| b.is_ascii_digit()) {
        return Err(EdgeAgentError::UnrecognizedSource(source.to_string()));
    }
    source.parse::<u32>().map(SourceKind::Camera).map_err(|_| {
        EdgeAgentError::SourceUnavailable(format!("camera index {source} is out of range"))
    })
}

/// Classify and open a source.
pub fn open_source(source: &str) -> Result<MediaSource, EdgeAgentError> {
    let kind = classify_source(source)?;

    let media = match kind {
        SourceKind::Image => {
            info!("Image location = {source}");
            MediaSource::StillImage(StillImage::open(source)?)
        }
        SourceKind::Video => {
            info!("Video location = {source}");
            let path = Path::new(source);
            if !path.is_file() {
                return Err(EdgeAgentError::FileError(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("video file {source} not found"),
                )));
            }
            MediaSource::Video(VideoStream::open(path)?)
        }
        SourceKind::Camera(index) => {
            info!("Camera ID = {index}");
            MediaSource::Camera(CameraStream::open(index)?)
        }
    };

    let (height, width) = media.dimensions();
    info!("{} size (HxW) = ({height},{width})", media.kind());
    if let FrameLimit::Bounded(frames) = media.frame_limit() {
        info!("{} has {frames} frame(s)", media.kind());
    }

    Ok(media)
}
