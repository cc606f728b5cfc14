//! Video file and camera capture.
//!
//! With the `gstreamer` feature, both sources run a small GStreamer pipeline
//! that ends in an `appsink` negotiated to packed RGB. Without it, opening
//! either source fails with `EdgeAgentError::Unsupported`.

#[cfg(feature = "gstreamer")]
pub use gst_capture::{CameraStream, VideoStream};

#[cfg(not(feature = "gstreamer"))]
pub use unsupported::{CameraStream, VideoStream};

const NANOS_PER_SECOND: u128 = 1_000_000_000;

/// Number of frames in a stream lasting `duration_ns` at `fps_num / fps_den`
/// frames per second, rounded to the nearest frame.
///
/// `None` when the rate is unusable or the stream holds no frame.
#[cfg_attr(not(feature = "gstreamer"), allow(dead_code))]
pub(crate) fn estimate_frame_count(duration_ns: u64, fps_num: i32, fps_den: i32) -> Option<u64> {
    if fps_num <= 0 || fps_den <= 0 {
        return None;
    }
    let scale = fps_den as u128 * NANOS_PER_SECOND;
    let frames = (u128::from(duration_ns) * fps_num as u128 + scale / 2) / scale;
    u64::try_from(frames).ok().filter(|&frames| frames > 0)
}

/// Copy `height` rows of `row_bytes` each out of a plane whose rows start
/// `stride` bytes apart, dropping the padding at the end of every row.
///
/// `None` if the plane is too short for the requested rows.
#[cfg_attr(not(feature = "gstreamer"), allow(dead_code))]
pub(crate) fn pack_rows(
    plane: &[u8],
    stride: usize,
    row_bytes: usize,
    height: usize,
) -> Option<Vec<u8>> {
    if stride < row_bytes {
        return None;
    }
    let mut packed = Vec::with_capacity(row_bytes * height);
    for row in 0..height {
        let start = row * stride;
        packed.extend_from_slice(plane.get(start..start + row_bytes)?);
    }
    Some(packed)
}

#[cfg(feature = "gstreamer")]
mod gst_capture {
    use super::super::{FrameLimit, FrameSource};
    use super::{estimate_frame_count, pack_rows};
    use crate::error::EdgeAgentError;
    use crate::types::Bitmap;
    use gst::prelude::*;
    use gstreamer as gst;
    use gstreamer_app as gst_app;
    use gstreamer_video as gst_video;
    use std::path::Path;
    use tracing::{debug, warn};

    const PREROLL_TIMEOUT_SECS: u64 = 10;

    fn unavailable(what: &str, detail: impl std::fmt::Display) -> EdgeAgentError {
        EdgeAgentError::SourceUnavailable(format!("{what}: {detail}"))
    }

    /// A running pipeline ending in an RGB appsink.
    struct Capture {
        pipeline: gst::Pipeline,
        appsink: gst_app::AppSink,
        info: gst_video::VideoInfo,
        what: String,
    }

    impl Capture {
        /// Build `description`, let `configure` set properties on the element
        /// named `src`, then preroll to learn the negotiated frame size.
        fn start(
            what: String,
            description: &str,
            configure: impl FnOnce(&gst::Element),
        ) -> Result<Self, EdgeAgentError> {
            gst::init().map_err(|e| unavailable(&what, e))?;

            let pipeline = gst::parse::launch(description)
                .map_err(|e| unavailable(&what, e))?
                .downcast::<gst::Pipeline>()
                .map_err(|_| unavailable(&what, "launch description is not a pipeline"))?;

            let src = pipeline
                .by_name("src")
                .ok_or_else(|| unavailable(&what, "pipeline has no source element"))?;
            configure(&src);

            let appsink = pipeline
                .by_name("sink")
                .and_then(|sink| sink.downcast::<gst_app::AppSink>().ok())
                .ok_or_else(|| unavailable(&what, "pipeline has no appsink"))?;

            pipeline
                .set_state(gst::State::Paused)
                .map_err(|e| unavailable(&what, e))?;
            let (result, _, _) = pipeline.state(gst::ClockTime::from_seconds(PREROLL_TIMEOUT_SECS));
            if let Err(e) = result {
                let _ = pipeline.set_state(gst::State::Null);
                return Err(unavailable(&what, e));
            }

            let preroll = match appsink.pull_preroll() {
                Ok(sample) => sample,
                Err(e) => {
                    let _ = pipeline.set_state(gst::State::Null);
                    return Err(unavailable(&what, e));
                }
            };
            let info = preroll
                .caps()
                .ok_or_else(|| unavailable(&what, "prerolled sample has no caps"))
                .and_then(|caps| {
                    gst_video::VideoInfo::from_caps(caps).map_err(|e| unavailable(&what, e))
                })?;

            pipeline
                .set_state(gst::State::Playing)
                .map_err(|e| unavailable(&what, e))?;

            debug!(
                "{what} negotiated {}x{} {:?}",
                info.width(),
                info.height(),
                info.format()
            );

            Ok(Self {
                pipeline,
                appsink,
                info,
                what,
            })
        }

        fn dimensions(&self) -> (u32, u32) {
            (self.info.height(), self.info.width())
        }

        /// Frame count for finite streams, when the container reports one.
        fn frame_count(&self) -> Option<u64> {
            if let Some(frames) = self.pipeline.query_duration::<gst::format::Default>() {
                if *frames > 0 {
                    return Some(*frames);
                }
            }

            let duration = self.pipeline.query_duration::<gst::ClockTime>()?;
            let fps = self.info.fps();
            estimate_frame_count(duration.nseconds(), fps.numer(), fps.denom())
        }

        /// Pull the next sample and strip row padding. `None` at end of stream.
        fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
            let sample = match self.appsink.pull_sample() {
                Ok(sample) => sample,
                Err(_) => {
                    if !self.appsink.is_eos() {
                        warn!("{} stopped delivering frames", self.what);
                    }
                    return Ok(None);
                }
            };

            let buffer = sample
                .buffer()
                .ok_or_else(|| unavailable(&self.what, "sample has no buffer"))?;
            let frame = gst_video::VideoFrameRef::from_buffer_ref_readable(buffer, &self.info)
                .map_err(|e| unavailable(&self.what, e))?;

            let width = self.info.width();
            let height = self.info.height();
            let row_bytes = width as usize * Bitmap::RGB_CHANNELS;
            let stride = frame.plane_stride()[0] as usize;
            let plane = frame
                .plane_data(0)
                .map_err(|e| unavailable(&self.what, e))?;

            let packed = pack_rows(plane, stride, row_bytes, height as usize)
                .ok_or_else(|| unavailable(&self.what, "short frame buffer"))?;

            Bitmap::rgb(width, height, packed).map(Some)
        }
    }

    impl Drop for Capture {
        fn drop(&mut self) {
            let _ = self.pipeline.set_state(gst::State::Null);
        }
    }

    /// A video file decoded frame by frame.
    pub struct VideoStream {
        capture: Capture,
        frames: Option<u64>,
    }

    impl VideoStream {
        pub fn open(path: &Path) -> Result<Self, EdgeAgentError> {
            let location = path.to_string_lossy().into_owned();
            let capture = Capture::start(
                format!("video file {location}"),
                "filesrc name=src ! decodebin ! videoconvert ! video/x-raw,format=RGB ! \
                 appsink name=sink sync=false",
                |src| src.set_property("location", &location),
            )?;
            let frames = capture.frame_count();
            Ok(Self { capture, frames })
        }
    }

    impl FrameSource for VideoStream {
        fn dimensions(&self) -> (u32, u32) {
            self.capture.dimensions()
        }

        fn frame_limit(&self) -> FrameLimit {
            // Containers without a frame count run until end of stream.
            self.frames
                .map(FrameLimit::Bounded)
                .unwrap_or(FrameLimit::Unbounded)
        }

        fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
            self.capture.next_frame()
        }
    }

    /// A live camera. Only the newest frame is kept between reads.
    pub struct CameraStream {
        capture: Capture,
        index: u32,
    }

    impl CameraStream {
        pub fn open(index: u32) -> Result<Self, EdgeAgentError> {
            let capture = Capture::start(
                format!("camera {index}"),
                &format!(
                    "{} name=src ! videoconvert ! video/x-raw,format=RGB ! \
                     appsink name=sink sync=false max-buffers=1 drop=true",
                    Self::SOURCE_ELEMENT
                ),
                |src| Self::select_device(src, index),
            )?;
            Ok(Self { capture, index })
        }

        pub fn index(&self) -> u32 {
            self.index
        }

        #[cfg(target_os = "macos")]
        const SOURCE_ELEMENT: &'static str = "avfvideosrc";

        #[cfg(not(target_os = "macos"))]
        const SOURCE_ELEMENT: &'static str = "v4l2src";

        #[cfg(target_os = "macos")]
        fn select_device(src: &gst::Element, index: u32) {
            src.set_property("device-index", index as i32);
        }

        #[cfg(not(target_os = "macos"))]
        fn select_device(src: &gst::Element, index: u32) {
            src.set_property("device", format!("/dev/video{index}"));
        }
    }

    impl FrameSource for CameraStream {
        fn dimensions(&self) -> (u32, u32) {
            self.capture.dimensions()
        }

        fn frame_limit(&self) -> FrameLimit {
            FrameLimit::Unbounded
        }

        fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
            self.capture.next_frame()
        }
    }
}

#[cfg(not(feature = "gstreamer"))]
mod unsupported {
    use super::super::{FrameLimit, FrameSource};
    use crate::error::EdgeAgentError;
    use crate::types::Bitmap;
    use std::convert::Infallible;
    use std::path::Path;

    /// Video capture placeholder; cannot be constructed without GStreamer.
    pub struct VideoStream {
        never: Infallible,
    }

    impl VideoStream {
        pub fn open(_path: &Path) -> Result<Self, EdgeAgentError> {
            Err(EdgeAgentError::Unsupported(
                "video files require the gstreamer feature".to_string(),
            ))
        }
    }

    impl FrameSource for VideoStream {
        fn dimensions(&self) -> (u32, u32) {
            match self.never {}
        }

        fn frame_limit(&self) -> FrameLimit {
            match self.never {}
        }

        fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
            match self.never {}
        }
    }

    /// Camera capture placeholder; cannot be constructed without GStreamer.
    pub struct CameraStream {
        never: Infallible,
    }

    impl CameraStream {
        pub fn open(index: u32) -> Result<Self, EdgeAgentError> {
            Err(EdgeAgentError::Unsupported(format!(
                "camera {index} requires the gstreamer feature"
            )))
        }

        pub fn index(&self) -> u32 {
            match self.never {}
        }
    }

    impl FrameSource for CameraStream {
        fn dimensions(&self) -> (u32, u32) {
            match self.never {}
        }

        fn frame_limit(&self) -> FrameLimit {
            match self.never {}
        }

        fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
            match self.never {}
        }
    }
}
