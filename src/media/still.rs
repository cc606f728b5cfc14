use super::{FrameLimit, FrameSource};
use crate::error::EdgeAgentError;
use crate::types::Bitmap;
use std::path::Path;

/// A decoded still image, served as a single-frame source.
///
/// Reads do not advance: every call returns the same frame. The frame limit
/// of one is what stops the loop.
#[derive(Debug, Clone)]
pub struct StillImage {
    frame: Bitmap,
}

impl StillImage {
    /// Decode an image file into packed RGB.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, EdgeAgentError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(EdgeAgentError::FileError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("image file {} not found", path.display()),
            )));
        }

        // Grayscale, RGBA and 16-bit inputs all end up as 8-bit RGB here.
        let rgb = image::open(path)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        Ok(Self {
            frame: Bitmap::rgb(width, height, rgb.into_raw())?,
        })
    }
}

impl FrameSource for StillImage {
    fn dimensions(&self) -> (u32, u32) {
        (self.frame.height, self.frame.width)
    }

    fn frame_limit(&self) -> FrameLimit {
        FrameLimit::Bounded(1)
    }

    fn next_frame(&mut self) -> Result<Option<Bitmap>, EdgeAgentError> {
        Ok(Some(self.frame.clone()))
    }
}
