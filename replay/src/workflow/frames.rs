use log::debug;
use std::path::{Path, PathBuf};
use wxsynccore::ingest::{Frame, FrameSource, PixelBuffer};
use wxsynccore::{SyncError, SyncResult};

/// Reads frame images (PNG/JPEG) extracted from the imagery video.
pub struct ImageFrames {
    root: PathBuf,
}

impl ImageFrames {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File a frame's pixels are read from; unnamed frames use `frame_<index>.png`.
    pub fn path_for(&self, index: usize, frame: &Frame) -> PathBuf {
        match frame.pixel_source() {
            Some(source) if Path::new(source).is_absolute() => PathBuf::from(source),
            Some(source) => self.root.join(source),
            None => self.root.join(format!("frame_{index:04}.png")),
        }
    }
}

impl FrameSource for ImageFrames {
    fn frame_pixels(&mut self, index: usize, frame: &Frame) -> SyncResult<PixelBuffer> {
        let path = self.path_for(index, frame);
        debug!("decoding frame {} from {}", index, path.display());
        let image = image::open(&path)
            .map_err(|err| SyncError::FrameSource(format!("{}: {}", path.display(), err)))?
            .to_rgba8();
        let (width, height) = image.dimensions();
        PixelBuffer::from_rgba(width as usize, height as usize, image.into_raw())
    }
}
