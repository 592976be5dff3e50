use crate::ingest::pixels::PixelBuffer;
use crate::prelude::{SyncError, SyncResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One decodable video frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    #[serde(rename = "t", default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub img: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
}

impl Frame {
    pub fn at(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp: Some(timestamp),
            img: None,
            src: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.img = Some(source.into());
        self
    }

    /// Reference the frame source uses to locate the frame's pixels.
    pub fn pixel_source(&self) -> Option<&str> {
        self.img.as_deref().or(self.src.as_deref())
    }
}

/// Ordered per-frame timestamps describing a decoded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageryManifest {
    #[serde(default)]
    pub id: String,
    pub frames: Vec<Frame>,
}

impl ImageryManifest {
    pub fn new(id: impl Into<String>, frames: Vec<Frame>) -> Self {
        Self {
            id: id.into(),
            frames,
        }
    }

    /// Parses a manifest document; `fallback_id` names it when the document has no id.
    pub fn from_json(text: &str, fallback_id: &str) -> SyncResult<Self> {
        let mut manifest: ImageryManifest = serde_json::from_str(text)
            .map_err(|err| SyncError::InvalidInput(format!("manifest {fallback_id}: {err}")))?;
        if manifest.id.is_empty() {
            manifest.id = fallback_id.to_string();
        }
        Ok(manifest)
    }

    pub fn identity(&self) -> &str {
        &self.id
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Timestamps of the first and last frame.
    pub fn time_bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let first = self.frames.first()?.timestamp?;
        let last = self.frames.last()?.timestamp?;
        Some((first, last))
    }

    /// Video playback offset of frame `index`, spreading frames evenly over `duration_sec`.
    pub fn playback_offset(&self, index: usize, duration_sec: f64) -> f64 {
        let count = self.len();
        if count <= 1 || !(duration_sec > 0.0) {
            return 0.0;
        }
        let step = duration_sec / (count - 1) as f64;
        (index as f64 * step).clamp(0.0, duration_sec)
    }

    /// Frame shown at playback offset `offset_sec`.
    pub fn frame_at_offset(&self, offset_sec: f64, duration_sec: f64) -> usize {
        let count = self.len();
        if count <= 1 || !(duration_sec > 0.0) || !offset_sec.is_finite() {
            return 0;
        }
        let step = duration_sec / (count - 1) as f64;
        let index = (offset_sec / step).round().max(0.0) as usize;
        index.min(count - 1)
    }
}

/// Supplies decoded pixels for manifest frames on demand.
pub trait FrameSource {
    fn frame_pixels(&mut self, index: usize, frame: &Frame) -> SyncResult<PixelBuffer>;
}
