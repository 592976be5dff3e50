use crate::ingest::legend::{ColorRemovalRule, LegendColor};
use crate::math::geo::GeoPoint;
use crate::math::grid::OccupancyGrid;
use serde::{Deserialize, Serialize};

/// Shared configuration for one comparison run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Side length of both occupancy grids.
    pub grid_size: usize,
    /// Range (km) that maps to the edge of the grid.
    pub max_range_km: f64,
    /// Radar arcs below this intensity category are not drawn.
    pub intensity_threshold: u8,
    /// Trail length used before the first tick and after a playback loop.
    pub trail_default: usize,
    /// Geographic point at the centre of both grids. Defaults to the radar site.
    pub reference_center: Option<GeoPoint>,
    /// Offset of local time from UTC, in whole hours.
    pub utc_offset_hours: i32,
    pub classifier: ClassifierConfig,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            grid_size: 32,
            max_range_km: 250.0,
            intensity_threshold: 1,
            trail_default: 3,
            reference_center: None,
            utc_offset_hours: 9,
            classifier: ClassifierConfig::default(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> SyncResult<()> {
        if self.grid_size == 0 {
            return Err(SyncError::InvalidInput("grid_size must be positive".into()));
        }
        if !(self.max_range_km.is_finite() && self.max_range_km > 0.0) {
            return Err(SyncError::InvalidInput(format!(
                "max_range_km must be positive, got {}",
                self.max_range_km
            )));
        }
        if self.trail_default == 0 {
            return Err(SyncError::InvalidInput("trail_default must be at least 1".into()));
        }
        if self.utc_offset_hours.abs() > 23 {
            return Err(SyncError::InvalidInput(format!(
                "utc_offset_hours out of range: {}",
                self.utc_offset_hours
            )));
        }
        Ok(())
    }
}

/// Thresholds for turning imagery pixels into precipitation values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Radius of the circular region of interest. `None` uses 95% of the half-extent.
    pub roi_radius_px: Option<f64>,
    /// Maximum RGB distance for a pixel to match a legend colour.
    pub color_dist_threshold: f64,
    pub sat_threshold: f64,
    pub min_v: f64,
    pub max_v: f64,
    /// Pooled value at or above which a grid cell counts as occupied.
    pub mm_threshold: f64,
    /// Colour legend. Empty means the HSV fallback is used.
    pub legend: Vec<LegendColor>,
    /// Pixels close to any of these colours are blanked before classification.
    pub removal_rules: Vec<ColorRemovalRule>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            roi_radius_px: None,
            color_dist_threshold: 30.0,
            sat_threshold: 0.25,
            min_v: 0.15,
            max_v: 0.98,
            mm_threshold: 0.1,
            legend: Vec::new(),
            removal_rules: Vec::new(),
        }
    }
}

/// Common error type for the alignment engine.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    #[error("half-day chunk could not be determined for {0}")]
    ChunkUnresolved(String),
    #[error("calendar date could not be determined for {0}")]
    DateUnresolved(String),
    #[error("no segments in {0}")]
    EmptySegments(String),
    #[error("radar and imagery time ranges do not overlap")]
    NoOverlap,
    #[error("grid shape mismatch: radar {radar}x{radar}, imagery {imagery}x{imagery}")]
    GridShapeMismatch { radar: usize, imagery: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("frame source failure: {0}")]
    FrameSource(String),
}

pub type SyncResult<T> = Result<T, SyncError>;

/// A stage that turns one tick's input into an occupancy grid.
pub trait GridStage<I: ?Sized> {
    fn rasterize(&self, input: &I) -> OccupancyGrid;
}
