use crate::math::geo::{GeoPoint, KmOffset, DETECT_RANGE_KM};
use crate::math::grid::OccupancyGrid;
use crate::math::stats::StatsHelper;
use crate::prelude::{SyncError, SyncResult};
use serde::Serialize;

/// Confusion counts with radar as the prediction and imagery as the reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ConfusionStats {
    pub tp: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tn: usize,
    /// Cells inside the mask.
    pub total: usize,
    pub match_cells: usize,
    pub mismatch_cells: usize,
    pub overall_match_ratio: f64,
    /// Intersection over union of the occupied cells.
    pub active_overlap_ratio: f64,
    pub precision: f64,
    pub recall: f64,
    pub overall_match_percent: u32,
    pub active_overlap_percent: u32,
    pub precision_percent: u32,
    pub recall_percent: u32,
}

impl ConfusionStats {
    pub fn from_counts(tp: usize, fp: usize, fn_: usize, tn: usize) -> Self {
        let total = tp + fp + fn_ + tn;
        let match_cells = tp + tn;
        let overall_match_ratio = StatsHelper::ratio(match_cells, total);
        let active_overlap_ratio = StatsHelper::ratio(tp, tp + fp + fn_);
        let precision = StatsHelper::ratio(tp, tp + fp);
        let recall = StatsHelper::ratio(tp, tp + fn_);
        Self {
            tp,
            fp,
            fn_,
            tn,
            total,
            match_cells,
            mismatch_cells: fp + fn_,
            overall_match_ratio,
            active_overlap_ratio,
            precision,
            recall,
            overall_match_percent: StatsHelper::percent(overall_match_ratio),
            active_overlap_percent: StatsHelper::percent(active_overlap_ratio),
            precision_percent: StatsHelper::percent(precision),
            recall_percent: StatsHelper::percent(recall),
        }
    }
}

/// Compares `radar` against `imagery` over the cells accepted by `mask`.
pub fn compare_grids(
    radar: &OccupancyGrid,
    imagery: &OccupancyGrid,
    mask: impl Fn(usize, usize) -> bool,
) -> SyncResult<ConfusionStats> {
    if radar.size() != imagery.size() {
        return Err(SyncError::GridShapeMismatch {
            radar: radar.size(),
            imagery: imagery.size(),
        });
    }

    let (mut tp, mut fp, mut fn_, mut tn) = (0, 0, 0, 0);
    let n = radar.size();
    for y in 0..n {
        for x in 0..n {
            if !mask(x, y) {
                continue;
            }
            match (radar.get(x, y), imagery.get(x, y)) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, true) => fn_ += 1,
                (false, false) => tn += 1,
            }
        }
    }
    Ok(ConfusionStats::from_counts(tp, fp, fn_, tn))
}

/// Circle of the detection radius around the radar site, in grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectionMask {
    pub center_x: f64,
    pub center_y: f64,
    pub radius: f64,
}

impl DetectionMask {
    pub fn new(grid_size: usize, max_range_km: f64, site: GeoPoint, reference: GeoPoint) -> Self {
        let c = grid_size.saturating_sub(1) as f64 / 2.0;
        let offset = KmOffset::between(reference, site);
        Self {
            center_x: c + offset.east_km / max_range_km * c,
            center_y: c - offset.north_km / max_range_km * c,
            radius: DETECT_RANGE_KM / max_range_km * c,
        }
    }

    pub fn contains(&self, x: usize, y: usize) -> bool {
        let dx = x as f64 - self.center_x;
        let dy = y as f64 - self.center_y;
        dx * dx + dy * dy <= self.radius * self.radius
    }

    /// Zeroes the cells of `grid` outside the circle.
    pub fn apply(&self, grid: &mut OccupancyGrid) {
        grid.retain(|x, y| self.contains(x, y));
    }
}
