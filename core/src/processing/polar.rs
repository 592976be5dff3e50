use crate::ingest::segment::Segment;
use crate::math::geo::{GeoPoint, KmOffset, DETECT_RANGE_KM, NM_TO_KM};
use crate::math::grid::{pool_index, OccupancyGrid};
use crate::prelude::{GridStage, SyncConfig};
use ndarray::Array2;

/// Side of the intermediate raster arcs are drawn into before pooling.
pub const WORK_RASTER: usize = 256;
const WORK_CENTER: f64 = (WORK_RASTER as f64 - 1.0) / 2.0;
const MIN_STEP_KM: f64 = 0.5;

#[derive(Debug, Clone)]
pub struct PolarRasterizer {
    grid_size: usize,
    max_range_km: f64,
    intensity_threshold: u8,
    site: GeoPoint,
    reference: GeoPoint,
}

impl PolarRasterizer {
    /// Rasterizer for radar at `site`, centred on the configured reference or the site itself.
    pub fn new(config: &SyncConfig, site: GeoPoint) -> Self {
        Self {
            grid_size: config.grid_size,
            max_range_km: config.max_range_km,
            intensity_threshold: config.intensity_threshold,
            site,
            reference: config.reference_center.unwrap_or(site),
        }
    }

    pub fn reference(&self) -> GeoPoint {
        self.reference
    }

    /// Radial sampling step along one arc.
    pub fn step_km(&self) -> f64 {
        let km_per_pixel = self.max_range_km / WORK_CENTER;
        MIN_STEP_KM.max(km_per_pixel * 0.8)
    }

    pub fn rasterize_segments(&self, segments: &[Segment]) -> OccupancyGrid {
        let mut grid = OccupancyGrid::empty(self.grid_size);
        if segments.is_empty() || self.grid_size == 0 {
            return grid;
        }

        let raster = self.draw(segments);
        for ((ry, rx), &v) in raster.indexed_iter() {
            if v > 0 {
                grid.set(
                    pool_index(rx, WORK_RASTER, self.grid_size),
                    pool_index(ry, WORK_RASTER, self.grid_size),
                );
            }
        }
        grid
    }

    fn draw(&self, segments: &[Segment]) -> Array2<u8> {
        let mut raster = Array2::<u8>::zeros((WORK_RASTER, WORK_RASTER));
        let shift = KmOffset::between(self.reference, self.site).normalized(self.max_range_km);
        let step = self.step_km();

        for segment in segments {
            if segment.category < self.intensity_threshold {
                continue;
            }
            let Some((start_km, end_km)) = self.clip_span(segment) else {
                continue;
            };
            let (sin, cos) = segment.bearing_deg.to_radians().sin_cos();

            let mut r = start_km;
            while r <= end_km {
                let norm = r / self.max_range_km;
                let nx = norm * sin + shift.0;
                let ny = norm * cos + shift.1;
                if let Some((rx, ry)) = to_work_pixel(nx, ny) {
                    paint_brush(&mut raster, rx, ry);
                }
                r += step;
            }
        }
        raster
    }

    /// Radial span to draw in km, limited to the display and detection ranges.
    fn clip_span(&self, segment: &Segment) -> Option<(f64, f64)> {
        if !(segment.bearing_deg.is_finite() && segment.start_nm.is_finite() && segment.end_nm.is_finite()) {
            return None;
        }
        let mut start = segment.start_nm * NM_TO_KM;
        let mut end = segment.end_nm * NM_TO_KM;
        if end < start {
            std::mem::swap(&mut start, &mut end);
        }
        if end <= 0.0 {
            return None;
        }
        start = start.max(0.0);
        if start >= self.max_range_km {
            return None;
        }
        end = end.min(self.max_range_km);
        if end <= start || start > DETECT_RANGE_KM {
            return None;
        }
        Some((start, end.min(DETECT_RANGE_KM)))
    }
}

impl GridStage<[Segment]> for PolarRasterizer {
    fn rasterize(&self, input: &[Segment]) -> OccupancyGrid {
        self.rasterize_segments(input)
    }
}

/// Normalized east/north coordinates to a working pixel; points off the square are dropped.
fn to_work_pixel(nx: f64, ny: f64) -> Option<(usize, usize)> {
    if !(-1.0..=1.0).contains(&nx) || !(-1.0..=1.0).contains(&ny) {
        return None;
    }
    let rx = (WORK_CENTER + nx * WORK_CENTER).round();
    let ry = (WORK_CENTER - ny * WORK_CENTER).round();
    let max = (WORK_RASTER - 1) as f64;
    if !(0.0..=max).contains(&rx) || !(0.0..=max).contains(&ry) {
        return None;
    }
    Some((rx as usize, ry as usize))
}

fn paint_brush(raster: &mut Array2<u8>, rx: usize, ry: usize) {
    let y0 = ry.saturating_sub(1);
    let x0 = rx.saturating_sub(1);
    let y1 = (ry + 1).min(WORK_RASTER - 1);
    let x1 = (rx + 1).min(WORK_RASTER - 1);
    for y in y0..=y1 {
        for x in x0..=x1 {
            raster[[y, x]] = 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(grid_size: usize) -> SyncConfig {
        SyncConfig {
            grid_size,
            max_range_km: 250.0,
            intensity_threshold: 1,
            ..Default::default()
        }
    }

    fn site() -> GeoPoint {
        GeoPoint::new(33.5, 126.5)
    }

    #[test]
    fn no_segments_gives_empty_grid() {
        let grid = PolarRasterizer::new(&config(32), site()).rasterize_segments(&[]);
        assert_eq!(grid.size(), 32);
        assert_eq!(grid.occupied(), 0);
    }

    #[test]
    fn northward_arc_fills_upper_half_of_centre_column() {
        let raster = PolarRasterizer::new(&config(32), site());
        let grid = raster.rasterize(&[Segment::new(1, 3, 0.0, 10.0, 40.0)][..]);
        assert!(grid.occupied() > 0);
        for y in 0..32 {
            for x in 0..32 {
                if grid.get(x, y) {
                    assert!((15..=16).contains(&x), "cell {x},{y} off the centre column");
                    assert!(y <= 16, "cell {x},{y} south of the site");
                }
            }
        }
    }

    #[test]
    fn arcs_below_threshold_are_ignored() {
        let mut cfg = config(32);
        cfg.intensity_threshold = 4;
        let raster = PolarRasterizer::new(&cfg, site());
        let grid = raster.rasterize_segments(&[Segment::new(1, 3, 90.0, 0.0, 30.0)]);
        assert_eq!(grid.occupied(), 0);
    }

    #[test]
    fn spans_are_clipped_to_detection_radius() {
        let raster = PolarRasterizer::new(&config(32), site());
        assert_eq!(
            raster.clip_span(&Segment::new(1, 3, 0.0, 80.0, 10.0)),
            Some((10.0 * NM_TO_KM, DETECT_RANGE_KM))
        );
        assert_eq!(raster.clip_span(&Segment::new(1, 3, 0.0, 61.0, 70.0)), None);
        assert_eq!(raster.clip_span(&Segment::new(1, 3, 0.0, 5.0, 5.0)), None);
        assert_eq!(raster.clip_span(&Segment::new(1, 3, 0.0, 200.0, 300.0)), None);
        assert_eq!(raster.clip_span(&Segment::new(1, 3, 0.0, -40.0, -10.0)), None);
        assert_eq!(
            raster.clip_span(&Segment::new(1, 3, 0.0, -5.0, 10.0)),
            Some((0.0, 10.0 * NM_TO_KM))
        );
    }

    #[test]
    fn negative_ranges_never_cross_the_site() {
        let raster = PolarRasterizer::new(&config(32), site());
        let grid = raster.rasterize_segments(&[Segment::new(1, 3, 0.0, -40.0, -10.0)]);
        assert_eq!(grid.occupied(), 0);

        let grid = raster.rasterize_segments(&[Segment::new(1, 3, 0.0, -20.0, 30.0)]);
        assert!(grid.occupied() > 0);
        for y in 0..32 {
            for x in 0..32 {
                if grid.get(x, y) {
                    assert!(y <= 16, "cell {x},{y} south of the site");
                }
            }
        }
    }

    #[test]
    fn site_east_of_reference_shifts_arcs_right() {
        let cfg = SyncConfig {
            reference_center: Some(GeoPoint::new(33.5, 125.5)),
            ..config(32)
        };
        let raster = PolarRasterizer::new(&cfg, site());
        let grid = raster.rasterize_segments(&[Segment::new(1, 3, 0.0, 0.0, 20.0)]);
        assert!(grid.occupied() > 0);
        for y in 0..32 {
            for x in 0..32 {
                if grid.get(x, y) {
                    assert!(x >= 19, "cell {x},{y} not shifted east");
                }
            }
        }
    }

    #[test]
    fn output_is_independent_of_segment_order() {
        let raster = PolarRasterizer::new(&config(24), site());
        let mut segments = vec![
            Segment::new(1, 2, 45.0, 0.0, 50.0),
            Segment::new(1, 5, 200.0, 10.0, 30.0),
            Segment::new(2, 1, 310.0, 5.0, 59.0),
        ];
        let forward = raster.rasterize_segments(&segments);
        segments.reverse();
        assert_eq!(raster.rasterize_segments(&segments), forward);
    }
}
