use crate::ingest::legend::{apply_color_removal, Legend};
use crate::ingest::pixels::PixelBuffer;
use crate::math::color::rgb8_to_hsv;
use crate::math::grid::{pool_index, OccupancyGrid};
use crate::prelude::{ClassifierConfig, GridStage};
use ndarray::Array2;
use std::borrow::Cow;

const ROI_FILL: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct ImageryRasterizer {
    grid_size: usize,
    config: ClassifierConfig,
    legend: Legend,
}

impl ImageryRasterizer {
    pub fn new(grid_size: usize, config: ClassifierConfig) -> Self {
        let legend = Legend::new(&config.legend);
        Self {
            grid_size,
            config,
            legend,
        }
    }

    /// Precipitation value of one pixel; 0 means nothing recognised.
    pub fn classify_pixel(&self, rgb: [u8; 3]) -> f64 {
        if !self.legend.is_empty() {
            return match self.legend.nearest(rgb) {
                Some((value, dist)) if dist < self.config.color_dist_threshold => value,
                _ => 0.0,
            };
        }

        let hsv = rgb8_to_hsv(rgb);
        let wet = hsv.s > self.config.sat_threshold
            && hsv.v > self.config.min_v
            && hsv.v < self.config.max_v;
        if wet {
            1.0
        } else {
            0.0
        }
    }

    /// Radius of the circular region of interest for a `width`x`height` frame.
    pub fn roi_radius(&self, width: usize, height: usize) -> f64 {
        self.config
            .roi_radius_px
            .filter(|r| r.is_finite() && *r > 0.0)
            .unwrap_or_else(|| (width as f64 / 2.0).min(height as f64 / 2.0) * ROI_FILL)
    }

    /// Frame with the removal rules applied; borrowed unchanged when there are none.
    pub fn cleaned<'a>(&self, buffer: &'a PixelBuffer) -> Cow<'a, PixelBuffer> {
        if self.config.removal_rules.is_empty() {
            return Cow::Borrowed(buffer);
        }
        let mut copy = buffer.clone();
        apply_color_removal(&mut copy, &self.config.removal_rules);
        Cow::Owned(copy)
    }

    /// Max-pooled per-cell precipitation values.
    pub fn value_grid(&self, buffer: &PixelBuffer) -> Array2<f64> {
        let buffer = self.cleaned(buffer);
        let n = self.grid_size;
        let mut grid = Array2::<f64>::zeros((n, n));
        let (w, h) = (buffer.width(), buffer.height());
        if n == 0 || w == 0 || h == 0 {
            return grid;
        }

        let cx = w as f64 / 2.0;
        let cy = h as f64 / 2.0;
        let radius = self.roi_radius(w, h);
        let r2 = radius * radius;

        for y in 0..h {
            let dy = y as f64 - cy;
            let gy = pool_index(y, h, n);
            for x in 0..w {
                let dx = x as f64 - cx;
                if dx * dx + dy * dy > r2 {
                    continue;
                }
                let value = self.classify_pixel(buffer.rgb(x, y));
                if value <= 0.0 {
                    continue;
                }
                let cell = &mut grid[[gy, pool_index(x, w, n)]];
                if value > *cell {
                    *cell = value;
                }
            }
        }
        grid
    }

    pub fn rasterize_pixels(&self, buffer: &PixelBuffer) -> OccupancyGrid {
        let values = self.value_grid(buffer);
        let mut grid = OccupancyGrid::empty(self.grid_size);
        for ((y, x), &v) in values.indexed_iter() {
            if v >= self.config.mm_threshold {
                grid.set(x, y);
            }
        }
        grid
    }
}

impl GridStage<PixelBuffer> for ImageryRasterizer {
    fn rasterize(&self, input: &PixelBuffer) -> OccupancyGrid {
        self.rasterize_pixels(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::legend::{default_removal_rules, LegendColor};

    fn classifier(config: ClassifierConfig) -> ImageryRasterizer {
        ImageryRasterizer::new(4, config)
    }

    fn paint(buffer: &mut PixelBuffer, x0: usize, y0: usize, side: usize, rgb: [u8; 3]) {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                buffer.set_rgb(x, y, rgb);
            }
        }
    }

    #[test]
    fn hsv_fallback_marks_saturated_mid_value_pixels() {
        let c = classifier(ClassifierConfig::default());
        assert_eq!(c.classify_pixel([30, 200, 40]), 1.0);
        assert_eq!(c.classify_pixel([255, 255, 255]), 0.0);
        assert_eq!(c.classify_pixel([120, 120, 120]), 0.0);
        assert_eq!(c.classify_pixel([5, 10, 5]), 0.0);
    }

    #[test]
    fn legend_match_requires_close_colour() {
        let config = ClassifierConfig {
            legend: vec![LegendColor::new(0, 0, 255, 5.0), LegendColor::new(255, 0, 0, 50.0)],
            ..Default::default()
        };
        let c = classifier(config);
        assert_eq!(c.classify_pixel([10, 5, 250]), 5.0);
        assert_eq!(c.classify_pixel([250, 10, 0]), 50.0);
        assert_eq!(c.classify_pixel([0, 255, 0]), 0.0);
    }

    #[test]
    fn removal_rules_blank_overlay_pixels_before_classification() {
        let mut buffer = PixelBuffer::filled(40, 40, [0, 0, 0, 255]);
        paint(&mut buffer, 10, 10, 4, [233, 12, 5]);
        paint(&mut buffer, 22, 22, 4, [20, 220, 30]);

        let plain = classifier(ClassifierConfig::default());
        assert_eq!(plain.classify_pixel([233, 12, 5]), 1.0);
        assert!(matches!(plain.cleaned(&buffer), Cow::Borrowed(_)));
        assert!(plain.rasterize_pixels(&buffer).get(1, 1));

        let c = classifier(ClassifierConfig {
            removal_rules: default_removal_rules(),
            ..Default::default()
        });
        assert_eq!(c.cleaned(&buffer).rgb(11, 11), [0, 0, 0]);
        let grid = c.rasterize_pixels(&buffer);
        assert!(!grid.get(1, 1));
        assert!(grid.get(2, 2));
        assert_eq!(buffer.rgb(11, 11), [233, 12, 5]);
    }

    #[test]
    fn pooled_cells_follow_pixel_quadrants() {
        let mut buffer = PixelBuffer::filled(40, 40, [0, 0, 0, 255]);
        paint(&mut buffer, 10, 10, 4, [30, 200, 40]);
        let grid = classifier(ClassifierConfig::default()).rasterize_pixels(&buffer);
        assert_eq!(grid.occupied(), 1);
        assert!(grid.get(1, 1));
    }

    #[test]
    fn pixels_outside_region_of_interest_are_ignored() {
        let mut buffer = PixelBuffer::filled(40, 40, [0, 0, 0, 255]);
        paint(&mut buffer, 0, 0, 3, [30, 200, 40]);
        let c = classifier(ClassifierConfig::default());
        assert_eq!(c.rasterize_pixels(&buffer).occupied(), 0);

        let wide = classifier(ClassifierConfig {
            roi_radius_px: Some(40.0),
            ..Default::default()
        });
        assert!(wide.rasterize_pixels(&buffer).get(0, 0));
    }

    #[test]
    fn light_values_fall_below_threshold() {
        let config = ClassifierConfig {
            legend: vec![LegendColor::new(0, 0, 255, 0.05), LegendColor::new(255, 0, 0, 2.0)],
            mm_threshold: 0.1,
            ..Default::default()
        };
        let mut buffer = PixelBuffer::filled(40, 40, [0, 0, 0, 255]);
        paint(&mut buffer, 10, 10, 4, [0, 0, 255]);
        paint(&mut buffer, 22, 22, 4, [255, 0, 0]);
        let c = classifier(config);
        let values = c.value_grid(&buffer);
        assert_eq!(values[[1, 1]], 0.05);
        assert_eq!(values[[2, 2]], 2.0);
        let grid = c.rasterize_pixels(&buffer);
        assert!(!grid.get(1, 1));
        assert!(grid.get(2, 2));
    }
}
