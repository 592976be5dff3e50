use crate::ingest::pixels::PixelBuffer;
use crate::math::color::rgb_distance;
use serde::{Deserialize, Serialize};

/// Precipitation values (mm/h) for legend rows, top to bottom.
pub const DEFAULT_LEGEND_VALUES: [f64; 24] = [
    150.0, 110.0, 90.0, 70.0, 60.0, 50.0, 40.0, 30.0, 25.0, 20.0, 15.0, 10.0, 9.0, 8.0, 7.0, 6.0,
    5.0, 4.0, 3.0, 2.0, 1.0, 0.5, 0.1, 0.0,
];

/// A colour-bar entry. Entries without a value take it from [`DEFAULT_LEGEND_VALUES`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegendColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

impl LegendColor {
    pub fn new(r: u8, g: u8, b: u8, value: f64) -> Self {
        Self {
            r,
            g,
            b,
            value: Some(value),
        }
    }

    pub fn rgb(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

/// Legend with every entry resolved to a value.
#[derive(Debug, Clone, PartialEq)]
pub struct Legend {
    entries: Vec<([u8; 3], f64)>,
}

impl Legend {
    pub fn new(colors: &[LegendColor]) -> Self {
        let entries = colors
            .iter()
            .enumerate()
            .map(|(i, c)| {
                let value = c
                    .value
                    .or_else(|| DEFAULT_LEGEND_VALUES.get(i).copied())
                    .unwrap_or(0.0);
                (c.rgb(), value)
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Closest entry by RGB distance, as `(value, distance)`.
    pub fn nearest(&self, rgb: [u8; 3]) -> Option<(f64, f64)> {
        let mut best: Option<(f64, f64)> = None;
        for &(color, value) in &self.entries {
            let dist = rgb_distance(rgb, color);
            if best.map_or(true, |(_, d)| dist < d) {
                best = Some((value, dist));
            }
        }
        best
    }
}

/// Colour to blank out before classification (coastlines, range rings, background).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorRemovalRule {
    pub name: String,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub dist: f64,
}

impl ColorRemovalRule {
    pub fn new(name: &str, rgb: [u8; 3], dist: f64) -> Self {
        Self {
            name: name.to_string(),
            r: rgb[0],
            g: rgb[1],
            b: rgb[2],
            dist,
        }
    }

    pub fn matches(&self, rgb: [u8; 3]) -> bool {
        rgb_distance(rgb, [self.r, self.g, self.b]) <= self.dist
    }
}

/// Rules tuned for the map overlays in rendered radar video.
pub fn default_removal_rules() -> Vec<ColorRemovalRule> {
    vec![
        ColorRemovalRule::new("whiteBackground", [255, 255, 255], 90.0),
        ColorRemovalRule::new("blackLine", [0, 0, 0], 90.0),
        ColorRemovalRule::new("grayLine", [128, 128, 128], 150.0),
        ColorRemovalRule::new("redLineCore", [233, 12, 5], 65.0),
        ColorRemovalRule::new("redLineWide", [200, 25, 20], 90.0),
        ColorRemovalRule::new("redLineEdge", [180, 35, 35], 65.0),
    ]
}

fn is_removed(rules: &[ColorRemovalRule], rgb: [u8; 3]) -> bool {
    rules.iter().any(|rule| rule.matches(rgb))
}

/// Paints every pixel matched by `rules` black, returning how many were touched.
pub fn apply_color_removal(buffer: &mut PixelBuffer, rules: &[ColorRemovalRule]) -> usize {
    let mut removed = 0;
    for y in 0..buffer.height() {
        for x in 0..buffer.width() {
            if is_removed(rules, buffer.rgb(x, y)) {
                buffer.set_rgb(x, y, [0, 0, 0]);
                removed += 1;
            }
        }
    }
    removed
}

/// Legend area as fractions of the frame size.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LegendRect {
    pub x0: f64,
    pub x1: f64,
    pub y0: f64,
    pub y1: f64,
}

/// Samples `bins` evenly spaced rows of the legend bar, averaging each into one colour.
pub fn extract_legend_colors(buffer: &PixelBuffer, rect: LegendRect, bins: usize) -> Vec<LegendColor> {
    let (width, height) = (buffer.width(), buffer.height());
    if width == 0 || height == 0 {
        return Vec::new();
    }
    let scale = |frac: f64, len: usize| ((frac * len as f64).round().max(0.0) as usize).min(len);
    let x0 = scale(rect.x0, width);
    let x1 = scale(rect.x1, width);
    let y0 = scale(rect.y0, height);
    let y1 = scale(rect.y1, height);
    let w = x1.saturating_sub(x0).max(1);
    let h = y1.saturating_sub(y0).max(1);

    let mut colors = Vec::with_capacity(bins);
    for i in 0..bins {
        let offset = (((i as f64 + 0.5) / bins as f64) * h as f64).round() as usize;
        let cy = (y0 + offset).min(height - 1);
        let (mut sum, mut count) = ([0u32; 3], 0u32);
        for x in x0..(x0 + w).min(width) {
            let px = buffer.rgb(x, cy);
            for (acc, channel) in sum.iter_mut().zip(px) {
                *acc += u32::from(channel);
            }
            count += 1;
        }
        if count == 0 {
            continue;
        }
        let avg = |v: u32| ((f64::from(v) / f64::from(count)).round()) as u8;
        colors.push(LegendColor {
            r: avg(sum[0]),
            g: avg(sum[1]),
            b: avg(sum[2]),
            value: None,
        });
    }
    colors
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_values_come_from_default_ladder() {
        let legend = Legend::new(&[
            LegendColor { r: 255, g: 0, b: 0, value: None },
            LegendColor::new(0, 255, 0, 4.5),
        ]);
        assert_eq!(legend.nearest([250, 5, 0]).map(|(v, _)| v), Some(150.0));
        assert_eq!(legend.nearest([0, 250, 0]).map(|(v, _)| v), Some(4.5));
    }

    #[test]
    fn empty_legend_has_no_nearest() {
        assert!(Legend::new(&[]).nearest([1, 2, 3]).is_none());
    }

    #[test]
    fn removal_blackens_matching_pixels() {
        let mut buffer = PixelBuffer::filled(2, 1, [255, 255, 255, 255]);
        buffer.set_rgb(1, 0, [0, 120, 255]);
        let removed = apply_color_removal(&mut buffer, &default_removal_rules());
        assert_eq!(removed, 1);
        assert_eq!(buffer.rgb(0, 0), [0, 0, 0]);
        assert_eq!(buffer.rgb(1, 0), [0, 120, 255]);
    }

    #[test]
    fn extracts_one_colour_per_band() {
        let mut buffer = PixelBuffer::filled(10, 20, [0, 0, 0, 255]);
        for y in 0..20 {
            let rgb = if y < 10 { [200, 0, 0] } else { [0, 0, 200] };
            for x in 0..10 {
                buffer.set_rgb(x, y, rgb);
            }
        }
        let rect = LegendRect { x0: 0.2, x1: 0.8, y0: 0.0, y1: 1.0 };
        let colors = extract_legend_colors(&buffer, rect, 2);
        assert_eq!(colors.len(), 2);
        assert_eq!(colors[0].rgb(), [200, 0, 0]);
        assert_eq!(colors[1].rgb(), [0, 0, 200]);
    }
}
