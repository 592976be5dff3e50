pub struct StatsHelper;

impl StatsHelper {
    /// `num / den`, or zero when the denominator is zero.
    pub fn ratio(num: usize, den: usize) -> f64 {
        if den == 0 {
            return 0.0;
        }
        num as f64 / den as f64
    }

    pub fn percent(ratio: f64) -> u32 {
        if !ratio.is_finite() || ratio <= 0.0 {
            return 0;
        }
        (ratio * 100.0).round() as u32
    }
}
