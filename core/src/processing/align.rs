use serde::Serialize;

/// Span in seconds since local midnight of the radar base day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimeRange {
    pub start_sec: f64,
    pub end_sec: f64,
}

impl TimeRange {
    pub fn new(start_sec: f64, end_sec: f64) -> Self {
        Self { start_sec, end_sec }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CommonWindow {
    pub start_sec: f64,
    pub end_sec: f64,
}

/// Intersection of the two ranges; `None` when they do not overlap.
pub fn common_window(radar: TimeRange, imagery: TimeRange) -> Option<CommonWindow> {
    let start_sec = radar.start_sec.max(imagery.start_sec);
    let end_sec = radar.end_sec.min(imagery.end_sec);
    if !start_sec.is_finite() || !end_sec.is_finite() || start_sec >= end_sec {
        return None;
    }
    Some(CommonWindow { start_sec, end_sec })
}

/// Manifest frames whose timestamps fall in the common window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameRange {
    pub start_frame: usize,
    pub end_frame: usize,
}

impl FrameRange {
    pub fn used_frames(&self) -> usize {
        self.end_frame + 1 - self.start_frame
    }
}

/// First frame at or after the window start and last frame at or before its end.
pub fn common_frame_range<I>(frame_secs: I, window: &CommonWindow) -> Option<FrameRange>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut start = None;
    let mut end = None;
    for (i, sec) in frame_secs.into_iter().enumerate() {
        let Some(sec) = sec else { continue };
        if start.is_none() && sec >= window.start_sec {
            start = Some(i);
        }
        if sec <= window.end_sec {
            end = Some(i);
        }
    }
    match (start, end) {
        (Some(start_frame), Some(end_frame)) if start_frame <= end_frame => Some(FrameRange {
            start_frame,
            end_frame,
        }),
        _ => None,
    }
}

/// Alignment state derived from both sources; recomputed whenever either changes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Alignment {
    pub window: Option<CommonWindow>,
    pub frames: Option<FrameRange>,
}

impl Alignment {
    pub fn compute(radar: Option<TimeRange>, imagery: Option<TimeRange>, frame_secs: &[Option<f64>]) -> Self {
        let window = match (radar, imagery) {
            (Some(radar), Some(imagery)) => common_window(radar, imagery),
            _ => None,
        };
        let frames = window.and_then(|w| common_frame_range(frame_secs.iter().copied(), &w));
        Self { window, frames }
    }

    pub fn is_defined(&self) -> bool {
        self.window.is_some() && self.frames.is_some()
    }

    pub fn used_frames(&self) -> usize {
        self.frames.map_or(0, |f| f.used_frames())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_is_the_intersection() {
        let w = common_window(TimeRange::new(100.0, 500.0), TimeRange::new(300.0, 900.0)).unwrap();
        assert_eq!(w, CommonWindow { start_sec: 300.0, end_sec: 500.0 });
        assert!(common_window(TimeRange::new(0.0, 100.0), TimeRange::new(100.0, 200.0)).is_none());
        assert!(common_window(TimeRange::new(0.0, 10.0), TimeRange::new(50.0, 80.0)).is_none());
    }

    #[test]
    fn frame_range_skips_frames_without_time() {
        let window = CommonWindow { start_sec: 100.0, end_sec: 300.0 };
        let secs = [Some(50.0), None, Some(100.0), Some(200.0), Some(300.0), Some(350.0)];
        let range = common_frame_range(secs, &window).unwrap();
        assert_eq!(range, FrameRange { start_frame: 2, end_frame: 4 });
        assert_eq!(range.used_frames(), 3);
    }

    #[test]
    fn frame_range_undefined_when_no_frame_fits() {
        let window = CommonWindow { start_sec: 100.0, end_sec: 120.0 };
        assert!(common_frame_range([Some(50.0), Some(150.0)], &window).is_none());
        assert!(common_frame_range(Vec::<Option<f64>>::new(), &window).is_none());
    }

    #[test]
    fn alignment_needs_both_sources() {
        let secs = [Some(0.0), Some(60.0)];
        assert!(!Alignment::compute(None, Some(TimeRange::new(0.0, 60.0)), &secs).is_defined());
        let a = Alignment::compute(Some(TimeRange::new(0.0, 600.0)), Some(TimeRange::new(0.0, 60.0)), &secs);
        assert!(a.is_defined());
        assert_eq!(a.used_frames(), 2);
    }
}
