//! Tick-driven synchronisation of one radar timeline with one imagery manifest.

use crate::ingest::manifest::{FrameSource, ImageryManifest};
use crate::ingest::segment::{RadarSourceFile, DEFAULT_SITE};
use crate::math::clock::LocalClock;
use crate::math::geo::GeoPoint;
use crate::math::grid::OccupancyGrid;
use crate::prelude::{GridStage, SyncConfig, SyncError, SyncResult};
use crate::processing::align::{Alignment, CommonWindow, TimeRange};
use crate::processing::compare::{compare_grids, ConfusionStats, DetectionMask};
use crate::processing::history::{HistoryState, MatchHistory, MatchSample};
use crate::processing::imagery::ImageryRasterizer;
use crate::processing::mapper::{FrameMapper, FrameTick, PacketTimeTable, PacketWindow};
use crate::processing::polar::PolarRasterizer;
use crate::processing::timeline::{
    stitch, PacketIndex, RawRange, SliceSummary, StitchWindow, StitchedTimeline, TimelineChunk,
};
use crate::telemetry::log::LogManager;
use crate::telemetry::metrics::{Metrics, MetricsRecorder};
use serde::Serialize;
use std::fmt;

/// Why a tick produced no comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ManifestNotLoaded,
    FrameOutOfRange,
    RadarNotReady,
    NoOverlap,
    NoSegments,
    FrameUnavailable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::ManifestNotLoaded => write!(f, "no manifest loaded"),
            SkipReason::FrameOutOfRange => write!(f, "frame index outside the manifest"),
            SkipReason::RadarNotReady => write!(f, "radar timeline not ready"),
            SkipReason::NoOverlap => write!(f, "radar and imagery do not overlap"),
            SkipReason::NoSegments => write!(f, "no radar arcs in the packet window"),
            SkipReason::FrameUnavailable(reason) => write!(f, "frame unavailable: {reason}"),
        }
    }
}

/// Result of one compared tick, ready for display.
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub frame_index: usize,
    pub frame_time: Option<String>,
    pub packet: u32,
    pub window: PacketWindow,
    pub trail: usize,
    pub radar_grid: OccupancyGrid,
    pub imagery_grid: OccupancyGrid,
    pub stats: ConfusionStats,
    pub history_len: usize,
    pub history_locked: bool,
}

#[derive(Debug, Clone)]
pub enum TickOutcome {
    Compared(Box<TickReport>),
    Skipped(SkipReason),
}

/// Pull-based view of the session for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub slices: Option<SliceSummary>,
    pub radar_range: Option<RawRange>,
    pub chunks: Vec<TimelineChunk>,
    pub site: Option<GeoPoint>,
    pub manifest_id: Option<String>,
    pub manifest_frames: usize,
    pub alignment: Alignment,
    pub common_used_frames: usize,
    pub history_state: Option<HistoryState>,
    pub history_len: usize,
    pub metrics: Metrics,
}

struct RadarState {
    timeline: StitchedTimeline,
    index: PacketIndex,
    summary: SliceSummary,
    site: GeoPoint,
    table: PacketTimeTable,
    raw_range: Option<RawRange>,
    polar: PolarRasterizer,
    mask: DetectionMask,
}

impl RadarState {
    fn is_ready(&self) -> bool {
        !self.timeline.is_empty() && self.index.max_packet() > 0
    }
}

struct ManifestState {
    manifest: ImageryManifest,
    frame_secs: Vec<Option<f64>>,
    mapper: FrameMapper,
    history: MatchHistory,
}

pub struct SyncSession {
    config: SyncConfig,
    clock: LocalClock,
    imagery: ImageryRasterizer,
    radar: Option<RadarState>,
    manifest: Option<ManifestState>,
    alignment: Alignment,
    metrics: MetricsRecorder,
    logger: LogManager,
}

impl SyncSession {
    pub fn new(config: SyncConfig) -> SyncResult<Self> {
        config.validate()?;
        let clock = LocalClock::from_hours(config.utc_offset_hours)?;
        let imagery = ImageryRasterizer::new(config.grid_size, config.classifier.clone());
        Ok(Self {
            config,
            clock,
            imagery,
            radar: None,
            manifest: None,
            alignment: Alignment::default(),
            metrics: MetricsRecorder::new(),
            logger: LogManager::new("session"),
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }

    /// Stitches `files` into the radar timeline, replacing any previous one.
    pub fn load_radar(&mut self, files: &[RadarSourceFile], window: StitchWindow) -> SliceSummary {
        let outcome = stitch(files, window, self.clock);
        self.metrics.record_rejected_files(outcome.summary.rejected.len());

        let site = outcome.site.unwrap_or(DEFAULT_SITE);
        let polar = PolarRasterizer::new(&self.config, site);
        let mask = DetectionMask::new(
            self.config.grid_size,
            self.config.max_range_km,
            site,
            polar.reference(),
        );
        let table = outcome.timeline.time_table();
        let raw_range = outcome.timeline.raw_range();
        self.logger.record(&format!(
            "stitched {} files into {} packets ({} rejected)",
            outcome.summary.total_files,
            outcome.summary.total_pkts,
            outcome.summary.rejected.len()
        ));
        if let Some(range) = &raw_range {
            self.logger
                .record(&format!("radar range {} .. {}", range.start_local, range.end_local));
        }

        let summary = outcome.summary.clone();
        self.radar = Some(RadarState {
            timeline: outcome.timeline,
            index: outcome.index,
            summary: outcome.summary,
            site,
            table,
            raw_range,
            polar,
            mask,
        });
        if let Some(manifest) = self.manifest.as_mut() {
            manifest.mapper.reset();
        }
        self.realign();
        summary
    }

    /// Installs `manifest`; derived state is reset only when its identity changes.
    pub fn load_manifest(&mut self, manifest: ImageryManifest) -> bool {
        if let Some(current) = &self.manifest {
            if current.manifest.identity() == manifest.identity() {
                self.logger
                    .detail(&format!("manifest {} already loaded", manifest.identity()));
                return false;
            }
        }
        self.logger.record(&format!(
            "manifest {} with {} frames",
            manifest.identity(),
            manifest.len()
        ));
        self.manifest = Some(ManifestState {
            manifest,
            frame_secs: Vec::new(),
            mapper: FrameMapper::new(self.config.trail_default),
            history: MatchHistory::new(),
        });
        self.realign();
        true
    }

    /// Runs one frame tick.
    pub fn on_frame<S: FrameSource + ?Sized>(
        &mut self,
        index: usize,
        source: &mut S,
    ) -> SyncResult<TickOutcome> {
        let outcome = match self.precheck(index) {
            Some(reason) => TickOutcome::Skipped(reason),
            None => self.run_tick(index, source)?,
        };
        match &outcome {
            TickOutcome::Compared(report) => {
                self.metrics.record_compared();
                self.logger.detail(&format!(
                    "frame {} -> packets {}..={}, radar {} cells, imagery {} cells, match {}%",
                    index,
                    report.window.start,
                    report.window.end,
                    report.radar_grid.occupied(),
                    report.imagery_grid.occupied(),
                    report.stats.overall_match_percent
                ));
            }
            TickOutcome::Skipped(reason) => {
                self.metrics.record_skipped();
                self.logger.detail(&format!("frame {index} skipped: {reason}"));
            }
        }
        Ok(outcome)
    }

    pub fn history(&self) -> Option<&MatchHistory> {
        self.manifest.as_ref().map(|m| &m.history)
    }

    pub fn timeline(&self) -> Option<&StitchedTimeline> {
        self.radar.as_ref().map(|r| &r.timeline)
    }

    /// Overlap of the loaded radar and imagery clocks.
    pub fn common_window(&self) -> SyncResult<CommonWindow> {
        self.alignment.window.ok_or(SyncError::NoOverlap)
    }

    pub fn frame_count(&self) -> usize {
        self.manifest.as_ref().map_or(0, |m| m.manifest.len())
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics.snapshot()
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            slices: self.radar.as_ref().map(|r| r.summary.clone()),
            radar_range: self.radar.as_ref().and_then(|r| r.raw_range.clone()),
            chunks: self
                .radar
                .as_ref()
                .map(|r| r.timeline.chunks().to_vec())
                .unwrap_or_default(),
            site: self.radar.as_ref().map(|r| r.site),
            manifest_id: self
                .manifest
                .as_ref()
                .map(|m| m.manifest.identity().to_string()),
            manifest_frames: self.frame_count(),
            alignment: self.alignment,
            common_used_frames: self.alignment.used_frames(),
            history_state: self.history().map(MatchHistory::state),
            history_len: self.history().map_or(0, MatchHistory::len),
            metrics: self.metrics.snapshot(),
        }
    }

    fn precheck(&self, index: usize) -> Option<SkipReason> {
        let Some(manifest) = &self.manifest else {
            return Some(SkipReason::ManifestNotLoaded);
        };
        if index >= manifest.manifest.len() {
            return Some(SkipReason::FrameOutOfRange);
        }
        if !self.radar.as_ref().is_some_and(RadarState::is_ready) {
            return Some(SkipReason::RadarNotReady);
        }
        if !self.alignment.is_defined() {
            return Some(SkipReason::NoOverlap);
        }
        None
    }

    fn run_tick<S: FrameSource + ?Sized>(
        &mut self,
        index: usize,
        source: &mut S,
    ) -> SyncResult<TickOutcome> {
        let (Some(radar), Some(state)) = (self.radar.as_ref(), self.manifest.as_mut()) else {
            return Ok(TickOutcome::Skipped(SkipReason::RadarNotReady));
        };
        let Some(frame) = state.manifest.frame(index) else {
            return Ok(TickOutcome::Skipped(SkipReason::FrameOutOfRange));
        };

        state.history.observe_frame(index);
        let tick = FrameTick {
            index,
            count: state.manifest.len(),
            sec: state.frame_secs.get(index).copied().flatten(),
        };
        let selection = state
            .mapper
            .map_frame(tick, Some(&radar.table), radar.index.max_packet());

        let merged = radar.index.merged(selection.window.start, selection.window.end);
        if merged.is_empty() {
            return Ok(TickOutcome::Skipped(SkipReason::NoSegments));
        }

        let pixels = match source.frame_pixels(index, frame) {
            Ok(pixels) => pixels,
            Err(err) => {
                self.logger.warn(&format!("frame {index}: {err}"));
                return Ok(TickOutcome::Skipped(SkipReason::FrameUnavailable(err.to_string())));
            }
        };

        let mut radar_grid = radar.polar.rasterize(merged.as_slice());
        let mut imagery_grid = self.imagery.rasterize(&pixels);
        let stats = compare_grids(&radar_grid, &imagery_grid, |x, y| radar.mask.contains(x, y))?;
        radar.mask.apply(&mut radar_grid);
        radar.mask.apply(&mut imagery_grid);

        let timestamp = frame.timestamp;
        let label = match timestamp {
            Some(t) => self.clock.format_time(t),
            None => format!("frame {index}"),
        };
        state.history.record(MatchSample {
            frame_index: index,
            timestamp_ms: timestamp.map(|t| t.timestamp_millis()),
            label,
            match_percent: stats.overall_match_percent,
        });

        Ok(TickOutcome::Compared(Box::new(TickReport {
            frame_index: index,
            frame_time: timestamp.map(|t| self.clock.format(t)),
            packet: selection.packet,
            window: selection.window,
            trail: selection.trail,
            radar_grid,
            imagery_grid,
            stats,
            history_len: state.history.len(),
            history_locked: state.history.is_locked(),
        })))
    }

    /// Recomputes frame times and the common window after either source changes.
    fn realign(&mut self) {
        let base_date = self.radar.as_ref().map(|r| r.timeline.base_date());
        let radar_range = self
            .radar
            .as_ref()
            .and_then(|r| r.raw_range.as_ref())
            .map(|r| TimeRange::new(r.start_sec, r.end_sec));

        let Some(state) = self.manifest.as_mut() else {
            self.alignment = Alignment::default();
            return;
        };
        state.frame_secs = match base_date {
            Some(base) => state
                .manifest
                .frames
                .iter()
                .map(|f| f.timestamp.map(|t| self.clock.secs_since_midnight_of(base, t)))
                .collect(),
            None => vec![None; state.manifest.len()],
        };
        let imagery_range = base_date.zip(state.manifest.time_bounds()).map(|(base, (first, last))| {
            TimeRange::new(
                self.clock.secs_since_midnight_of(base, first),
                self.clock.secs_since_midnight_of(base, last),
            )
        });

        self.alignment = Alignment::compute(radar_range, imagery_range, &state.frame_secs);
        match (self.alignment.window, self.alignment.frames) {
            (Some(window), Some(frames)) => self.logger.record(&format!(
                "common window {:.0}s..{:.0}s, frames {}..={}",
                window.start_sec, window.end_sec, frames.start_frame, frames.end_frame
            )),
            _ if radar_range.is_some() && imagery_range.is_some() => {
                self.logger.warn("radar and imagery time ranges do not overlap")
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::manifest::Frame;
    use crate::ingest::pixels::PixelBuffer;
    use crate::ingest::segment::Segment;
    use chrono::{DateTime, Duration, Utc};

    struct SolidFrames {
        fail: bool,
    }

    impl FrameSource for SolidFrames {
        fn frame_pixels(&mut self, index: usize, _frame: &Frame) -> SyncResult<PixelBuffer> {
            if self.fail {
                return Err(SyncError::FrameSource(format!("frame {index} missing")));
            }
            Ok(PixelBuffer::filled(64, 64, [0, 0, 0, 255]))
        }
    }

    fn day_file() -> RadarSourceFile {
        // One packet per minute from 09:00 to 21:00 local.
        let segments = (1..=721)
            .map(|p| Segment::new(p, 3, 0.0, 5.0, 40.0))
            .collect();
        RadarSourceFile::new("RDM_A2025071500_cat08.json", GeoPoint::new(33.5, 126.5), segments)
    }

    fn manifest(id: &str, first: &str, count: usize) -> ImageryManifest {
        let start: DateTime<Utc> = first.parse().unwrap();
        let frames = (0..count)
            .map(|i| Frame::at(start + Duration::minutes(10 * i as i64)))
            .collect();
        ImageryManifest::new(id, frames)
    }

    fn loaded_session() -> SyncSession {
        let mut session = SyncSession::new(SyncConfig::default()).unwrap();
        session.load_radar(&[day_file()], StitchWindow::LatestDay);
        session.load_manifest(manifest("m1", "2025-07-15T01:00:00Z", 6));
        session
    }

    fn compared(outcome: TickOutcome) -> TickReport {
        match outcome {
            TickOutcome::Compared(report) => *report,
            TickOutcome::Skipped(reason) => panic!("tick skipped: {reason}"),
        }
    }

    #[test]
    fn ticks_before_loading_are_skipped() {
        let mut session = SyncSession::new(SyncConfig::default()).unwrap();
        let mut frames = SolidFrames { fail: false };
        assert!(matches!(
            session.on_frame(0, &mut frames).unwrap(),
            TickOutcome::Skipped(SkipReason::ManifestNotLoaded)
        ));
        session.load_manifest(manifest("m1", "2025-07-15T01:00:00Z", 3));
        assert!(matches!(
            session.on_frame(0, &mut frames).unwrap(),
            TickOutcome::Skipped(SkipReason::RadarNotReady)
        ));
        assert!(matches!(
            session.on_frame(5, &mut frames).unwrap(),
            TickOutcome::Skipped(SkipReason::FrameOutOfRange)
        ));
        assert_eq!(session.metrics().ticks_skipped, 3);
    }

    #[test]
    fn frames_map_to_nearest_packet_with_dynamic_trail() {
        let mut session = loaded_session();
        let mut frames = SolidFrames { fail: false };

        let first = compared(session.on_frame(0, &mut frames).unwrap());
        assert_eq!(first.packet, 61);
        assert_eq!(first.trail, 3);
        assert_eq!(first.window, PacketWindow { start: 59, end: 61 });
        assert_eq!(first.frame_time.as_deref(), Some("2025-07-15 10:00:00"));

        let second = compared(session.on_frame(1, &mut frames).unwrap());
        assert_eq!(second.packet, 71);
        assert_eq!(second.trail, 10);
        assert_eq!(second.window, PacketWindow { start: 62, end: 71 });
    }

    #[test]
    fn comparison_counts_only_masked_cells() {
        let mut session = loaded_session();
        let report = compared(session.on_frame(0, &mut SolidFrames { fail: false }).unwrap());
        let site = GeoPoint::new(33.5, 126.5);
        let mask = DetectionMask::new(32, 250.0, site, site);
        let mut full = OccupancyGrid::from_rows(&vec![vec![1u8; 32]; 32]).unwrap();
        mask.apply(&mut full);
        assert_eq!(report.stats.total, full.occupied());
        assert!(report.stats.fp > 0);
        assert_eq!(report.stats.tp + report.stats.fn_, 0);
        assert_eq!(report.imagery_grid.occupied(), 0);
        assert_eq!(report.radar_grid.occupied(), report.stats.fp);
    }

    #[test]
    fn history_locks_after_first_loop() {
        let mut session = loaded_session();
        let mut frames = SolidFrames { fail: false };
        for i in 0..6 {
            compared(session.on_frame(i, &mut frames).unwrap());
        }
        assert_eq!(session.history().unwrap().len(), 6);

        let wrapped = compared(session.on_frame(0, &mut frames).unwrap());
        assert!(wrapped.history_locked);
        compared(session.on_frame(1, &mut frames).unwrap());
        assert_eq!(session.history().unwrap().len(), 6);
        assert_eq!(session.history().unwrap().samples()[0].label, "10:00:00");
    }

    #[test]
    fn new_manifest_resets_history_but_same_identity_does_not() {
        let mut session = loaded_session();
        let mut frames = SolidFrames { fail: false };
        compared(session.on_frame(0, &mut frames).unwrap());
        assert!(!session.load_manifest(manifest("m1", "2025-07-15T01:00:00Z", 6)));
        assert_eq!(session.history().unwrap().len(), 1);

        assert!(session.load_manifest(manifest("m2", "2025-07-15T02:00:00Z", 4)));
        assert!(session.history().unwrap().is_empty());
        assert_eq!(session.summary().manifest_frames, 4);
    }

    #[test]
    fn common_window_spans_both_clocks() {
        assert!(matches!(
            SyncSession::new(SyncConfig::default()).unwrap().common_window(),
            Err(SyncError::NoOverlap)
        ));
        let session = loaded_session();
        let chunks = session.summary().chunks;
        assert_eq!(chunks.len(), 1);
        assert_eq!((chunks[0].packet_start, chunks[0].packet_end), (1, 721));
        let window = session.common_window().unwrap();
        assert_eq!(window.start_sec, 36_000.0);
        assert_eq!(window.end_sec, 39_000.0);
    }

    #[test]
    fn disjoint_ranges_suspend_comparison() {
        let mut session = SyncSession::new(SyncConfig::default()).unwrap();
        session.load_radar(&[day_file()], StitchWindow::LatestDay);
        session.load_manifest(manifest("late", "2025-07-16T03:00:00Z", 3));
        assert!(matches!(session.common_window(), Err(SyncError::NoOverlap)));
        assert!(matches!(
            session.on_frame(0, &mut SolidFrames { fail: false }).unwrap(),
            TickOutcome::Skipped(SkipReason::NoOverlap)
        ));
    }

    #[test]
    fn frame_fetch_failure_skips_the_tick() {
        let mut session = loaded_session();
        let outcome = session.on_frame(2, &mut SolidFrames { fail: true }).unwrap();
        assert!(matches!(outcome, TickOutcome::Skipped(SkipReason::FrameUnavailable(_))));
        assert!(session.history().unwrap().is_empty());
    }

    #[test]
    fn summary_reports_ranges_and_alignment() {
        let session = loaded_session();
        let summary = session.summary();
        let range = summary.radar_range.unwrap();
        assert_eq!(range.start_local, "2025-07-15 09:00:00");
        assert_eq!(range.end_local, "2025-07-15 21:00:00");
        assert_eq!(summary.slices.unwrap().total_pkts, 721);
        assert_eq!(summary.common_used_frames, 6);
        assert_eq!(summary.alignment.window.unwrap().start_sec, 36_000.0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SyncConfig {
            grid_size: 0,
            ..Default::default()
        };
        assert!(SyncSession::new(config).is_err());
    }
}
