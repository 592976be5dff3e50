use crate::workflow::config::{PlaybackClock, WorkflowConfig};
use anyhow::Context;
use log::{debug, info, warn};
use serde::Serialize;
use wxsynccore::ingest::legend::extract_legend_colors;
use wxsynccore::ingest::{FrameSource, ImageryManifest, LegendColor, LegendRect, RadarSourceFile};
use wxsynccore::processing::MatchSample;
use wxsynccore::{SessionSummary, SyncConfig, SyncSession, TickOutcome, TickReport};

/// Outcome of one playback loop over the manifest.
#[derive(Debug, Clone, Serialize)]
pub struct PlaybackResult {
    pub compared: usize,
    pub skipped: usize,
    pub mean_match_percent: Option<f64>,
    pub last_report: Option<TickReport>,
    pub history: Vec<MatchSample>,
    pub summary: SessionSummary,
}

#[derive(Clone)]
pub struct Runner {
    config: WorkflowConfig,
}

impl Runner {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    pub fn sync(&self) -> &SyncConfig {
        &self.config.sync
    }

    /// Plays one loop of the manifest, then wraps to frame 0 so the history locks.
    pub fn play<S: FrameSource + ?Sized>(
        &self,
        files: &[RadarSourceFile],
        manifest: ImageryManifest,
        frames: &mut S,
    ) -> anyhow::Result<PlaybackResult> {
        let mut sync = self.config.sync_config()?;
        if sync.classifier.legend.is_empty() {
            if let Some(rect) = self.config.legend_rect {
                sync.classifier.legend =
                    calibrate_legend(&manifest, &mut *frames, rect, self.config.legend_bins)?;
            }
        }
        let mut session = SyncSession::new(sync).context("creating sync session")?;

        let slices = session.load_radar(files, self.config.stitch_window());
        info!(
            "radar: {} files used, {} rejected, {} packets ({}% of source packets)",
            slices.total_files,
            slices.rejected.len(),
            slices.total_pkts,
            slices.orig_usage_percent().unwrap_or(0)
        );

        let ticks = tick_schedule(&manifest, self.config.playback);
        session.load_manifest(manifest);
        match session.common_window() {
            Ok(window) => info!("common window {:.0}s..{:.0}s", window.start_sec, window.end_sec),
            Err(err) => warn!("{err}; frames will be skipped"),
        }

        let mut compared = 0;
        let mut skipped = 0;
        let mut last_report = None;
        for (index, offset) in ticks {
            if let Some(offset) = offset {
                debug!("tick frame {index} at {offset:.1}s of playback");
            }
            match session
                .on_frame(index, &mut *frames)
                .with_context(|| format!("processing frame {index}"))?
            {
                TickOutcome::Compared(report) => {
                    compared += 1;
                    last_report = Some(*report);
                }
                TickOutcome::Skipped(_) => skipped += 1,
            }
        }

        let history = session
            .history()
            .map(|h| h.samples().to_vec())
            .unwrap_or_default();
        let mean_match_percent = (!history.is_empty()).then(|| {
            history.iter().map(|s| f64::from(s.match_percent)).sum::<f64>() / history.len() as f64
        });

        Ok(PlaybackResult {
            compared,
            skipped,
            mean_match_percent,
            last_report,
            history,
            summary: session.summary(),
        })
    }
}

/// Frames one loop visits with their playback offsets, ending with the wrap to frame 0.
fn tick_schedule(manifest: &ImageryManifest, playback: Option<PlaybackClock>) -> Vec<(usize, Option<f64>)> {
    let count = manifest.len();
    let mut ticks: Vec<(usize, Option<f64>)> = match playback.filter(PlaybackClock::is_valid) {
        Some(clock) => {
            let steps = (clock.duration_sec / clock.step_sec).floor() as usize;
            (0..=steps)
                .map(|i| manifest.frame_at_offset(i as f64 * clock.step_sec, clock.duration_sec))
                .map(|index| (index, Some(manifest.playback_offset(index, clock.duration_sec))))
                .collect()
        }
        None => (0..count).map(|index| (index, None)).collect(),
    };
    ticks.dedup_by_key(|(index, _)| *index);
    if count > 1 {
        ticks.push((0, playback.filter(PlaybackClock::is_valid).map(|_| 0.0)));
    }
    ticks
}

/// Samples the legend bar of the first frame into colours.
fn calibrate_legend<S: FrameSource + ?Sized>(
    manifest: &ImageryManifest,
    frames: &mut S,
    rect: LegendRect,
    bins: usize,
) -> anyhow::Result<Vec<LegendColor>> {
    let frame = manifest
        .frame(0)
        .context("legend calibration needs at least one frame")?;
    let pixels = frames
        .frame_pixels(0, frame)
        .context("reading legend calibration frame")?;
    let colors = extract_legend_colors(&pixels, rect, bins);
    info!("legend: sampled {} colours from frame 0", colors.len());
    Ok(colors)
}
