use anyhow::Context;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use wxsynccore::ingest::legend::default_removal_rules;
use wxsynccore::ingest::{HalfDay, ImageryManifest, LegendColor, LegendRect, RadarSourceFile, SliceWindow};
use wxsynccore::processing::StitchWindow;
use wxsynccore::SyncConfig;

/// One radar JSON file plus metadata the file name may not carry.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RadarInput {
    pub path: PathBuf,
    /// 0 for the 09:00-21:00 file, 1 for the 21:00-09:00 file.
    pub chunk: Option<HalfDay>,
    pub date: Option<NaiveDate>,
    pub slice: Option<SliceWindow>,
}

impl RadarInput {
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            path,
            ..Default::default()
        }
    }
}

/// Video clock that emits ticks every `step_sec` over `duration_sec` of playback.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlaybackClock {
    pub duration_sec: f64,
    pub step_sec: f64,
}

impl PlaybackClock {
    pub fn is_valid(&self) -> bool {
        self.duration_sec.is_finite()
            && self.duration_sec > 0.0
            && self.step_sec.is_finite()
            && self.step_sec > 0.0
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    pub radar: Vec<RadarInput>,
    pub manifest: Option<PathBuf>,
    /// Directory frame images are resolved against.
    pub frames_dir: Option<PathBuf>,
    /// Calendar day to clip to; the latest file date when absent.
    pub day: Option<NaiveDate>,
    /// Use every file's whole half-day window instead of clipping to one day.
    pub full_files: bool,
    /// JSON list of `{r, g, b, value}` legend colours.
    pub legend: Option<PathBuf>,
    /// Legend bar area sampled from the first frame when no legend file is given.
    pub legend_rect: Option<LegendRect>,
    pub legend_bins: usize,
    /// Blank the stock map-overlay colours before classifying frames.
    pub remove_overlays: bool,
    /// Every frame in order when absent.
    pub playback: Option<PlaybackClock>,
    pub report_path: PathBuf,
    pub sync: SyncConfig,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            radar: Vec::new(),
            manifest: None,
            frames_dir: None,
            day: None,
            full_files: false,
            legend: None,
            legend_rect: None,
            legend_bins: 24,
            remove_overlays: false,
            playback: None,
            report_path: PathBuf::from("tools/data/offline_sync.log"),
            sync: SyncConfig::default(),
        }
    }
}

impl WorkflowConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading workflow config {}", path_ref.display()))?;
        let config: WorkflowConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing workflow config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn from_args(
        radar: Vec<PathBuf>,
        manifest: Option<PathBuf>,
        frames_dir: Option<PathBuf>,
        grid_size: usize,
        trail: usize,
    ) -> Self {
        Self {
            radar: radar.into_iter().map(RadarInput::from_path).collect(),
            manifest,
            frames_dir,
            sync: SyncConfig {
                grid_size,
                trail_default: trail,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn stitch_window(&self) -> StitchWindow {
        match (self.full_files, self.day) {
            (true, _) => StitchWindow::FullFiles,
            (false, Some(day)) => StitchWindow::Day(day),
            (false, None) => StitchWindow::LatestDay,
        }
    }

    /// Core configuration with the legend file and overlay rules folded in.
    pub fn sync_config(&self) -> anyhow::Result<SyncConfig> {
        let mut sync = self.sync.clone();
        if let Some(path) = &self.legend {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading legend {}", path.display()))?;
            let colors: Vec<LegendColor> = serde_json::from_str(&text)
                .with_context(|| format!("parsing legend {}", path.display()))?;
            sync.classifier.legend = colors;
        }
        if self.remove_overlays && sync.classifier.removal_rules.is_empty() {
            sync.classifier.removal_rules = default_removal_rules();
        }
        Ok(sync)
    }

    pub fn load_radar_files(&self) -> anyhow::Result<Vec<RadarSourceFile>> {
        self.radar
            .iter()
            .map(|input| {
                let text = fs::read_to_string(&input.path)
                    .with_context(|| format!("reading radar file {}", input.path.display()))?;
                let name = input.path.to_string_lossy().into_owned();
                let mut file = RadarSourceFile::from_json(name, &text)
                    .with_context(|| format!("parsing radar file {}", input.path.display()))?;
                if let Some(chunk) = input.chunk {
                    file = file.with_half_day(chunk);
                }
                if let Some(date) = input.date {
                    file = file.with_date(date);
                }
                if let Some(slice) = input.slice {
                    file = file.with_slice(slice);
                }
                Ok(file)
            })
            .collect()
    }

    pub fn load_manifest(&self) -> anyhow::Result<ImageryManifest> {
        let path = self
            .manifest
            .as_ref()
            .context("no imagery manifest configured")?;
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading manifest {}", path.display()))?;
        let fallback_id = path.to_string_lossy();
        ImageryManifest::from_json(&text, &fallback_id)
            .with_context(|| format!("parsing manifest {}", path.display()))
    }

    /// Frame directory, defaulting to the manifest's own directory.
    pub fn frames_root(&self) -> PathBuf {
        self.frames_dir
            .clone()
            .or_else(|| {
                self.manifest
                    .as_ref()
                    .and_then(|m| m.parent().map(Path::to_path_buf))
            })
            .unwrap_or_else(|| PathBuf::from("."))
    }
}
