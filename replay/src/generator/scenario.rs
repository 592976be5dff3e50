use anyhow::{ensure, Context};
use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use wxsynccore::ingest::{Frame, FrameSource, HalfDay, ImageryManifest, PixelBuffer, RadarSourceFile, Segment};
use wxsynccore::math::clock::LocalClock;
use wxsynccore::math::geo::{GeoPoint, NM_TO_KM};
use wxsynccore::{SyncConfig, SyncResult};

const WET: [u8; 4] = [20, 220, 30, 255];
const DRY: [u8; 4] = [0, 0, 0, 255];
const HALF_DAY_SECS: f64 = 12.0 * 3600.0;

/// Configuration for generating a synthetic storm replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub seed: u64,
    pub date: NaiveDate,
    pub site: GeoPoint,
    pub utc_offset_hours: i32,
    pub max_range_km: f64,
    pub packets_per_file: u32,
    pub frame_count: usize,
    pub frame_interval_min: i64,
    /// Local hour of the first frame.
    pub first_frame_hour: u32,
    pub image_size: usize,
    pub storm_bearing_deg: f64,
    pub storm_range_nm: f64,
    pub storm_radius_nm: f64,
    pub drift_deg_per_hour: f64,
    pub category: u8,
    /// Probability of dropping an individual radar arc.
    pub noise: f64,
    pub description: Option<String>,
    pub scenario: Option<String>,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            date: NaiveDate::from_ymd_opt(2025, 7, 15).unwrap_or_default(),
            site: GeoPoint::new(33.5, 126.5),
            utc_offset_hours: 9,
            max_range_km: 250.0,
            packets_per_file: 145,
            frame_count: 24,
            frame_interval_min: 10,
            first_frame_hour: 10,
            image_size: 128,
            storm_bearing_deg: 45.0,
            storm_range_nm: 30.0,
            storm_radius_nm: 8.0,
            drift_deg_per_hour: 15.0,
            category: 4,
            noise: 0.05,
            description: None,
            scenario: None,
        }
    }
}

impl ScenarioConfig {
    /// Uses the clock offset and display range the scenario will be replayed with.
    pub fn aligned_with(mut self, sync: &SyncConfig) -> Self {
        self.utc_offset_hours = sync.utc_offset_hours;
        self.max_range_km = sync.max_range_km;
        self
    }

    /// Storm centre (east, north) in NM at `sec` seconds after local midnight.
    fn storm_center(&self, sec: f64) -> (f64, f64) {
        let hours = (sec - f64::from(self.first_frame_hour) * 3600.0) / 3600.0;
        let bearing = (self.storm_bearing_deg + self.drift_deg_per_hour * hours).to_radians();
        (
            self.storm_range_nm * bearing.sin(),
            self.storm_range_nm * bearing.cos(),
        )
    }

    fn in_storm(&self, sec: f64, east_nm: f64, north_nm: f64) -> bool {
        let (cx, cy) = self.storm_center(sec);
        let (dx, dy) = (east_nm - cx, north_nm - cy);
        dx * dx + dy * dy <= self.storm_radius_nm * self.storm_radius_nm
    }
}

/// Renders storm frames on demand from their timestamps.
pub struct SyntheticFrames {
    config: ScenarioConfig,
    clock: LocalClock,
}

impl FrameSource for SyntheticFrames {
    fn frame_pixels(&mut self, _index: usize, frame: &Frame) -> SyncResult<PixelBuffer> {
        let size = self.config.image_size;
        let mut buffer = PixelBuffer::filled(size, size, DRY);
        let Some(timestamp) = frame.timestamp else {
            return Ok(buffer);
        };
        let sec = self.clock.secs_since_midnight_of(self.config.date, timestamp);
        let max_nm = self.config.max_range_km / NM_TO_KM;
        let half = size as f64 / 2.0;
        for y in 0..size {
            let north = -((y as f64 + 0.5) / half - 1.0) * max_nm;
            for x in 0..size {
                let east = ((x as f64 + 0.5) / half - 1.0) * max_nm;
                if self.config.in_storm(sec, east, north) {
                    buffer.set_rgb(x, y, [WET[0], WET[1], WET[2]]);
                }
            }
        }
        Ok(buffer)
    }
}

pub struct SyntheticScenario {
    pub files: Vec<RadarSourceFile>,
    pub manifest: ImageryManifest,
    pub frames: SyntheticFrames,
}

impl SyntheticScenario {
    pub fn generate(config: &ScenarioConfig) -> anyhow::Result<Self> {
        ensure!(config.packets_per_file >= 2, "scenario needs at least two packets per file");
        ensure!(config.image_size >= 8, "scenario image must be at least 8 pixels wide");
        ensure!(config.storm_radius_nm > 0.0, "storm radius must be positive");
        let clock = LocalClock::from_hours(config.utc_offset_hours).context("scenario clock")?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let files = [HalfDay::Day, HalfDay::Night]
            .into_iter()
            .map(|half| build_file(config, half, &mut rng))
            .collect();

        let start = clock.at(config.date, config.first_frame_hour);
        let frames = (0..config.frame_count)
            .map(|k| {
                Frame::at(start + Duration::minutes(config.frame_interval_min * k as i64))
                    .with_source(format!("synthetic_{k:04}"))
            })
            .collect();
        let id = config
            .scenario
            .clone()
            .unwrap_or_else(|| format!("synthetic-{}", config.seed));

        Ok(Self {
            files,
            manifest: ImageryManifest::new(id, frames),
            frames: SyntheticFrames {
                config: config.clone(),
                clock,
            },
        })
    }
}

fn build_file(config: &ScenarioConfig, half: HalfDay, rng: &mut StdRng) -> RadarSourceFile {
    let start_sec = match half {
        HalfDay::Day => 9.0 * 3600.0,
        HalfDay::Night => 21.0 * 3600.0,
    };
    let n = config.packets_per_file;
    let mut segments = Vec::new();
    for packet in 1..=n {
        let sec = start_sec + f64::from(packet - 1) / f64::from(n - 1) * HALF_DAY_SECS;
        for (bearing, start_nm, end_nm) in storm_arcs(config, sec) {
            if rng.gen_bool(config.noise.clamp(0.0, 1.0)) {
                continue;
            }
            let jitter: i16 = rng.gen_range(-1..=1);
            let category = (i16::from(config.category) + jitter).clamp(1, 15) as u8;
            segments.push(Segment::new(packet, category, bearing, start_nm, end_nm));
        }
    }
    let name = format!(
        "RDM_S{}{:02}_cat{:02}.json",
        config.date.format("%Y%m%d"),
        half.tag(),
        config.category
    );
    RadarSourceFile::new(name, config.site, segments)
}

/// One arc per degree of bearing crossing the storm disc.
fn storm_arcs(config: &ScenarioConfig, sec: f64) -> Vec<(f64, f64, f64)> {
    let (cx, cy) = config.storm_center(sec);
    let r2 = config.storm_radius_nm * config.storm_radius_nm;
    (0..360)
        .filter_map(|deg| {
            let bearing = f64::from(deg);
            let (sin, cos) = bearing.to_radians().sin_cos();
            let along = cx * sin + cy * cos;
            let across2 = cx * cx + cy * cy - along * along;
            if along <= 0.0 || across2 >= r2 {
                return None;
            }
            let half = (r2 - across2).sqrt();
            Some((bearing, (along - half).max(0.0), along + half))
        })
        .collect()
}
