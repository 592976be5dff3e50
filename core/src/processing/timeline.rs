//! Stitches half-day radar files into one gapless global packet axis.
//!
//! Each file covers a nominal 12-hour window. The part of that window that
//! falls inside the requested span is converted into a fraction of the file's
//! original packet range, and the selected packets are renumbered onto a
//! single global axis that starts at 1 and never reuses an id.

use crate::ingest::segment::{HalfDay, RadarSourceFile, Segment};
use crate::math::clock::LocalClock;
use crate::math::geo::GeoPoint;
use crate::math::stats::StatsHelper;
use crate::prelude::{SyncError, SyncResult};
use crate::processing::mapper::{PacketTime, PacketTimeTable};
use crate::telemetry::log::LogManager;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;

/// Span of real time the stitched timeline should cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StitchWindow {
    /// Clip every file to this local calendar day.
    Day(NaiveDate),
    /// Clip to the latest date found among the files.
    #[default]
    LatestDay,
    /// Use each file's whole half-day window.
    FullFiles,
}

/// Contiguous run of global packets contributed by one source file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TimelineChunk {
    pub packet_start: u32,
    pub packet_end: u32,
    /// Seconds from the timeline origin to the first packet.
    pub start_sec: f64,
    pub duration_sec: f64,
}

impl TimelineChunk {
    pub fn contains(&self, packet: u32) -> bool {
        (self.packet_start..=self.packet_end).contains(&packet)
    }

    /// Elapsed seconds of `packet`, spreading packets linearly over the chunk.
    pub fn time_of(&self, packet: u32) -> f64 {
        let span = (self.packet_end - self.packet_start).max(1);
        let ratio = f64::from(packet.saturating_sub(self.packet_start)) / f64::from(span);
        self.start_sec + ratio * self.duration_sec
    }
}

/// Global packet number to segments. Every packet up to the maximum is present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PacketIndex {
    packets: Vec<Vec<Segment>>,
}

impl PacketIndex {
    pub fn max_packet(&self) -> u32 {
        self.packets.len() as u32
    }

    pub fn contains(&self, packet: u32) -> bool {
        packet >= 1 && packet <= self.max_packet()
    }

    pub fn segments(&self, packet: u32) -> &[Segment] {
        packet
            .checked_sub(1)
            .and_then(|i| self.packets.get(i as usize))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All segments of packets `start..=end`.
    pub fn merged(&self, start: u32, end: u32) -> Vec<Segment> {
        (start.max(1)..=end)
            .flat_map(|p| self.segments(p).iter().copied())
            .collect()
    }

    pub fn non_empty_packets(&self) -> usize {
        self.packets.iter().filter(|p| !p.is_empty()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &[Segment])> {
        self.packets
            .iter()
            .enumerate()
            .map(|(i, segs)| (i as u32 + 1, segs.as_slice()))
    }

    fn grow_to(&mut self, max_packet: u32) {
        if self.packets.len() < max_packet as usize {
            self.packets.resize_with(max_packet as usize, Vec::new);
        }
    }

    fn push(&mut self, segment: Segment) {
        self.grow_to(segment.packet);
        if let Some(slot) = segment.packet.checked_sub(1) {
            self.packets[slot as usize].push(segment);
        }
    }
}

/// Diagnostic record of how one file was used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileSlice {
    pub file: String,
    pub chunk: u8,
    pub seg_len: usize,
    pub local_max_pkts: u32,
    pub use_start: String,
    pub use_end: String,
    pub used_orig_pkt_range: (u32, u32),
    pub used_new_pkt_range: (u32, u32),
    pub start_sec: f64,
    pub duration_sec: f64,
}

impl FileSlice {
    pub fn used_orig_pkts(&self) -> u32 {
        self.used_orig_pkt_range.1 - self.used_orig_pkt_range.0 + 1
    }

    pub fn used_new_pkts(&self) -> u32 {
        self.used_new_pkt_range.1 - self.used_new_pkt_range.0 + 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedFile {
    pub file: String,
    pub reason: String,
}

/// Stitching summary for diagnostic display.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SliceSummary {
    pub files: Vec<FileSlice>,
    pub rejected: Vec<RejectedFile>,
    pub total_files: usize,
    pub total_pkts: u32,
    pub total_orig_pkts_all: u64,
    pub total_used_orig_pkts: u64,
    pub total_used_new_pkts: u64,
    pub non_empty_pkts: usize,
}

impl SliceSummary {
    /// Share of the original packets that made it onto the timeline.
    pub fn orig_usage_percent(&self) -> Option<u32> {
        if self.total_orig_pkts_all == 0 {
            return None;
        }
        Some(StatsHelper::percent(StatsHelper::ratio(
            self.total_used_orig_pkts as usize,
            self.total_orig_pkts_all as usize,
        )))
    }
}

/// First and last packet times of a timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawRange {
    /// Seconds since local midnight of the timeline's base day.
    pub start_sec: f64,
    pub end_sec: f64,
    pub start_local: String,
    pub end_local: String,
}

/// Ordered chunks mapping global packets to elapsed time.
#[derive(Debug, Clone)]
pub struct StitchedTimeline {
    chunks: Vec<TimelineChunk>,
    origin: DateTime<Utc>,
    base_date: NaiveDate,
    clock: LocalClock,
}

impl StitchedTimeline {
    pub fn chunks(&self) -> &[TimelineChunk] {
        &self.chunks
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn max_packet(&self) -> u32 {
        self.chunks.last().map_or(0, |c| c.packet_end)
    }

    /// Local day that seconds-of-day values are measured from.
    pub fn base_date(&self) -> NaiveDate {
        self.base_date
    }

    pub fn clock(&self) -> &LocalClock {
        &self.clock
    }

    pub fn chunk_of(&self, packet: u32) -> Option<&TimelineChunk> {
        self.chunks.iter().find(|c| c.contains(packet))
    }

    /// Seconds from the timeline origin to `packet`.
    pub fn elapsed_sec(&self, packet: u32) -> Option<f64> {
        self.chunk_of(packet).map(|c| c.time_of(packet))
    }

    pub fn instant(&self, packet: u32) -> Option<DateTime<Utc>> {
        let elapsed = self.elapsed_sec(packet)?;
        Some(self.origin + Duration::milliseconds((elapsed * 1000.0).round() as i64))
    }

    /// Seconds since local midnight of the base day; exceeds a day past midnight.
    pub fn sec_of_day(&self, packet: u32) -> Option<f64> {
        let instant = self.instant(packet)?;
        Some(self.clock.secs_since_midnight_of(self.base_date, instant))
    }

    pub fn local_time(&self, packet: u32) -> Option<String> {
        self.instant(packet).map(|t| self.clock.format(t))
    }

    pub fn raw_range(&self) -> Option<RawRange> {
        let last = self.max_packet();
        Some(RawRange {
            start_sec: self.sec_of_day(1)?,
            end_sec: self.sec_of_day(last)?,
            start_local: self.local_time(1)?,
            end_local: self.local_time(last)?,
        })
    }

    /// Clock time of every packet, in packet order.
    pub fn time_table(&self) -> PacketTimeTable {
        let rows = (1..=self.max_packet())
            .filter_map(|packet| self.sec_of_day(packet).map(|sec| PacketTime { packet, sec }))
            .collect();
        PacketTimeTable::new(rows)
    }
}

/// Everything produced by one stitching run.
#[derive(Debug, Clone)]
pub struct StitchOutcome {
    pub timeline: StitchedTimeline,
    pub index: PacketIndex,
    pub summary: SliceSummary,
    /// Site of the first accepted file.
    pub site: Option<GeoPoint>,
}

struct Candidate<'a> {
    file: &'a RadarSourceFile,
    half_day: HalfDay,
    full_start: DateTime<Utc>,
    use_start: DateTime<Utc>,
    use_end: DateTime<Utc>,
    orig: (u32, u32),
}

pub struct TimelineBuilder {
    clock: LocalClock,
    window: StitchWindow,
    logger: LogManager,
}

impl TimelineBuilder {
    pub fn new(clock: LocalClock, window: StitchWindow) -> Self {
        Self {
            clock,
            window,
            logger: LogManager::new("timeline"),
        }
    }

    pub fn stitch(&self, files: &[RadarSourceFile]) -> StitchOutcome {
        let target_day = match self.window {
            StitchWindow::Day(day) => Some(day),
            StitchWindow::LatestDay => files.iter().filter_map(|f| f.date).max(),
            StitchWindow::FullFiles => None,
        };

        let mut summary = SliceSummary::default();
        let mut candidates = Vec::new();
        for file in files {
            match self.resolve(file, target_day) {
                Ok(Some(candidate)) => candidates.push(candidate),
                Ok(None) => self
                    .logger
                    .detail(&format!("{} has no packets in the stitch window", file.name)),
                Err(err) => {
                    self.logger.warn(&format!("dropping {}: {}", file.name, err));
                    summary.rejected.push(RejectedFile {
                        file: file.name.clone(),
                        reason: err.to_string(),
                    });
                }
            }
        }
        candidates.sort_by_key(|c| c.use_start);

        let origin = match target_day {
            Some(day) => self.clock.midnight(day),
            None => candidates
                .iter()
                .map(|c| c.full_start)
                .min()
                .unwrap_or_default(),
        };
        let base_date = target_day.unwrap_or_else(|| self.clock.local_date(origin));

        let mut index = PacketIndex::default();
        let mut chunks = Vec::with_capacity(candidates.len());
        let mut last_packet = 0u32;

        for candidate in &candidates {
            let (orig_start, orig_end) = candidate.orig;
            let new_start = last_packet + 1;
            let new_end = last_packet + (orig_end - orig_start + 1);
            index.grow_to(new_end);

            for segment in candidate.file.segments() {
                if (orig_start..=orig_end).contains(&segment.packet) {
                    index.push(segment.with_packet(new_start + (segment.packet - orig_start)));
                }
            }

            let start_sec = ((candidate.use_start - origin).num_milliseconds() as f64 / 1000.0).round();
            let duration_sec =
                ((candidate.use_end - candidate.use_start).num_milliseconds() as f64 / 1000.0).max(0.0);
            chunks.push(TimelineChunk {
                packet_start: new_start,
                packet_end: new_end,
                start_sec,
                duration_sec,
            });

            let slice = FileSlice {
                file: candidate.file.name.clone(),
                chunk: candidate.half_day.tag(),
                seg_len: candidate.file.segments().len(),
                local_max_pkts: candidate.file.local_max(),
                use_start: self.clock.format(candidate.use_start),
                use_end: self.clock.format(candidate.use_end),
                used_orig_pkt_range: (orig_start, orig_end),
                used_new_pkt_range: (new_start, new_end),
                start_sec,
                duration_sec,
            };
            self.logger.record(&format!(
                "{} chunk {:02}: orig {}..={} -> global {}..={} ({} .. {})",
                slice.file,
                slice.chunk,
                orig_start,
                orig_end,
                new_start,
                new_end,
                slice.use_start,
                slice.use_end
            ));
            summary.total_orig_pkts_all += u64::from(slice.local_max_pkts);
            summary.total_used_orig_pkts += u64::from(slice.used_orig_pkts());
            summary.total_used_new_pkts += u64::from(slice.used_new_pkts());
            summary.files.push(slice);
            last_packet = new_end;
        }

        summary.total_files = summary.files.len();
        summary.total_pkts = last_packet;
        summary.non_empty_pkts = index.non_empty_packets();

        StitchOutcome {
            timeline: StitchedTimeline {
                chunks,
                origin,
                base_date,
                clock: self.clock,
            },
            index,
            summary,
            site: candidates.first().map(|c| c.file.site),
        }
    }

    fn resolve<'a>(
        &self,
        file: &'a RadarSourceFile,
        target_day: Option<NaiveDate>,
    ) -> SyncResult<Option<Candidate<'a>>> {
        if file.segments().is_empty() {
            return Err(SyncError::EmptySegments(file.name.clone()));
        }
        let half_day = file
            .half_day
            .ok_or_else(|| SyncError::ChunkUnresolved(file.name.clone()))?;
        let date = file
            .date
            .ok_or_else(|| SyncError::DateUnresolved(file.name.clone()))?;

        let (full_start, full_end) = half_day.window(date, &self.clock);
        let (use_start, use_end) = match (file.slice, target_day) {
            (Some(slice), _) => (
                self.clock.local_to_utc(slice.start),
                self.clock.local_to_utc(slice.end),
            ),
            (None, Some(day)) => {
                let day_start = self.clock.midnight(day);
                let day_end = day_start + Duration::days(1);
                (full_start.max(day_start), full_end.min(day_end))
            }
            (None, None) => (full_start, full_end),
        };
        if use_end <= use_start {
            return Ok(None);
        }

        let Some((a, b)) = window_fraction(full_start, full_end, use_start, use_end) else {
            return Ok(None);
        };
        Ok(packet_range(a, b, file.local_max()).map(|orig| Candidate {
            file,
            half_day,
            full_start,
            use_start,
            use_end,
            orig,
        }))
    }
}

/// Stitches `files` with a one-off builder.
pub fn stitch(files: &[RadarSourceFile], window: StitchWindow, clock: LocalClock) -> StitchOutcome {
    TimelineBuilder::new(clock, window).stitch(files)
}

/// Position of the used window inside the full window, as `[a, b]` in `0..=1`.
fn window_fraction(
    full_start: DateTime<Utc>,
    full_end: DateTime<Utc>,
    use_start: DateTime<Utc>,
    use_end: DateTime<Utc>,
) -> Option<(f64, f64)> {
    let full_ms = (full_end - full_start).num_milliseconds();
    if full_ms <= 0 {
        return None;
    }
    let s = use_start.clamp(full_start, full_end);
    let e = use_end.clamp(full_start, full_end);
    if e <= s {
        return None;
    }
    let a = (s - full_start).num_milliseconds() as f64 / full_ms as f64;
    let b = (e - full_start).num_milliseconds() as f64 / full_ms as f64;
    Some((a, b))
}

/// Inclusive original-packet range covering fraction `[a, b]` of `1..=local_max`.
fn packet_range(a: f64, b: f64, local_max: u32) -> Option<(u32, u32)> {
    let n = f64::from(local_max.max(1));
    let start = (a * n).ceil().clamp(1.0, n) as u32;
    let end = (b * n).floor().clamp(1.0, n) as u32;
    (start <= end).then_some((start, end))
}
