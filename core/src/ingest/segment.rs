use crate::math::clock::LocalClock;
use crate::math::geo::GeoPoint;
use crate::prelude::{SyncError, SyncResult};
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Site used when a radar document carries no location.
pub const DEFAULT_SITE: GeoPoint = GeoPoint {
    lat: 33.5,
    lon: 126.5,
};

/// One reflectivity arc at a fixed bearing, observed in one packet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub packet: u32,
    pub category: u8,
    pub bearing_deg: f64,
    pub start_nm: f64,
    pub end_nm: f64,
}

impl Segment {
    pub fn new(packet: u32, category: u8, bearing_deg: f64, start_nm: f64, end_nm: f64) -> Self {
        Self {
            packet,
            category,
            bearing_deg,
            start_nm,
            end_nm,
        }
    }

    /// Parses a `[packet, category, bearing, start, end]` row.
    pub fn from_row(row: &[Option<f64>]) -> Option<Self> {
        if row.len() < 5 {
            return None;
        }
        let mut values = [0.0; 5];
        for (slot, value) in values.iter_mut().zip(row) {
            let v = (*value)?;
            if !v.is_finite() {
                return None;
            }
            *slot = v;
        }
        let [packet, category, bearing_deg, start_nm, end_nm] = values;
        if packet < 0.0 || packet > f64::from(u32::MAX) || !(0.0..=15.0).contains(&category) {
            return None;
        }
        Some(Self::new(
            packet as u32,
            category as u8,
            bearing_deg,
            start_nm,
            end_nm,
        ))
    }

    pub fn with_packet(self, packet: u32) -> Self {
        Self { packet, ..self }
    }
}

/// Nominal half-day coverage of a radar source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum HalfDay {
    /// 09:00 to 21:00 local.
    Day,
    /// 21:00 to 09:00 local on the following day.
    Night,
}

impl HalfDay {
    pub fn tag(self) -> u8 {
        match self {
            HalfDay::Day => 0,
            HalfDay::Night => 1,
        }
    }

    /// Full 12-hour coverage window for a file dated `date`.
    pub fn window(self, date: NaiveDate, clock: &LocalClock) -> (DateTime<Utc>, DateTime<Utc>) {
        let start_hour = match self {
            HalfDay::Day => 9,
            HalfDay::Night => 21,
        };
        let start = clock.at(date, start_hour);
        (start, start + Duration::hours(12))
    }
}

impl TryFrom<u8> for HalfDay {
    type Error = String;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(HalfDay::Day),
            1 => Ok(HalfDay::Night),
            other => Err(format!("unknown half-day tag {other}")),
        }
    }
}

impl From<HalfDay> for u8 {
    fn from(half: HalfDay) -> u8 {
        half.tag()
    }
}

/// Caller-chosen usage window, in local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SliceWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SliceWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self { start, end }
    }

    /// Parses `YYYY-MM-DD HH:MM:SS` bounds.
    pub fn parse(start: &str, end: &str) -> SyncResult<Self> {
        Ok(Self::new(parse_local(start)?, parse_local(end)?))
    }
}

fn parse_local(text: &str) -> SyncResult<NaiveDateTime> {
    let trimmed = text.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S"))
        .map_err(|err| SyncError::InvalidInput(format!("bad local time {trimmed:?}: {err}")))
}

/// Metadata recoverable from a radar file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceNameInfo {
    pub date: Option<NaiveDate>,
    pub half_day: Option<HalfDay>,
    pub category: Option<String>,
}

/// Reads `RDM_<L><YYYYMMDD><CC>_cat<NN>` names, falling back to any `YYYYMMDD` run for the date.
pub fn parse_source_name(name: &str) -> SourceNameInfo {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    parse_rdm_name(base).unwrap_or_else(|| SourceNameInfo {
        date: find_date_run(base),
        ..Default::default()
    })
}

fn parse_rdm_name(name: &str) -> Option<SourceNameInfo> {
    let upper = name.to_ascii_uppercase();
    let start = upper.find("RDM_")? + 4;
    let rest = &upper.as_bytes()[start..];
    if rest.len() < 16 || !rest[0].is_ascii_alphabetic() {
        return None;
    }
    let digits = &rest[1..11];
    if !digits.iter().all(u8::is_ascii_digit) || &rest[11..15] != b"_CAT" {
        return None;
    }
    let category: String = rest[15..]
        .iter()
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| char::from(b))
        .collect();
    if category.is_empty() {
        return None;
    }
    let text = std::str::from_utf8(digits).ok()?;
    let date = NaiveDate::parse_from_str(&text[..8], "%Y%m%d").ok()?;
    let code: u8 = text[8..].parse().ok()?;
    Some(SourceNameInfo {
        date: Some(date),
        half_day: HalfDay::try_from(code).ok(),
        category: Some(category),
    })
}

fn find_date_run(name: &str) -> Option<NaiveDate> {
    let bytes = name.as_bytes();
    bytes.windows(8).find_map(|window| {
        if !window.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let text = std::str::from_utf8(window).ok()?;
        NaiveDate::parse_from_str(text, "%Y%m%d").ok()
    })
}

/// Radar JSON document as written by the external decoder.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadarDocument {
    #[serde(default, alias = "radarCenter")]
    pub radar_center: Option<[f64; 2]>,
    #[serde(default)]
    pub sac: Option<u32>,
    #[serde(default)]
    pub sic: Option<u32>,
    #[serde(default, alias = "vectors")]
    pub segments: Vec<Vec<Option<f64>>>,
}

/// One decoded half-day radar record.
#[derive(Debug, Clone)]
pub struct RadarSourceFile {
    pub name: String,
    pub half_day: Option<HalfDay>,
    pub date: Option<NaiveDate>,
    pub site: GeoPoint,
    pub sac: Option<u32>,
    pub sic: Option<u32>,
    pub slice: Option<SliceWindow>,
    segments: Vec<Segment>,
    local_max: u32,
}

impl RadarSourceFile {
    /// Wraps decoded segments; half-day and date are inferred from `name` when possible.
    pub fn new(name: impl Into<String>, site: GeoPoint, segments: Vec<Segment>) -> Self {
        let name = name.into();
        let info = parse_source_name(&name);
        let local_max = segments.iter().map(|s| s.packet).max().unwrap_or(0).max(1);
        Self {
            name,
            half_day: info.half_day,
            date: info.date,
            site,
            sac: None,
            sic: None,
            slice: None,
            segments,
            local_max,
        }
    }

    pub fn from_document(name: impl Into<String>, document: RadarDocument) -> Self {
        let segments = document
            .segments
            .iter()
            .filter_map(|row| Segment::from_row(row))
            .collect();
        let site = document
            .radar_center
            .map(|[lat, lon]| GeoPoint::new(lat, lon))
            .unwrap_or(DEFAULT_SITE);
        let mut file = Self::new(name, site, segments);
        file.sac = document.sac;
        file.sic = document.sic;
        file
    }

    pub fn from_json(name: impl Into<String>, text: &str) -> SyncResult<Self> {
        let name = name.into();
        let document: RadarDocument = serde_json::from_str(text)
            .map_err(|err| SyncError::InvalidInput(format!("{name}: {err}")))?;
        Ok(Self::from_document(name, document))
    }

    pub fn with_half_day(mut self, half_day: HalfDay) -> Self {
        self.half_day = Some(half_day);
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_slice(mut self, slice: SliceWindow) -> Self {
        self.slice = Some(slice);
        self
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Largest original packet number present, at least 1.
    pub fn local_max(&self) -> u32 {
        self.local_max
    }
}
