use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryState {
    #[default]
    Collecting,
    /// Playback wrapped around; nothing more is recorded.
    Locked,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchSample {
    pub frame_index: usize,
    pub timestamp_ms: Option<i64>,
    /// `HH:MM:SS` local time, or `frame <i>` when the frame has no timestamp.
    pub label: String,
    pub match_percent: u32,
}

/// One sample per frame index, collected until playback first loops.
#[derive(Debug, Clone, Default)]
pub struct MatchHistory {
    state: HistoryState,
    max_seen: Option<usize>,
    recorded: BTreeSet<usize>,
    samples: Vec<MatchSample>,
}

impl MatchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes a tick for `frame_index`; locks when it is below the highest index seen so far.
    pub fn observe_frame(&mut self, frame_index: usize) -> HistoryState {
        match self.max_seen {
            Some(max) if frame_index < max => self.state = HistoryState::Locked,
            Some(max) if frame_index <= max => {}
            _ => self.max_seen = Some(frame_index),
        }
        self.state
    }

    /// Appends a sample unless locked or the frame index is already recorded.
    pub fn record(&mut self, sample: MatchSample) -> bool {
        if self.is_locked() || !self.recorded.insert(sample.frame_index) {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn state(&self) -> HistoryState {
        self.state
    }

    pub fn is_locked(&self) -> bool {
        self.state == HistoryState::Locked
    }

    pub fn samples(&self) -> &[MatchSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
