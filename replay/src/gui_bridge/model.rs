use crate::workflow::runner::PlaybackResult;
use serde::Serialize;
use wxsynccore::processing::MatchSample;
use wxsynccore::{SessionSummary, TickReport};

/// Latest results published for the presentation layer.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SyncSnapshot {
    pub status: String,
    pub last_tick: Option<TickReport>,
    pub history: Vec<MatchSample>,
    pub mean_match_percent: Option<f64>,
    pub summary: Option<SessionSummary>,
}

impl SyncSnapshot {
    pub fn from_playback(status: impl Into<String>, result: &PlaybackResult) -> Self {
        Self {
            status: status.into(),
            last_tick: result.last_report.clone(),
            history: result.history.clone(),
            mean_match_percent: result.mean_match_percent,
            summary: Some(result.summary.clone()),
        }
    }
}
