//! Alignment and agreement-scoring core for radar / imagery weather replays.
//!
//! Radar arcs are stitched into one packet timeline, imagery frames are mapped
//! onto radar packets by time, and both sides are rasterized onto a shared
//! occupancy grid so their agreement can be scored tick by tick.

pub mod ingest;
pub mod math;
pub mod prelude;
pub mod processing;
pub mod session;
pub mod telemetry;

pub use prelude::{ClassifierConfig, GridStage, SyncConfig, SyncError, SyncResult};
pub use session::{SessionSummary, SkipReason, SyncSession, TickOutcome, TickReport};
