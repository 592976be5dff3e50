pub mod align;
pub mod compare;
pub mod history;
pub mod imagery;
pub mod mapper;
pub mod polar;
pub mod timeline;

pub use align::{Alignment, CommonWindow, FrameRange, TimeRange};
pub use compare::{compare_grids, ConfusionStats, DetectionMask};
pub use history::{HistoryState, MatchHistory, MatchSample};
pub use imagery::ImageryRasterizer;
pub use mapper::{FrameMapper, FrameTick, PacketSelection, PacketTime, PacketTimeTable, PacketWindow};
pub use polar::PolarRasterizer;
pub use timeline::{
    stitch, FileSlice, PacketIndex, RawRange, RejectedFile, SliceSummary, StitchOutcome, StitchWindow,
    StitchedTimeline, TimelineBuilder, TimelineChunk,
};
