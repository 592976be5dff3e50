pub mod legend;
pub mod manifest;
pub mod pixels;
pub mod segment;

pub use legend::{ColorRemovalRule, Legend, LegendColor, LegendRect};
pub use manifest::{Frame, FrameSource, ImageryManifest};
pub use pixels::PixelBuffer;
pub use segment::{HalfDay, RadarDocument, RadarSourceFile, Segment, SliceWindow, SourceNameInfo};
