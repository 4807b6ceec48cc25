pub mod overlay;
pub mod postprocess;
pub mod sink;

pub use overlay::{draw_boxes, ProcessedFrame};
pub use postprocess::{postprocess, RenderedDetection};
pub use sink::{DisplaySink, LogSink};
