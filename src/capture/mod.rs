pub mod frame;
pub mod source;
pub mod synthetic;

pub use frame::Frame;
pub use frame::FrameMetadata;
pub use frame::PixelFormat;
pub use source::CaptureSource;
pub use synthetic::SyntheticSource;
