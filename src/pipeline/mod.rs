pub mod controller;
pub mod detect_worker;
pub mod queue;
pub mod render_worker;
pub mod worker;

pub use controller::{PipelineController, PipelineStats};
pub use detect_worker::DetectionWorker;
pub use queue::{FramePacket, FrameQueue, QueueStats};
pub use render_worker::RenderWorker;
pub use worker::{Worker, WorkerState};
