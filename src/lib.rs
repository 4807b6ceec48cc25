//! Watchtower: an asynchronous object-detection/render pipeline.
//!
//! Frames flow capture source -> detection worker -> bounded frame queue ->
//! render worker -> display sink, across exactly two long-lived worker
//! threads. The [`pipeline::PipelineController`] owns both workers and the
//! shared runtime configuration; model, tracker, capture and display are
//! opaque capabilities behind traits.

pub mod capture;
pub mod config;
pub mod detect;
pub mod error;
pub mod pipeline;
pub mod render;

pub use capture::{CaptureSource, Frame, FrameMetadata, PixelFormat};
pub use config::{ColorMode, ColorTable, PipelineConfig, Settings};
pub use detect::{Detection, DetectionResult, Detector, ObjectTracker};
pub use error::PipelineError;
pub use pipeline::{PipelineController, Worker, WorkerState};
pub use render::{DisplaySink, ProcessedFrame};
