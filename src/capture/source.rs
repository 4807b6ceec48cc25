//! Capture source seam.
//!
//! The decoding layer (camera, file, RTSP) lives behind this trait; the
//! pipeline only ever sees opened handles through the detection worker,
//! which owns the source exclusively. Nothing else may read or release it.

use crate::capture::Frame;
use crate::error::PipelineError;

/// A video source the detection worker pulls frames from.
pub trait CaptureSource: Send {
    /// Open the underlying handle. Called exactly once, during pipeline
    /// setup; failure is fatal to setup and the pipeline never starts.
    fn open(&mut self) -> Result<(), PipelineError>;

    /// Read the next frame. `None` means no frame was available this cycle
    /// (stream hiccup, end of file); the worker treats it as the end of the
    /// current batch cycle, not as termination.
    fn read_frame(&mut self) -> Option<Frame>;

    /// Frame rate the source natively produces, for display next to the
    /// target rate.
    fn native_fps(&self) -> f32 {
        30.0
    }

    /// Release the underlying handle. Called exactly once, from the
    /// detection worker's exit path; a failure is reported there and does
    /// not abort teardown. Must be safe to call only after `open` succeeded.
    fn release(&mut self) -> Result<(), PipelineError>;
}
