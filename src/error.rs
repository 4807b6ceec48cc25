//! Error taxonomy for the detection/render pipeline.
//!
//! Only `SourceOpen` aborts anything: it is fatal to `setup` and the
//! pipeline never starts. `SourceRelease` is reported once, from the
//! detection worker's exit path during terminate, and teardown completes
//! regardless. Everything a worker loop hits per iteration is recovered in
//! place: the batch or frame is dropped, a warning is logged, and the loop
//! continues. Queue starvation is not an error at all; it surfaces as an
//! empty `get` and is handled inline by the consumer.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The capture source could not be opened. Fatal to `setup`; the
    /// pipeline never starts.
    #[error("failed to open capture source `{identifier}`: {reason}")]
    SourceOpen { identifier: String, reason: String },

    /// The capture handle could not be released cleanly. Reported once
    /// during terminate; teardown still completes.
    #[error("failed to release capture source: {0}")]
    SourceRelease(String),

    /// A batch of frames failed inference. Recovered per-batch: the batch is
    /// dropped and the detection loop continues.
    #[error("inference failed: {0}")]
    Inference(String),

    /// A single frame failed post-processing or presentation. Recovered
    /// per-frame: the frame is skipped and the render loop continues.
    #[error("render failed: {0}")]
    Render(String),
}
