//! Display sink seam.

use tracing::info;

use crate::error::PipelineError;
use crate::render::overlay::ProcessedFrame;

/// Where annotated frames go. The GUI implements this over its video
/// widget; the demo binary just logs.
pub trait DisplaySink: Send {
    fn present(&mut self, frame: ProcessedFrame) -> Result<(), PipelineError>;

    /// Smoothed render-loop FPS, reported every iteration.
    fn report_fps(&mut self, fps: f32);
}

/// Headless sink that logs a line every `log_every` frames.
pub struct LogSink {
    log_every: u64,
    presented: u64,
    last_fps: f32,
}

impl LogSink {
    pub fn new(log_every: u64) -> Self {
        Self {
            log_every: log_every.max(1),
            presented: 0,
            last_fps: 0.0,
        }
    }
}

impl DisplaySink for LogSink {
    fn present(&mut self, frame: ProcessedFrame) -> Result<(), PipelineError> {
        self.presented += 1;
        if self.presented % self.log_every == 0 {
            info!(
                sequence = frame.sequence(),
                boxes = frame.detections.len(),
                fps = format_args!("{:.1}", self.last_fps),
                "presented frame"
            );
        }
        Ok(())
    }

    fn report_fps(&mut self, fps: f32) {
        self.last_fps = fps;
    }
}
