//! Synthetic capture source for the demo binary and tests.
//!
//! Produces flat gray frames with a bright square orbiting the center. The
//! stub detector recomputes the same orbit from the sequence number, which
//! gives the demo deterministic "detections" without a model.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::info;

use crate::capture::{CaptureSource, Frame, FrameMetadata, PixelFormat};
use crate::error::PipelineError;

const BACKGROUND: u8 = 40;
const SQUARE: u8 = 230;

/// Position of the synthetic square for a given capture sequence number,
/// as `(x1, y1, x2, y2)` in pixel space.
pub fn square_at(sequence: u64, width: u32, height: u32) -> (f32, f32, f32, f32) {
    let side = (width.min(height) / 6).max(8) as f32;
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    let radius = (width.min(height) as f32 / 2.0 - side).max(side);
    let angle = sequence as f32 * 0.05;
    let x = cx + radius * angle.cos() - side / 2.0;
    let y = cy + radius * angle.sin() - side / 2.0;
    let x = x.clamp(0.0, width as f32 - side);
    let y = y.clamp(0.0, height as f32 - side);
    (x, y, x + side, y + side)
}

/// Deterministic frame generator with optional pacing.
pub struct SyntheticSource {
    width: u32,
    height: u32,
    frame_interval: Duration,
    sequence: u64,
    opened: bool,
    last_read: Option<Instant>,
}

impl SyntheticSource {
    pub fn new(width: u32, height: u32, fps: f32) -> Self {
        let frame_interval = if fps > 0.0 {
            Duration::from_secs_f32(1.0 / fps)
        } else {
            Duration::ZERO
        };
        Self {
            width,
            height,
            frame_interval,
            sequence: 0,
            opened: false,
            last_read: None,
        }
    }

    fn render(&self, sequence: u64) -> Bytes {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut buf = vec![BACKGROUND; w * h * 3];

        let (x1, y1, x2, y2) = square_at(sequence, self.width, self.height);
        for y in y1 as usize..(y2 as usize).min(h) {
            for x in x1 as usize..(x2 as usize).min(w) {
                let i = (y * w + x) * 3;
                buf[i] = SQUARE;
                buf[i + 1] = SQUARE;
                buf[i + 2] = SQUARE;
            }
        }
        Bytes::from(buf)
    }
}

impl CaptureSource for SyntheticSource {
    fn open(&mut self) -> Result<(), PipelineError> {
        if self.width == 0 || self.height == 0 {
            return Err(PipelineError::SourceOpen {
                identifier: "synthetic".into(),
                reason: format!("invalid geometry {}x{}", self.width, self.height),
            });
        }
        self.opened = true;
        info!(
            width = self.width,
            height = self.height,
            "synthetic source opened"
        );
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        if !self.opened {
            return None;
        }

        // Pace reads to the native rate.
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < self.frame_interval {
                std::thread::sleep(self.frame_interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());

        self.sequence += 1;
        let meta = Arc::new(FrameMetadata {
            sequence: self.sequence,
            width: self.width,
            height: self.height,
            format: PixelFormat::Rgb24,
        });

        Some(Frame {
            data: self.render(self.sequence),
            meta,
            timestamp: Instant::now(),
        })
    }

    fn native_fps(&self) -> f32 {
        if self.frame_interval.is_zero() {
            0.0
        } else {
            1.0 / self.frame_interval.as_secs_f32()
        }
    }

    fn release(&mut self) -> Result<(), PipelineError> {
        self.opened = false;
        info!("synthetic source released");
        Ok(())
    }
}
