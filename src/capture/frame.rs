use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Frame data with zero-copy semantics
///
/// Immutable once captured: the producer never touches a frame again after
/// enqueueing it, so the buffer can be shared across threads without copying.
#[derive(Clone)]
pub struct Frame {
    /// Immutable pixel data
    pub data: Bytes,

    /// Frame metadata
    pub meta: Arc<FrameMetadata>,

    /// Capture timestamp for latency tracking
    pub timestamp: Instant,
}

/// Frame metadata
#[derive(Debug, Clone)]
pub struct FrameMetadata {
    /// Monotonically increasing capture sequence number
    pub sequence: u64,
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Pixel formats we support
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    Rgb24,
    Bgr24,
    Rgba32,
}

impl PixelFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => 3,
            PixelFormat::Rgba32 => 4,
        }
    }
}

impl Frame {
    pub fn width(&self) -> u32 {
        self.meta.width
    }

    pub fn height(&self) -> u32 {
        self.meta.height
    }

    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }

    /// Expected buffer length for the frame's geometry and format.
    pub fn expected_len(&self) -> usize {
        self.meta.width as usize * self.meta.height as usize * self.meta.format.bytes_per_pixel()
    }
}
