//! Box overlay rasterization.
//!
//! Draws 2-pixel rectangle outlines directly into a copy of the frame
//! buffer. Text layout is the display layer's job; the label strings ride
//! along on the processed frame.

use std::sync::Arc;

use bytes::Bytes;

use crate::capture::{Frame, FrameMetadata};
use crate::error::PipelineError;
use crate::render::postprocess::RenderedDetection;

const OUTLINE_PX: usize = 2;

/// Annotated frame ready for the display sink.
#[derive(Clone)]
pub struct ProcessedFrame {
    pub data: Bytes,
    pub meta: Arc<FrameMetadata>,
    pub detections: Vec<RenderedDetection>,
}

impl ProcessedFrame {
    pub fn sequence(&self) -> u64 {
        self.meta.sequence
    }
}

fn put_pixel(buf: &mut [u8], w: usize, bpp: usize, x: usize, y: usize, color: [u8; 3]) {
    let i = (y * w + x) * bpp;
    buf[i] = color[0];
    buf[i + 1] = color[1];
    buf[i + 2] = color[2];
}

/// Draw rectangle outlines for every rendered detection, clipped to the
/// frame. Fails only when the frame buffer does not match its metadata,
/// which the caller treats as a skip-this-frame render error.
pub fn draw_boxes(
    frame: &Frame,
    detections: &[RenderedDetection],
) -> Result<ProcessedFrame, PipelineError> {
    if frame.data.len() != frame.expected_len() {
        return Err(PipelineError::Render(format!(
            "frame {} buffer is {} bytes, expected {}",
            frame.sequence(),
            frame.data.len(),
            frame.expected_len()
        )));
    }

    let w = frame.width() as usize;
    let h = frame.height() as usize;
    if w == 0 || h == 0 {
        // Nothing to draw on; pass the frame through untouched.
        return Ok(ProcessedFrame {
            data: frame.data.clone(),
            meta: frame.meta.clone(),
            detections: detections.to_vec(),
        });
    }
    let bpp = frame.meta.format.bytes_per_pixel();
    let mut buf = frame.data.to_vec();

    for rendered in detections {
        let bbox = &rendered.detection.bbox;
        let x1 = (bbox.x1.max(0.0) as usize).min(w.saturating_sub(1));
        let y1 = (bbox.y1.max(0.0) as usize).min(h.saturating_sub(1));
        let x2 = (bbox.x2.max(0.0) as usize).min(w.saturating_sub(1));
        let y2 = (bbox.y2.max(0.0) as usize).min(h.saturating_sub(1));

        for t in 0..OUTLINE_PX {
            // Horizontal edges
            for x in x1..=x2 {
                if y1 + t < h {
                    put_pixel(&mut buf, w, bpp, x, y1 + t, rendered.color);
                }
                if y2 >= t {
                    put_pixel(&mut buf, w, bpp, x, y2 - t, rendered.color);
                }
            }
            // Vertical edges
            for y in y1..=y2 {
                if x1 + t < w {
                    put_pixel(&mut buf, w, bpp, x1 + t, y, rendered.color);
                }
                if x2 >= t {
                    put_pixel(&mut buf, w, bpp, x2 - t, y, rendered.color);
                }
            }
        }
    }

    Ok(ProcessedFrame {
        data: Bytes::from(buf),
        meta: frame.meta.clone(),
        detections: detections.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::PixelFormat;
    use crate::detect::{BoundingBox, Detection};
    use std::time::Instant;

    fn frame(w: u32, h: u32) -> Frame {
        Frame {
            data: Bytes::from(vec![0u8; (w * h * 3) as usize]),
            meta: Arc::new(FrameMetadata {
                sequence: 7,
                width: w,
                height: h,
                format: PixelFormat::Rgb24,
            }),
            timestamp: Instant::now(),
        }
    }

    fn rendered(bbox: BoundingBox) -> RenderedDetection {
        RenderedDetection {
            detection: Detection::new(bbox, 0.9, 0),
            color: [255, 0, 0],
            label: "test".into(),
        }
    }

    #[test]
    fn outline_lands_on_box_corner() {
        let f = frame(32, 32);
        let out = draw_boxes(&f, &[rendered(BoundingBox::new(4.0, 4.0, 20.0, 20.0))]).unwrap();
        let i = (4 * 32 + 4) * 3;
        assert_eq!(&out.data[i..i + 3], &[255, 0, 0]);
        assert_eq!(out.data.len(), f.data.len());
    }

    #[test]
    fn boxes_out_of_bounds_are_clipped() {
        let f = frame(32, 32);
        let out = draw_boxes(&f, &[rendered(BoundingBox::new(-10.0, -10.0, 100.0, 100.0))]);
        assert!(out.is_ok());
    }

    #[test]
    fn zero_sized_frame_passes_through_untouched() {
        let f = frame(0, 0);
        let out = draw_boxes(&f, &[rendered(BoundingBox::new(0.0, 0.0, 4.0, 4.0))]).unwrap();
        assert!(out.data.is_empty());
        assert_eq!(out.detections.len(), 1);
    }

    #[test]
    fn mismatched_buffer_is_a_render_error() {
        let mut f = frame(32, 32);
        f.data = Bytes::from(vec![0u8; 10]);
        assert!(matches!(
            draw_boxes(&f, &[]),
            Err(PipelineError::Render(_))
        ));
    }
}
