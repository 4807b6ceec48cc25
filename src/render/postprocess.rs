//! Per-frame detection post-processing.
//!
//! Runs on the consumer side, against whatever configuration values are
//! current at that iteration: confidence filter, class omission, minimum box
//! size, confidence-descending sort, truncation to the box limit, color
//! lookup, and label formatting.

use crate::config::{ColorMode, PipelineConfig, UNIFORM_COLOR};
use crate::detect::{class_name, Detection};

/// A detection that survived filtering, ready to draw.
#[derive(Debug, Clone)]
pub struct RenderedDetection {
    pub detection: Detection,
    pub color: [u8; 3],
    pub label: String,
}

fn label_for(det: &Detection) -> String {
    let mut label = format!("{}: {:.2}", class_name(det.class_id), det.confidence);
    if let Some(id) = det.track_id {
        label.push_str(&format!(" #{id}"));
    }
    label
}

pub fn postprocess(detections: &[Detection], config: &PipelineConfig) -> Vec<RenderedDetection> {
    let threshold = config.confidence_threshold();
    let omitted = config.omitted_classes();
    let min_size = config.min_box_size() as f32;

    let mut kept: Vec<&Detection> = detections
        .iter()
        .filter(|d| d.confidence >= threshold)
        .filter(|d| !omitted.contains(&d.class_id))
        .filter(|d| d.bbox.width() >= min_size && d.bbox.height() >= min_size)
        .collect();

    kept.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    kept.truncate(config.max_boxes());

    let mode = config.color_mode();
    let table = config.color_table();

    kept.into_iter()
        .map(|det| {
            let color = match mode {
                ColorMode::Uniform => UNIFORM_COLOR,
                ColorMode::PerClass => table.color_for(det.class_id),
            };
            RenderedDetection {
                detection: det.clone(),
                color,
                label: label_for(det),
            }
        })
        .collect()
}
