//! Runtime configuration shared between the GUI thread and both workers.
//!
//! The GUI mutates these fields while the pipeline is live; both worker
//! loops read them every iteration. No invariant spans more than one field,
//! so each field is an independent atomic rather than a mutex-guarded blob.
//! A one-iteration-stale read of any single field is accepted behavior, not
//! a bug: a confidence threshold updated mid-iteration takes effect on the
//! next frame at the latest.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};

/// Box coloring strategy for rendered detections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColorMode {
    /// Every box gets the same color.
    Uniform,
    /// Color looked up from a per-class table.
    PerClass,
}

impl ColorMode {
    fn as_u8(self) -> u8 {
        match self {
            ColorMode::Uniform => 0,
            ColorMode::PerClass => 1,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => ColorMode::PerClass,
            _ => ColorMode::Uniform,
        }
    }
}

/// RGB color used when drawing uniform boxes.
pub const UNIFORM_COLOR: [u8; 3] = [0, 255, 0];

/// Base palette cycled per class id when building a color table.
const PALETTE: [[u8; 3]; 10] = [
    [230, 57, 70],
    [46, 196, 182],
    [255, 159, 28],
    [106, 76, 219],
    [67, 170, 139],
    [244, 162, 97],
    [38, 132, 255],
    [229, 80, 157],
    [144, 190, 109],
    [255, 202, 58],
];

/// Fixed-size per-class color lookup, built once per configuration change.
/// Indexed by class id modulo table length; never consulted dynamically
/// beyond a slice index.
#[derive(Debug, Clone)]
pub struct ColorTable {
    colors: Vec<[u8; 3]>,
}

impl ColorTable {
    /// Build a table covering `num_classes` classes by cycling the palette.
    pub fn new(num_classes: usize) -> Self {
        let n = num_classes.max(1);
        let colors = (0..n).map(|i| PALETTE[i % PALETTE.len()]).collect();
        Self { colors }
    }

    pub fn color_for(&self, class_id: u32) -> [u8; 3] {
        self.colors[class_id as usize % self.colors.len()]
    }
}

/// Live pipeline parameters, one atomic per field.
///
/// Scalars store through `Relaxed` atomics; the omitted-class set and the
/// color table swap whole `Arc`s so readers always see a consistent value of
/// that single field.
pub struct PipelineConfig {
    confidence_threshold: AtomicU32, // f32 bits
    max_boxes: AtomicUsize,
    min_box_size: AtomicU32,
    nth_frame: AtomicU32,
    target_fps: AtomicU32, // f32 bits
    tracking_enabled: AtomicBool,
    color_mode: AtomicU8,
    omitted_classes: ArcSwap<HashSet<u32>>,
    color_table: ArcSwap<ColorTable>,
}

impl PipelineConfig {
    pub fn new(settings: &Settings) -> Self {
        Self {
            confidence_threshold: AtomicU32::new(settings.confidence_threshold.to_bits()),
            max_boxes: AtomicUsize::new(settings.max_boxes),
            min_box_size: AtomicU32::new(settings.min_box_size),
            nth_frame: AtomicU32::new(settings.nth_frame.max(1)),
            target_fps: AtomicU32::new(settings.target_fps.to_bits()),
            tracking_enabled: AtomicBool::new(settings.tracking_enabled),
            color_mode: AtomicU8::new(settings.color_mode.as_u8()),
            omitted_classes: ArcSwap::from_pointee(HashSet::new()),
            color_table: ArcSwap::from_pointee(ColorTable::new(settings.num_classes)),
        }
    }

    pub fn confidence_threshold(&self) -> f32 {
        f32::from_bits(self.confidence_threshold.load(Ordering::Relaxed))
    }

    pub fn set_confidence_threshold(&self, v: f32) {
        self.confidence_threshold
            .store(v.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    pub fn max_boxes(&self) -> usize {
        self.max_boxes.load(Ordering::Relaxed)
    }

    pub fn set_max_boxes(&self, n: usize) {
        self.max_boxes.store(n, Ordering::Relaxed);
    }

    pub fn min_box_size(&self) -> u32 {
        self.min_box_size.load(Ordering::Relaxed)
    }

    pub fn set_min_box_size(&self, n: u32) {
        self.min_box_size.store(n, Ordering::Relaxed);
    }

    pub fn nth_frame(&self) -> u32 {
        self.nth_frame.load(Ordering::Relaxed).max(1)
    }

    pub fn set_nth_frame(&self, n: u32) {
        self.nth_frame.store(n.max(1), Ordering::Relaxed);
    }

    pub fn target_fps(&self) -> f32 {
        f32::from_bits(self.target_fps.load(Ordering::Relaxed))
    }

    pub fn set_target_fps(&self, v: f32) {
        let v = if v > 0.0 { v } else { 1.0 };
        self.target_fps.store(v.to_bits(), Ordering::Relaxed);
    }

    pub fn tracking_enabled(&self) -> bool {
        self.tracking_enabled.load(Ordering::Relaxed)
    }

    pub fn set_tracking_enabled(&self, on: bool) {
        self.tracking_enabled.store(on, Ordering::Relaxed);
    }

    pub fn color_mode(&self) -> ColorMode {
        ColorMode::from_u8(self.color_mode.load(Ordering::Relaxed))
    }

    pub fn set_color_mode(&self, mode: ColorMode) {
        self.color_mode.store(mode.as_u8(), Ordering::Relaxed);
    }

    pub fn omitted_classes(&self) -> Arc<HashSet<u32>> {
        self.omitted_classes.load_full()
    }

    pub fn set_omitted_classes(&self, classes: HashSet<u32>) {
        self.omitted_classes.store(Arc::new(classes));
    }

    pub fn color_table(&self) -> Arc<ColorTable> {
        self.color_table.load_full()
    }

    pub fn set_color_table(&self, table: ColorTable) {
        self.color_table.store(Arc::new(table));
    }
}

/// Startup settings, loaded once from file/env and used to seed the live
/// [`PipelineConfig`] plus the fixed pipeline geometry (batch size, queue
/// capacity) that is not mutable mid-stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub confidence_threshold: f32,
    pub max_boxes: usize,
    pub min_box_size: u32,
    pub nth_frame: u32,
    pub target_fps: f32,
    pub tracking_enabled: bool,
    pub color_mode: ColorMode,
    pub num_classes: usize,

    pub batch_size: usize,
    pub queue_capacity: usize,

    /// Demo source geometry.
    pub width: u32,
    pub height: u32,
    /// Multiplier applied to the demo source geometry at startup.
    pub resolution_scale: f32,
    /// How long the demo binary runs before terminating the pipeline.
    pub run_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            max_boxes: 100,
            min_box_size: 0,
            nth_frame: 1,
            target_fps: 30.0,
            tracking_enabled: false,
            color_mode: ColorMode::Uniform,
            num_classes: 10,
            batch_size: 4,
            queue_capacity: 32,
            width: 640,
            height: 480,
            resolution_scale: 1.0,
            run_secs: 10,
        }
    }
}

impl Settings {
    /// Layer `watchtower.toml` (if present) and `WATCHTOWER_*` env vars over
    /// the defaults.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("watchtower").required(false))
            .add_source(config::Environment::with_prefix("WATCHTOWER"))
            .build()?
            .try_deserialize()
    }

    pub fn scaled_width(&self) -> u32 {
        ((self.width as f32 * self.resolution_scale) as u32).max(16)
    }

    pub fn scaled_height(&self) -> u32 {
        ((self.height as f32 * self.resolution_scale) as u32).max(16)
    }
}
