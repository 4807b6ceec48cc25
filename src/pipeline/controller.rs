//! Pipeline controller: the single façade the surrounding GUI talks to.
//!
//! Owns both workers and the shared configuration. Worker delegation runs
//! in a fixed order: on start the detection worker resumes before the
//! render worker, so the queue begins filling before the consumer polls;
//! on terminate both loops stop, the capture handle is released on the
//! detection thread's exit path, and both threads are joined, in that
//! order, so nothing can touch a released handle.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use crate::capture::CaptureSource;
use crate::config::{ColorMode, ColorTable, PipelineConfig, Settings};
use crate::detect::{Detector, ObjectTracker};
use crate::error::PipelineError;
use crate::pipeline::detect_worker::DetectionWorker;
use crate::pipeline::queue::{FrameQueue, QueueStats};
use crate::pipeline::render_worker::RenderWorker;
use crate::pipeline::worker::{Worker, WorkerState};
use crate::render::sink::DisplaySink;

/// Coalescing window for bursts of resize events.
const RESIZE_DEBOUNCE: Duration = Duration::from_millis(300);

/// Which workers the resize path itself paused and therefore owes a resume.
/// Survives across the events of one burst; cleared by the timer that
/// finally resumes them.
#[derive(Default)]
struct ResizeIntent {
    detection: AtomicBool,
    render: AtomicBool,
}

/// Rolling pipeline counters, aggregated across the queue and both workers.
#[derive(Debug, Clone, Copy)]
pub struct PipelineStats {
    pub queue: QueueStats,
    pub frames_read: u64,
    pub frames_enqueued: u64,
    pub batches_dropped: u64,
    pub frames_presented: u64,
    pub frames_skipped: u64,
}

pub struct PipelineController {
    config: Arc<PipelineConfig>,
    queue: Arc<FrameQueue>,
    detection: DetectionWorker,
    render: RenderWorker,
    resize_generation: Arc<AtomicU64>,
    resize_intent: Arc<ResizeIntent>,
    terminated: bool,
}

impl PipelineController {
    /// Open the source and bring up both workers (idle, parked) around a
    /// fresh queue. A source that fails to open is the one fatal setup
    /// error; it propagates and the pipeline never starts.
    pub fn setup(
        mut source: Box<dyn CaptureSource>,
        detector: Box<dyn Detector>,
        tracker: Option<Box<dyn ObjectTracker>>,
        sink: Box<dyn DisplaySink>,
        settings: &Settings,
    ) -> Result<Self, PipelineError> {
        source.open()?;

        let config = Arc::new(PipelineConfig::new(settings));
        let queue = Arc::new(FrameQueue::new(settings.queue_capacity));

        let detection = DetectionWorker::spawn(
            source,
            detector,
            tracker,
            Arc::clone(&queue),
            Arc::clone(&config),
            settings.batch_size,
        );
        let render = RenderWorker::spawn(Arc::clone(&queue), sink, Arc::clone(&config));

        info!(
            queue_capacity = queue.capacity(),
            batch_size = settings.batch_size,
            "pipeline set up"
        );

        Ok(Self {
            config,
            queue,
            detection,
            render,
            resize_generation: Arc::new(AtomicU64::new(0)),
            resize_intent: Arc::new(ResizeIntent::default()),
            terminated: false,
        })
    }

    /// Start (or restart) both workers, producer first.
    pub fn start(&self) {
        self.detection.start();
        self.render.start();
        info!("pipeline started");
    }

    /// Pause both workers. Frames already queued stay queued and are
    /// presented, in order, after `resume`.
    pub fn pause(&self) {
        self.detection.pause();
        self.render.pause();
        info!("pipeline paused");
    }

    /// Resume both workers, producer first.
    pub fn resume(&self) {
        self.detection.resume();
        self.render.resume();
        info!("pipeline resumed");
    }

    /// Tear the pipeline down. Idempotent: terminating an already
    /// terminated pipeline is a no-op. After this returns the capture
    /// handle is released and no further frames reach the sink.
    pub fn terminate(&mut self) {
        if self.terminated {
            debug!("terminate called on terminated pipeline, ignoring");
            return;
        }
        self.detection.pause();
        self.render.pause();
        self.detection.terminate();
        self.render.terminate();
        self.terminated = true;
        info!("pipeline terminated");
    }

    /// Whether both workers are currently dormant.
    pub fn is_stopped(&self) -> bool {
        self.detection.is_stopped() && self.render.is_stopped()
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Display-size-change coordination: pause both workers and resume them
    /// a debounce window after the last event of the burst. Every event,
    /// including one arriving while the workers are already resize-paused,
    /// restarts the window, so a long interactive resize holds the pipeline
    /// paused throughout. Workers the user had already paused stay paused.
    pub fn notify_resized(&self) {
        if self.detection.state() == WorkerState::Running {
            self.resize_intent.detection.store(true, Ordering::SeqCst);
            self.detection.pause();
        }
        if self.render.state() == WorkerState::Running {
            self.resize_intent.render.store(true, Ordering::SeqCst);
            self.render.pause();
        }
        if !self.resize_intent.detection.load(Ordering::SeqCst)
            && !self.resize_intent.render.load(Ordering::SeqCst)
        {
            // User-paused pipeline; no resume is owed.
            return;
        }

        let generation = self.resize_generation.fetch_add(1, Ordering::SeqCst) + 1;
        let generation_ref = Arc::clone(&self.resize_generation);
        let intent = Arc::clone(&self.resize_intent);
        let detection_gate = self.detection.gate();
        let render_gate = self.render.gate();

        thread::spawn(move || {
            thread::sleep(RESIZE_DEBOUNCE);
            // A newer resize event owns the resume now.
            if generation_ref.load(Ordering::SeqCst) != generation {
                return;
            }
            debug!("resize debounce elapsed, resuming workers");
            if intent.detection.swap(false, Ordering::SeqCst) {
                detection_gate.set_running(true);
            }
            if intent.render.swap(false, Ordering::SeqCst) {
                render_gate.set_running(true);
            }
        });
    }

    // Configuration setters: each is a single-field, non-blocking write.
    // Workers pick the new value up on their next iteration.

    pub fn set_confidence_threshold(&self, v: f32) {
        self.config.set_confidence_threshold(v);
    }

    pub fn set_max_boxes(&self, n: usize) {
        self.config.set_max_boxes(n);
    }

    pub fn set_min_box_size(&self, n: u32) {
        self.config.set_min_box_size(n);
    }

    pub fn set_nth_frame(&self, n: u32) {
        self.config.set_nth_frame(n);
    }

    pub fn set_omitted_classes(&self, classes: HashSet<u32>) {
        self.config.set_omitted_classes(classes);
    }

    pub fn set_tracking_enabled(&self, on: bool) {
        self.config.set_tracking_enabled(on);
    }

    pub fn set_color_mode(&self, mode: ColorMode) {
        self.config.set_color_mode(mode);
    }

    pub fn set_color_table(&self, table: ColorTable) {
        self.config.set_color_table(table);
    }

    pub fn set_target_fps(&self, v: f32) {
        self.config.set_target_fps(v);
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn stats(&self) -> PipelineStats {
        let detect = self.detection.counters();
        let render = self.render.counters();
        PipelineStats {
            queue: self.queue.stats(),
            frames_read: detect.frames_read.load(Ordering::Relaxed),
            frames_enqueued: detect.frames_enqueued.load(Ordering::Relaxed),
            batches_dropped: detect.batches_dropped.load(Ordering::Relaxed),
            frames_presented: render.frames_presented.load(Ordering::Relaxed),
            frames_skipped: render.frames_skipped.load(Ordering::Relaxed),
        }
    }
}

impl Drop for PipelineController {
    fn drop(&mut self) {
        self.terminate();
    }
}
