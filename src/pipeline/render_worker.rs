//! Render worker: queue -> post-process -> overlay -> sink, rate-governed.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::PipelineConfig;
use crate::pipeline::queue::FrameQueue;
use crate::pipeline::worker::{LifecycleGate, Worker, WorkerState};
use crate::render::sink::DisplaySink;
use crate::render::{draw_boxes, postprocess};

/// How long one `get` attempt blocks before the consumer re-checks its
/// lifecycle flags. Starvation at this timeout is routine, not an error.
const GET_TIMEOUT: Duration = Duration::from_millis(50);

/// Sliding window length for the FPS estimate.
const FPS_WINDOW: usize = 30;

/// Rolling mean over the last `FPS_WINDOW` iteration durations. Starved
/// iterations never enter the window, so the estimate reflects frames
/// actually presented.
pub(crate) struct FpsWindow {
    durations: VecDeque<Duration>,
    capacity: usize,
}

impl FpsWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            durations: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.durations.len() == self.capacity {
            self.durations.pop_front();
        }
        self.durations.push_back(duration);
    }

    pub fn fps(&self) -> f32 {
        if self.durations.is_empty() {
            return 0.0;
        }
        let total: Duration = self.durations.iter().sum();
        let mean = total.as_secs_f32() / self.durations.len() as f32;
        if mean > 0.0 {
            1.0 / mean
        } else {
            0.0
        }
    }
}

#[derive(Default)]
pub(crate) struct RenderCounters {
    pub frames_presented: AtomicU64,
    pub frames_skipped: AtomicU64,
}

pub struct RenderWorker {
    gate: Arc<LifecycleGate>,
    counters: Arc<RenderCounters>,
    handle: Option<JoinHandle<()>>,
}

impl RenderWorker {
    /// Spawn the worker thread in the `Idle` state; it parks until
    /// `start()`.
    pub fn spawn(
        queue: Arc<FrameQueue>,
        sink: Box<dyn DisplaySink>,
        config: Arc<PipelineConfig>,
    ) -> Self {
        let gate = Arc::new(LifecycleGate::new());
        let counters = Arc::new(RenderCounters::default());

        let loop_gate = Arc::clone(&gate);
        let loop_counters = Arc::clone(&counters);
        let handle = thread::Builder::new()
            .name("render-worker".into())
            .spawn(move || render_loop(loop_gate, loop_counters, queue, sink, config))
            .expect("failed to spawn render worker thread");

        Self {
            gate,
            counters,
            handle: Some(handle),
        }
    }

    pub(crate) fn gate(&self) -> Arc<LifecycleGate> {
        Arc::clone(&self.gate)
    }

    pub(crate) fn counters(&self) -> Arc<RenderCounters> {
        Arc::clone(&self.counters)
    }
}

impl Worker for RenderWorker {
    fn start(&self) {
        self.gate.set_running(true);
    }

    fn pause(&self) {
        self.gate.set_running(false);
    }

    fn resume(&self) {
        self.gate.set_running(true);
    }

    /// Joins the render thread, so after this returns no further frame can
    /// reach the sink and the sink may be torn down.
    fn terminate(&mut self) {
        self.gate.shut_down();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("render worker thread panicked before join");
            }
        }
    }

    fn state(&self) -> WorkerState {
        self.gate.state()
    }
}

impl Drop for RenderWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

fn render_loop(
    gate: Arc<LifecycleGate>,
    counters: Arc<RenderCounters>,
    queue: Arc<FrameQueue>,
    mut sink: Box<dyn DisplaySink>,
    config: Arc<PipelineConfig>,
) {
    info!("render worker started");

    let mut window = FpsWindow::new(FPS_WINDOW);

    while gate.is_alive() {
        if !gate.is_running() {
            gate.wait_while_paused();
            continue;
        }

        let iter_start = Instant::now();

        let Some(packet) = queue.get(GET_TIMEOUT) else {
            // Starvation is routine (paused producer, slow source); retry
            // without touching the FPS window.
            debug!("frame queue empty");
            continue;
        };

        let rendered = postprocess(&packet.result.detections, &config);
        match draw_boxes(&packet.frame, &rendered) {
            Ok(processed) => match sink.present(processed) {
                Ok(()) => {
                    counters.frames_presented.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    warn!(error = %e, sequence = packet.frame.sequence(), "present failed, frame skipped");
                    counters.frames_skipped.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(e) => {
                warn!(error = %e, sequence = packet.frame.sequence(), "overlay failed, frame skipped");
                counters.frames_skipped.fetch_add(1, Ordering::Relaxed);
            }
        }

        // Frame-rate governor: sleep off the remainder of the target
        // period, then fold the full iteration into the FPS window.
        let target_period = Duration::from_secs_f32(1.0 / config.target_fps().max(0.1));
        let elapsed = iter_start.elapsed();
        if elapsed < target_period {
            thread::sleep(target_period - elapsed);
        }

        let iteration = iter_start.elapsed();
        window.record(iteration);
        sink.report_fps(window.fps());
        metrics::histogram!("render_iteration_ms").record(iteration.as_secs_f64() * 1000.0);
    }

    info!("render worker exited");
}
