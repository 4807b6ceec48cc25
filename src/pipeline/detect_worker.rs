//! Detection worker: capture -> batch -> inference -> queue.
//!
//! Exclusive owner of the capture source, the detector and the tracker. The
//! capture handle is released on this thread's exit path, never from
//! outside; the controller only observes that via join.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::capture::{CaptureSource, Frame};
use crate::config::PipelineConfig;
use crate::detect::{DetectionResult, Detector, ObjectTracker};
use crate::pipeline::queue::{FramePacket, FrameQueue};
use crate::pipeline::worker::{LifecycleGate, Worker, WorkerState};

/// How long one `put` attempt blocks before the producer re-checks its
/// lifecycle flags and retries. Backpressure policy is stall, never drop.
const PUT_TIMEOUT: Duration = Duration::from_millis(50);

/// Breather after a capture gap so an ended stream does not spin the loop.
const CAPTURE_GAP_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Default)]
pub(crate) struct DetectCounters {
    pub frames_read: AtomicU64,
    pub frames_enqueued: AtomicU64,
    pub batches_dropped: AtomicU64,
}

pub struct DetectionWorker {
    gate: Arc<LifecycleGate>,
    counters: Arc<DetectCounters>,
    handle: Option<JoinHandle<()>>,
}

impl DetectionWorker {
    /// Spawn the worker thread in the `Idle` state; it parks until
    /// `start()`.
    pub fn spawn(
        source: Box<dyn CaptureSource>,
        detector: Box<dyn Detector>,
        tracker: Option<Box<dyn ObjectTracker>>,
        queue: Arc<FrameQueue>,
        config: Arc<PipelineConfig>,
        batch_size: usize,
    ) -> Self {
        let gate = Arc::new(LifecycleGate::new());
        let counters = Arc::new(DetectCounters::default());

        let loop_gate = Arc::clone(&gate);
        let loop_counters = Arc::clone(&counters);
        let handle = thread::Builder::new()
            .name("detect-worker".into())
            .spawn(move || {
                detect_loop(
                    loop_gate,
                    loop_counters,
                    source,
                    detector,
                    tracker,
                    queue,
                    config,
                    batch_size.max(1),
                );
            })
            .expect("failed to spawn detection worker thread");

        Self {
            gate,
            counters,
            handle: Some(handle),
        }
    }

    pub(crate) fn gate(&self) -> Arc<LifecycleGate> {
        Arc::clone(&self.gate)
    }

    pub(crate) fn counters(&self) -> Arc<DetectCounters> {
        Arc::clone(&self.counters)
    }
}

impl Worker for DetectionWorker {
    fn start(&self) {
        self.gate.set_running(true);
    }

    fn pause(&self) {
        self.gate.set_running(false);
    }

    fn resume(&self) {
        self.gate.set_running(true);
    }

    fn terminate(&mut self) {
        self.gate.shut_down();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("detection worker thread panicked before join");
            }
        }
    }

    fn state(&self) -> WorkerState {
        self.gate.state()
    }
}

impl Drop for DetectionWorker {
    fn drop(&mut self) {
        self.terminate();
    }
}

#[allow(clippy::too_many_arguments)]
fn detect_loop(
    gate: Arc<LifecycleGate>,
    counters: Arc<DetectCounters>,
    mut source: Box<dyn CaptureSource>,
    mut detector: Box<dyn Detector>,
    mut tracker: Option<Box<dyn ObjectTracker>>,
    queue: Arc<FrameQueue>,
    config: Arc<PipelineConfig>,
    batch_size: usize,
) {
    info!(batch_size, "detection worker started");

    let mut batch: Vec<Frame> = Vec::with_capacity(batch_size);
    let mut read_index: u64 = 0;

    while gate.is_alive() {
        if !gate.is_running() {
            // Drain the partial batch before going dormant so the trailing
            // frames are never silently lost.
            flush_batch(
                &gate, &counters, &mut batch, &mut detector, &mut tracker, &queue, &config,
            );
            gate.wait_while_paused();
            continue;
        }

        match source.read_frame() {
            Some(frame) => {
                read_index += 1;
                counters.frames_read.fetch_add(1, Ordering::Relaxed);

                // Process every Nth captured frame; the rest are read and
                // discarded so the capture cursor keeps advancing.
                let nth = config.nth_frame() as u64;
                if (read_index - 1) % nth != 0 {
                    continue;
                }

                batch.push(frame);
                if batch.len() >= batch_size {
                    flush_batch(
                        &gate, &counters, &mut batch, &mut detector, &mut tracker, &queue, &config,
                    );
                }
            }
            None => {
                // Capture gap ends this batch cycle, not the worker.
                flush_batch(
                    &gate, &counters, &mut batch, &mut detector, &mut tracker, &queue, &config,
                );
                thread::sleep(CAPTURE_GAP_BACKOFF);
            }
        }
    }

    match source.release() {
        Ok(()) => info!("detection worker exited, capture source released"),
        Err(e) => warn!(error = %e, "capture source release failed on exit"),
    }
}

/// Run inference on the accumulated batch and enqueue one packet per frame,
/// in input order. Inference failures drop the batch and the loop carries
/// on; the next batch starts clean.
fn flush_batch(
    gate: &LifecycleGate,
    counters: &DetectCounters,
    batch: &mut Vec<Frame>,
    detector: &mut Box<dyn Detector>,
    tracker: &mut Option<Box<dyn ObjectTracker>>,
    queue: &FrameQueue,
    config: &PipelineConfig,
) {
    if batch.is_empty() {
        return;
    }

    let frames = std::mem::take(batch);
    let results = match detector.infer(&frames, config.confidence_threshold()) {
        Ok(results) if results.len() == frames.len() => results,
        Ok(results) => {
            warn!(
                got = results.len(),
                expected = frames.len(),
                "detector returned wrong result count, dropping batch"
            );
            counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("detect_batches_dropped").increment(1);
            return;
        }
        Err(e) => {
            warn!(error = %e, "inference failed, dropping batch");
            counters.batches_dropped.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("detect_batches_dropped").increment(1);
            return;
        }
    };

    for (frame, detections) in frames.into_iter().zip(results) {
        let detections = match tracker {
            Some(tracker) if config.tracking_enabled() => tracker.update(&detections, &frame),
            _ => detections,
        };

        let mut packet = FramePacket {
            result: DetectionResult {
                sequence: frame.sequence(),
                detections,
            },
            frame,
        };

        // Stall-with-retry on a full queue. Stalling preserves capture
        // order; only termination abandons the packet.
        loop {
            match queue.put(packet, PUT_TIMEOUT) {
                Ok(()) => {
                    counters.frames_enqueued.fetch_add(1, Ordering::Relaxed);
                    metrics::histogram!("frame_queue_depth").record(queue.len() as f64);
                    break;
                }
                Err(returned) => {
                    if !gate.is_alive() {
                        debug!("terminating with a full queue, abandoning packet");
                        return;
                    }
                    debug!(
                        sequence = returned.frame.sequence(),
                        "frame queue full, retrying"
                    );
                    packet = returned;
                }
            }
        }
    }
}
