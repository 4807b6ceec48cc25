//! End-to-end pipeline tests over mock source, detector and sink.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;

use watchtower::capture::{CaptureSource, Frame, FrameMetadata, PixelFormat};
use watchtower::detect::{BoundingBox, Detection, Detector};
use watchtower::pipeline::{DetectionWorker, FrameQueue, Worker};
use watchtower::render::{DisplaySink, ProcessedFrame};
use watchtower::{PipelineConfig, PipelineController, PipelineError, Settings};

const W: u32 = 8;
const H: u32 = 8;

fn make_frame(sequence: u64) -> Frame {
    Frame {
        data: Bytes::from(vec![0u8; (W * H * 3) as usize]),
        meta: Arc::new(FrameMetadata {
            sequence,
            width: W,
            height: H,
            format: PixelFormat::Rgb24,
        }),
        timestamp: Instant::now(),
    }
}

/// Source that serves `fast_frames` immediately, then keeps serving at
/// `slow_interval` (or returns `None` forever if `limit` is reached).
struct ScriptedSource {
    sequence: u64,
    fast_frames: u64,
    limit: Option<u64>,
    slow_interval: Duration,
    opened: bool,
    fail_open: bool,
    fail_release: bool,
    served: Arc<AtomicU64>,
    released: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn new(fast_frames: u64, limit: Option<u64>, slow_interval: Duration) -> Self {
        Self {
            sequence: 0,
            fast_frames,
            limit,
            slow_interval,
            opened: false,
            fail_open: false,
            fail_release: false,
            served: Arc::new(AtomicU64::new(0)),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn served(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.served)
    }

    fn released(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.released)
    }
}

impl CaptureSource for ScriptedSource {
    fn open(&mut self) -> Result<(), PipelineError> {
        if self.fail_open {
            return Err(PipelineError::SourceOpen {
                identifier: "scripted".into(),
                reason: "scripted failure".into(),
            });
        }
        self.opened = true;
        Ok(())
    }

    fn read_frame(&mut self) -> Option<Frame> {
        assert!(self.opened, "read before open");
        if let Some(limit) = self.limit {
            if self.sequence >= limit {
                return None;
            }
        }
        if self.sequence >= self.fast_frames {
            thread::sleep(self.slow_interval);
        }
        self.sequence += 1;
        self.served.fetch_add(1, Ordering::SeqCst);
        Some(make_frame(self.sequence))
    }

    fn release(&mut self) -> Result<(), PipelineError> {
        self.opened = false;
        self.released.fetch_add(1, Ordering::SeqCst);
        if self.fail_release {
            return Err(PipelineError::SourceRelease("scripted failure".into()));
        }
        Ok(())
    }
}

/// Detector returning one fixed detection per frame, recording batch sizes.
struct RecordingDetector {
    batches: Arc<Mutex<Vec<usize>>>,
}

impl RecordingDetector {
    fn new() -> Self {
        Self {
            batches: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn batches(&self) -> Arc<Mutex<Vec<usize>>> {
        Arc::clone(&self.batches)
    }
}

impl Detector for RecordingDetector {
    fn infer(
        &mut self,
        batch: &[Frame],
        _confidence_floor: f32,
    ) -> Result<Vec<Vec<Detection>>, PipelineError> {
        self.batches.lock().unwrap().push(batch.len());
        Ok(batch
            .iter()
            .map(|_| vec![Detection::new(BoundingBox::new(1.0, 1.0, 5.0, 5.0), 0.9, 0)])
            .collect())
    }
}

/// Detector that fails its first `failures_left` infer calls, then behaves
/// like [`RecordingDetector`].
struct FlakyDetector {
    failures_left: usize,
}

impl Detector for FlakyDetector {
    fn infer(
        &mut self,
        batch: &[Frame],
        _confidence_floor: f32,
    ) -> Result<Vec<Vec<Detection>>, PipelineError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(PipelineError::Inference("scripted failure".into()));
        }
        Ok(batch
            .iter()
            .map(|_| vec![Detection::new(BoundingBox::new(1.0, 1.0, 5.0, 5.0), 0.9, 0)])
            .collect())
    }
}

/// Sink recording presented sequence numbers.
struct CollectingSink {
    sequences: Arc<Mutex<Vec<u64>>>,
}

impl CollectingSink {
    fn new() -> Self {
        Self {
            sequences: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn sequences(&self) -> Arc<Mutex<Vec<u64>>> {
        Arc::clone(&self.sequences)
    }
}

impl DisplaySink for CollectingSink {
    fn present(&mut self, frame: ProcessedFrame) -> Result<(), PipelineError> {
        self.sequences.lock().unwrap().push(frame.sequence());
        Ok(())
    }

    fn report_fps(&mut self, _fps: f32) {}
}

/// Sink that fails its first `failures_left` presents, then records like
/// [`CollectingSink`].
struct FlakySink {
    failures_left: usize,
    sequences: Arc<Mutex<Vec<u64>>>,
}

impl FlakySink {
    fn new(failures_left: usize) -> Self {
        Self {
            failures_left,
            sequences: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn sequences(&self) -> Arc<Mutex<Vec<u64>>> {
        Arc::clone(&self.sequences)
    }
}

impl DisplaySink for FlakySink {
    fn present(&mut self, frame: ProcessedFrame) -> Result<(), PipelineError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(PipelineError::Render("scripted present failure".into()));
        }
        self.sequences.lock().unwrap().push(frame.sequence());
        Ok(())
    }

    fn report_fps(&mut self, _fps: f32) {}
}

fn settings() -> Settings {
    Settings {
        queue_capacity: 64,
        batch_size: 4,
        target_fps: 500.0,
        confidence_threshold: 0.5,
        ..Settings::default()
    }
}

fn wait_for(mut cond: impl FnMut() -> bool, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    cond()
}

#[test]
fn frames_are_presented_in_capture_order_without_loss() {
    let source = ScriptedSource::new(40, Some(40), Duration::ZERO);
    let sink = CollectingSink::new();
    let sequences = sink.sequences();

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(sink),
        &settings(),
    )
    .unwrap();
    controller.start();

    assert!(
        wait_for(|| sequences.lock().unwrap().len() == 40, Duration::from_secs(5)),
        "expected 40 presented frames, got {}",
        sequences.lock().unwrap().len()
    );
    controller.terminate();

    let seen = sequences.lock().unwrap().clone();
    let expected: Vec<u64> = (1..=40).collect();
    assert_eq!(seen, expected);
}

#[test]
fn setup_fails_when_source_cannot_open() {
    let mut source = ScriptedSource::new(0, Some(0), Duration::ZERO);
    source.fail_open = true;

    let result = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(CollectingSink::new()),
        &settings(),
    );
    assert!(matches!(result, Err(PipelineError::SourceOpen { .. })));
}

#[test]
fn pause_stops_presentation_and_resume_continues_in_order() {
    let source = ScriptedSource::new(0, None, Duration::from_millis(5));
    let sink = CollectingSink::new();
    let sequences = sink.sequences();

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(sink),
        &settings(),
    )
    .unwrap();
    controller.start();

    assert!(wait_for(
        || sequences.lock().unwrap().len() >= 5,
        Duration::from_secs(5)
    ));

    controller.pause();
    // Let in-flight iterations drain, then check presentation has stopped.
    thread::sleep(Duration::from_millis(200));
    let at_pause = sequences.lock().unwrap().len();
    thread::sleep(Duration::from_millis(250));
    assert_eq!(
        sequences.lock().unwrap().len(),
        at_pause,
        "frames were presented while paused"
    );
    assert!(controller.is_stopped());

    controller.resume();
    assert!(wait_for(
        || sequences.lock().unwrap().len() > at_pause,
        Duration::from_secs(5)
    ));
    controller.terminate();

    let seen = sequences.lock().unwrap().clone();
    for pair in seen.windows(2) {
        assert!(pair[0] < pair[1], "out-of-order presentation: {seen:?}");
    }
}

#[test]
fn terminate_is_idempotent_and_releases_source_once() {
    let source = ScriptedSource::new(0, None, Duration::from_millis(5));
    let released = source.released();

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(CollectingSink::new()),
        &settings(),
    )
    .unwrap();
    controller.start();
    thread::sleep(Duration::from_millis(50));

    controller.terminate();
    assert_eq!(released.load(Ordering::SeqCst), 1);
    controller.terminate();
    assert_eq!(released.load(Ordering::SeqCst), 1);
    assert!(controller.is_terminated());
}

#[test]
fn pause_flushes_partial_batch() {
    // Two frames arrive immediately; the rest trickle in slowly. With a
    // batch size of 8 the batch can only leave via the pause-drain path.
    let source = ScriptedSource::new(2, None, Duration::from_millis(50));
    let served = source.served();
    let detector = RecordingDetector::new();
    let batches = detector.batches();

    let mut config = settings();
    config.batch_size = 8;

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(detector),
        None,
        Box::new(CollectingSink::new()),
        &config,
    )
    .unwrap();
    controller.start();

    assert!(wait_for(
        || served.load(Ordering::SeqCst) >= 2,
        Duration::from_secs(5)
    ));
    controller.pause();
    thread::sleep(Duration::from_millis(300));

    let flushed: usize = batches.lock().unwrap().iter().sum();
    assert_eq!(
        flushed as u64,
        served.load(Ordering::SeqCst),
        "accumulated frames were not submitted for inference on pause"
    );
    assert!(
        batches.lock().unwrap().iter().all(|&b| b < 8),
        "expected only partial batches"
    );
    controller.terminate();
}

#[test]
fn rapid_resize_events_extend_the_debounce_window() {
    let source = ScriptedSource::new(0, None, Duration::from_millis(5));
    let sink = CollectingSink::new();
    let sequences = sink.sequences();

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(sink),
        &settings(),
    )
    .unwrap();
    controller.start();
    assert!(wait_for(
        || !sequences.lock().unwrap().is_empty(),
        Duration::from_secs(5)
    ));

    controller.notify_resized();
    thread::sleep(Duration::from_millis(150));
    controller.notify_resized();
    thread::sleep(Duration::from_millis(200));
    // 350ms after the first event but only 200ms after the second: the
    // window restarted, so the workers must still be paused.
    assert!(
        controller.is_stopped(),
        "workers resumed before the resize burst settled"
    );

    // Once the burst is over the last event's window elapses and the
    // pipeline comes back on its own.
    assert!(
        wait_for(|| !controller.is_stopped(), Duration::from_secs(2)),
        "workers never resumed after the debounce window"
    );
    let before = sequences.lock().unwrap().len();
    assert!(wait_for(
        || sequences.lock().unwrap().len() > before,
        Duration::from_secs(5)
    ));
    controller.terminate();
}

#[test]
fn resize_during_user_pause_leaves_workers_paused() {
    let source = ScriptedSource::new(0, None, Duration::from_millis(5));

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(CollectingSink::new()),
        &settings(),
    )
    .unwrap();
    controller.start();
    thread::sleep(Duration::from_millis(50));
    controller.pause();

    controller.notify_resized();
    thread::sleep(Duration::from_millis(400));
    assert!(
        controller.is_stopped(),
        "resize resumed a user-paused pipeline"
    );
    controller.terminate();
}

#[test]
fn terminate_completes_when_source_release_fails() {
    let mut source = ScriptedSource::new(0, None, Duration::from_millis(5));
    source.fail_release = true;
    let released = source.released();

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(CollectingSink::new()),
        &settings(),
    )
    .unwrap();
    controller.start();
    thread::sleep(Duration::from_millis(50));

    controller.terminate();
    assert!(controller.is_terminated());
    assert_eq!(released.load(Ordering::SeqCst), 1);
    // Still idempotent: the failed release is not retried.
    controller.terminate();
    assert_eq!(released.load(Ordering::SeqCst), 1);
}

#[test]
fn inference_failure_drops_one_batch_and_the_loop_continues() {
    // 40 frames, batch size 4; the first infer call fails, so frames 1-4
    // are dropped and everything after flows through.
    let source = ScriptedSource::new(40, Some(40), Duration::ZERO);
    let sink = CollectingSink::new();
    let sequences = sink.sequences();

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(FlakyDetector { failures_left: 1 }),
        None,
        Box::new(sink),
        &settings(),
    )
    .unwrap();
    controller.start();

    assert!(
        wait_for(|| sequences.lock().unwrap().len() == 36, Duration::from_secs(5)),
        "expected 36 presented frames, got {}",
        sequences.lock().unwrap().len()
    );
    assert_eq!(controller.stats().batches_dropped, 1);
    controller.terminate();

    let seen = sequences.lock().unwrap().clone();
    let expected: Vec<u64> = (5..=40).collect();
    assert_eq!(seen, expected);
}

#[test]
fn present_failure_skips_one_frame_and_the_loop_continues() {
    let source = ScriptedSource::new(10, Some(10), Duration::ZERO);
    let sink = FlakySink::new(1);
    let sequences = sink.sequences();

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(RecordingDetector::new()),
        None,
        Box::new(sink),
        &settings(),
    )
    .unwrap();
    controller.start();

    assert!(
        wait_for(|| sequences.lock().unwrap().len() == 9, Duration::from_secs(5)),
        "expected 9 presented frames, got {}",
        sequences.lock().unwrap().len()
    );
    let stats = controller.stats();
    assert_eq!(stats.frames_skipped, 1);
    assert_eq!(stats.frames_presented, 9);
    controller.terminate();

    let seen = sequences.lock().unwrap().clone();
    let expected: Vec<u64> = (2..=10).collect();
    assert_eq!(seen, expected);
}

#[test]
fn full_queue_stalls_producer_without_unbounded_growth() {
    // Producer only: no consumer drains the queue.
    let source = ScriptedSource::new(0, None, Duration::from_millis(1));
    let served = source.served();
    let mut boxed: Box<dyn CaptureSource> = Box::new(source);
    boxed.open().unwrap();

    let queue = Arc::new(FrameQueue::new(4));
    let config = Arc::new(PipelineConfig::new(&settings()));
    let mut worker = DetectionWorker::spawn(
        boxed,
        Box::new(RecordingDetector::new()),
        None,
        Arc::clone(&queue),
        config,
        1,
    );
    worker.start();

    thread::sleep(Duration::from_millis(400));
    assert_eq!(queue.len(), queue.capacity());
    assert!(queue.stats().put_timeouts > 0, "producer never stalled");
    // Reads stop once the queue backs up: capacity plus the stalled packet
    // and at most one frame still in the batch buffer.
    assert!(
        served.load(Ordering::SeqCst) <= (queue.capacity() + 2) as u64,
        "producer out-ran backpressure: {} frames read",
        served.load(Ordering::SeqCst)
    );

    // Terminate must unwedge the stalled put.
    worker.terminate();
}
