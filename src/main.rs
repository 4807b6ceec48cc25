//! Watchtower demo: synthetic source, stub detector, logging sink.

use std::thread;
use std::time::Duration;

use color_eyre::Result;
use tracing::info;

use watchtower::capture::SyntheticSource;
use watchtower::detect::{CentroidTracker, MovingBoxDetector};
use watchtower::render::LogSink;
use watchtower::{CaptureSource, PipelineController, Settings};

fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter("watchtower=debug")
        .with_timer(tracing_subscriber::fmt::time::uptime())
        .init();

    info!("Watchtower launching...");

    let settings = Settings::load()?;
    let source = SyntheticSource::new(
        settings.scaled_width(),
        settings.scaled_height(),
        settings.target_fps,
    );
    info!(native_fps = source.native_fps(), "source configured");

    let mut controller = PipelineController::setup(
        Box::new(source),
        Box::new(MovingBoxDetector::default()),
        Some(Box::new(CentroidTracker::default())),
        Box::new(LogSink::new(30)),
        &settings,
    )?;

    controller.start();

    thread::sleep(Duration::from_secs(settings.run_secs));

    let stats = controller.stats();
    info!(
        frames_read = stats.frames_read,
        frames_presented = stats.frames_presented,
        batches_dropped = stats.batches_dropped,
        queue_put_timeouts = stats.queue.put_timeouts,
        "run complete"
    );

    controller.terminate();
    info!("Watchtower shutting down");
    Ok(())
}
