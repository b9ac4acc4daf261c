//! Live detection on the camera feed.
//!
//! The loop ticks at the display refresh rate. Every n-th tick a snapshot of the current frame is
//! posted to the backend on its own task; answers come back over a channel and are drawn on the
//! overlay canvas. Answers arriving after the session stopped are dropped.
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use common::protocol::{DetectionResult, MediaKind};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{interval, Instant, MissedTickBehavior},
};

use crate::{
    client::DetectClient,
    config::LiveConfig,
    intake::{MediaFile, CAPTURE_FILE_NAME},
    meter::{FrameMeter, METER},
    page::Page,
    render::{encode_jpeg, format_detections, LabelFont, OverlayCanvas, PLACEHOLDER_LIVE},
    video::{SharedFrame, VideoElement, VideoFrames},
    Error,
};

pub const LIVE_CAMERA_ERROR: &str = "Could not access camera for live detection";

/// Everything the loop needs besides the video.
#[derive(Clone)]
pub struct LiveContext {
    pub page: Arc<Page>,
    pub client: DetectClient,
    pub config: LiveConfig,
    pub font: Option<Arc<LabelFont>>,
}

/// Running live detection session. Stopping or dropping it ends the loop and releases the camera.
pub struct LiveDetection {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
    video: Option<VideoElement>,
}

impl LiveDetection {
    pub fn start(video: VideoElement, ctx: LiveContext) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run_live_loop(ctx, video.frames(), running.clone()));

        Self {
            running,
            task,
            video: Some(video),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        self.task.abort();
        if self.video.take().is_some() {
            log::info!("Live detection stopped");
        }
    }
}

impl Drop for LiveDetection {
    fn drop(&mut self) {
        self.stop();
    }
}

struct LiveOutcome {
    /// Dimensions of the frame the detections refer to.
    source: (u32, u32),
    result: DetectionResult,
}

async fn run_live_loop(ctx: LiveContext, mut frames: VideoFrames, running: Arc<AtomicBool>) {
    let (width, height) = match frames.loaded_metadata().await {
        Ok(dimensions) => dimensions,
        Err(err) => {
            log::error!("Live video unavailable: {err}");
            running.store(false, Ordering::Release);
            ctx.page.show_error(LIVE_CAMERA_ERROR);
            return;
        }
    };
    log::info!("Live detection on {width}x{height} video");

    let mut canvas = OverlayCanvas::new(width, height);
    let mut meter = FrameMeter::new(ctx.config.sample_every);
    let (result_tx, mut result_rx) = mpsc::channel(20);

    let start = Instant::now();
    let mut ticker = interval(ctx.config.tick_period());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            now = ticker.tick() => {
                if !running.load(Ordering::Acquire) {
                    break;
                }

                let now_ms = now.duration_since(start).as_secs_f64() * 1000.0;
                let tick = meter.tick(now_ms);
                if let Some(fps) = tick.fps {
                    ctx.page.set_fps(fps);
                }
                if tick.sample {
                    if let Some(frame) = frames.current_frame() {
                        spawn_detection(&ctx, frame, running.clone(), result_tx.clone());
                    }
                }
            }
            Some(outcome) = result_rx.recv() => {
                if !apply_outcome(&ctx, &mut canvas, outcome, &running) {
                    break;
                }
            }
        }
    }
}

/// Post a frame without waiting for the answer.
fn spawn_detection(
    ctx: &LiveContext,
    frame: SharedFrame,
    running: Arc<AtomicBool>,
    result_tx: mpsc::Sender<LiveOutcome>,
) {
    let client = ctx.client.clone();
    let quality = ctx.config.jpeg_quality;

    tokio::spawn(async move {
        if !running.load(Ordering::Acquire) {
            return;
        }

        let source = frame.dimensions();
        let jpeg = match encode_jpeg(&frame, quality) {
            Ok(jpeg) => jpeg,
            Err(err) => {
                log::error!("Live detection error: {err}");
                return;
            }
        };
        let file = MediaFile::new(CAPTURE_FILE_NAME, "image/jpeg", jpeg);

        METER.tick_sent();
        match client.detect(MediaKind::Image, &file).await {
            Ok(result) => {
                METER.tick_answered();
                if running.load(Ordering::Acquire) {
                    result_tx.send(LiveOutcome { source, result }).await.ok();
                } else {
                    METER.tick_discarded();
                    log::debug!("Discarding detections of stopped live session");
                }
            }
            Err(Error::Status(status)) => log::debug!("Live detection rejected: {status}"),
            Err(err) => log::error!("Live detection error: {err}"),
        }
    });
}

/// Draw an answer on the overlay and refresh the detection list. Returns `false` without touching
/// the page once the session is stopped, which may happen while the overlay is being drawn.
fn apply_outcome(
    ctx: &LiveContext,
    canvas: &mut OverlayCanvas,
    outcome: LiveOutcome,
    running: &AtomicBool,
) -> bool {
    let LiveOutcome { source, result } = outcome;
    let is_running = || running.load(Ordering::Acquire);

    // A failed detection keeps the previous boxes but still refreshes the list
    if result.success {
        canvas.draw_detections(&result.detections, source, ctx.font.as_deref());
        if !is_running() {
            METER.tick_discarded();
            return false;
        }
        ctx.page.draw_live_overlay(canvas.image());
    }

    let rows = format_detections(&result.detections, PLACEHOLDER_LIVE);
    if !is_running() {
        METER.tick_discarded();
        return false;
    }
    ctx.page.set_live_detections(rows);
    true
}
