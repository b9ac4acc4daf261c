//! Detection client binary.
//!
use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use common::protocol::MediaKind;
use detect_client::{
    config::{CameraConfig, ClientConfig, LiveConfig, DEFAULT_BACKEND_URL, DEFAULT_FONT_PATH},
    controller::ClientController,
    meter::spawn_meter_logger,
    page::Page,
    sensors::V4lDevices,
    sink::LogSink,
};
use env_logger::TimestampPrecision;

#[derive(Parser, Debug)]
#[clap(author, version)]
struct Args {
    /// Base URL of the detection backend
    #[clap(long, default_value = DEFAULT_BACKEND_URL)]
    backend: String,

    /// Video device used for camera capture
    #[clap(long, default_value = "/dev/video0")]
    device: String,

    /// Directory receiving annotated results and live overlays
    #[clap(long)]
    output: Option<PathBuf>,

    /// TrueType font for overlay labels
    #[clap(long, default_value = DEFAULT_FONT_PATH)]
    font: PathBuf,

    /// Ticks per second of the live detection loop
    #[clap(long, default_value_t = 60)]
    refresh_rate: u32,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect objects in an image or video file. Of several paths only the first one is used
    Detect {
        #[clap(required = true)]
        paths: Vec<PathBuf>,

        /// Upload tab to select before submitting
        #[clap(long, value_enum, default_value_t = Tab::Image)]
        media_type: Tab,
    },
    /// Capture a still from the camera and detect objects in it
    Capture {
        /// Time the camera gets to settle before capturing
        #[clap(long, default_value_t = 500)]
        delay_ms: u64,
    },
    /// Run live detection on the camera feed until interrupted
    Live {
        /// Stop after this many seconds
        #[clap(long)]
        seconds: Option<u64>,
    },
    /// Check whether the backend is up and has a model loaded
    Health,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Tab {
    Image,
    Video,
}

impl From<Tab> for MediaKind {
    fn from(tab: Tab) -> Self {
        match tab {
            Tab::Image => MediaKind::Image,
            Tab::Video => MediaKind::Video,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Setup logger
    env_logger::builder()
        .format_timestamp(Some(TimestampPrecision::Millis))
        .init();

    let config = ClientConfig {
        backend_url: args.backend,
        camera: CameraConfig {
            device: args.device,
            ..Default::default()
        },
        live: LiveConfig {
            refresh_rate_hz: args.refresh_rate,
            ..Default::default()
        },
        font_path: Some(args.font),
        ..Default::default()
    };

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)?;
    }

    let sink = Arc::new(LogSink::new(args.output));
    let page = Arc::new(Page::with_sink(config.banner_timeout, sink));
    let devices = Arc::new(V4lDevices::new(config.camera.clone()));
    let mut controller = ClientController::new(&config, page, devices);

    log::info!("Using backend {}", controller.client().backend_url());

    match args.command {
        Command::Detect { paths, media_type } => {
            controller.switch_media_type(media_type.into());
            controller.handle_drop(&paths).await?;
        }
        Command::Capture { delay_ms } => {
            controller.toggle_camera().await?;
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            controller.toggle_camera().await?;
        }
        Command::Live { seconds } => {
            spawn_meter_logger();
            controller.start_live_detection()?;

            match seconds {
                Some(seconds) => tokio::time::sleep(Duration::from_secs(seconds)).await,
                None => tokio::signal::ctrl_c().await?,
            }

            controller.stop_live_detection();
            log::info!("Last FPS: {}", controller.page().snapshot().fps);
        }
        Command::Health => {
            let health = controller.client().health().await?;
            log::info!(
                "Backend status {:?}, model loaded: {}",
                health.status,
                health.model_loaded
            );
        }
    }

    Ok(())
}
