//! Renders page changes to the log and, optionally, to files.
//!
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use common::protocol::MediaKind;
use image::RgbaImage;

use crate::{
    page::{PageEvent, PageSink},
    render::DetectionRow,
    Error,
};

/// Logs every page change. With an output directory, previews are written as `result.jpg` /
/// `result.mp4` and the live overlay as `live_overlay.png`.
#[derive(Default)]
pub struct LogSink {
    output_dir: Option<PathBuf>,
}

impl LogSink {
    pub fn new(output_dir: Option<PathBuf>) -> Self {
        Self { output_dir }
    }

    fn write_preview(&self, dir: &Path, kind: MediaKind, src: &str) -> Result<PathBuf, Error> {
        let payload = src.strip_prefix(kind.data_uri_prefix()).unwrap_or(src);
        let data = STANDARD.decode(payload)?;
        let path = dir.join(match kind {
            MediaKind::Image => "result.jpg",
            MediaKind::Video => "result.mp4",
        });
        std::fs::write(&path, data)?;
        Ok(path)
    }

    fn write_overlay(&self, dir: &Path, overlay: &RgbaImage) -> Result<PathBuf, Error> {
        let path = dir.join("live_overlay.png");
        overlay.save(&path)?;
        Ok(path)
    }
}

fn log_rows(title: &str, rows: &[DetectionRow]) {
    log::info!("{title}:");
    for row in rows {
        log::info!("  {row}");
    }
}

impl PageSink for LogSink {
    fn on_event(&self, event: PageEvent<'_>) {
        match event {
            PageEvent::Loading(loading) => log::debug!("Loading: {loading}"),
            PageEvent::Error(message) => log::error!("{message}"),
            PageEvent::Preview { kind, src } => {
                if let Some(dir) = &self.output_dir {
                    match self.write_preview(dir, kind, src) {
                        Ok(path) => log::info!("Wrote annotated result to {}", path.display()),
                        Err(err) => log::error!("Unable to write result: {err}"),
                    }
                }
            }
            PageEvent::DetectionInfo(rows) => log_rows("Detections", rows),
            PageEvent::LiveDetections(rows) => log_rows("Live detections", rows),
            PageEvent::LiveOverlay(overlay) => {
                if let Some(dir) = &self.output_dir {
                    if let Err(err) = self.write_overlay(dir, overlay) {
                        log::error!("Unable to write overlay: {err}");
                    }
                }
            }
            PageEvent::Fps(fps) => log::info!("FPS: {fps}"),
        }
    }
}
