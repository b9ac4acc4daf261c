//! Sensors module.
//!
//! Camera access is modelled after media streams: [`MediaDevices`] hands out a [`CameraStream`]
//! which owns its video track and stops it when dropped.
use image::{ImageFormat, RgbImage};
use rscam::{Camera, Config};

use crate::{config::CameraConfig, Error};

/// Source of video frames.
pub trait Track: Send {
    /// Capture the next frame. Blocks until one is available.
    fn capture(&mut self) -> Option<RgbImage>;

    /// Release the underlying device. Called at most once.
    fn stop(&mut self);
}

/// Acquired camera, released on drop.
pub struct CameraStream {
    track: Box<dyn Track>,
    stopped: bool,
}

impl CameraStream {
    pub fn new(track: Box<dyn Track>) -> Self {
        Self {
            track,
            stopped: false,
        }
    }

    /// Capture a frame, `None` once the stream is stopped.
    pub fn capture(&mut self) -> Option<RgbImage> {
        if self.stopped {
            return None;
        }
        self.track.capture()
    }

    pub fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.track.stop();
        }
    }
}

impl Drop for CameraStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Grants access to cameras.
pub trait MediaDevices: Send + Sync {
    fn get_user_media(&self) -> Result<CameraStream, Error>;
}

/// Video4Linux cameras.
pub struct V4lDevices {
    config: CameraConfig,
}

impl V4lDevices {
    pub fn new(config: CameraConfig) -> Self {
        Self { config }
    }
}

impl MediaDevices for V4lDevices {
    fn get_user_media(&self) -> Result<CameraStream, Error> {
        let track = V4lTrack::open(&self.config)?;
        Ok(CameraStream::new(Box::new(track)))
    }
}

struct V4lTrack {
    cam: Option<Camera>,
    format: [u8; 4],
}

impl V4lTrack {
    fn open(config: &CameraConfig) -> Result<Self, Error> {
        let mut cam = Camera::new(&config.device)?;
        log_supported_formats(&cam, &config.format);

        let format: [u8; 4] = config
            .format
            .as_bytes()
            .try_into()
            .map_err(|_| Error::Camera(format!("invalid pixel format {:?}", &config.format)))?;

        log::info!("Using camera {}", &config.device);

        let resolution = config
            .resolution
            .map(Ok)
            .unwrap_or_else(|| get_max_resolution(&cam, &format))?;

        let frame_rate = config
            .frame_rate
            .map(Ok)
            .unwrap_or_else(|| get_max_frame_rate(&cam, &format, resolution))?;

        cam.start(&Config {
            interval: frame_rate,
            resolution,
            format: &format,
            ..Default::default()
        })?;

        Ok(Self {
            cam: Some(cam),
            format,
        })
    }
}

impl Track for V4lTrack {
    fn capture(&mut self) -> Option<RgbImage> {
        let frame = match self.cam.as_ref()?.capture() {
            Ok(frame) => frame,
            Err(err) => {
                log::error!("Error capturing frame: {err}");
                return None;
            }
        };
        let (width, height) = frame.resolution;

        match &self.format {
            b"MJPG" => image::load_from_memory_with_format(&frame[..], ImageFormat::Jpeg)
                .map(|image| image.to_rgb8())
                .map_err(|err| log::warn!("Dropping undecodable frame: {err}"))
                .ok(),
            b"RGB3" => RgbImage::from_raw(width, height, frame[..].to_vec()),
            other => {
                log::error!("Unsupported pixel format {:?}", String::from_utf8_lossy(other));
                None
            }
        }
    }

    fn stop(&mut self) {
        if let Some(mut cam) = self.cam.take() {
            if let Err(err) = cam.stop() {
                log::warn!("Error stopping camera: {err}");
            }
            log::info!("Camera released");
        }
    }
}

/// Get the maximum supported resolution for the given format.
fn get_max_resolution(cam: &Camera, format: &[u8]) -> Result<(u32, u32), Error> {
    let resolution_info = cam.resolutions(format)?;
    log::debug!("Found resolutions: {:?}", &resolution_info);
    match resolution_info {
        rscam::ResolutionInfo::Discretes(resolutions) => resolutions
            .iter()
            // Map to iterator over ((width, height) num_pixels)
            .map(|res| (res, res.0 * res.1))
            .max_by(|a, b| a.1.cmp(&b.1))
            .map(|res| *res.0),
        rscam::ResolutionInfo::Stepwise { max, .. } => Some(max),
    }
    .ok_or_else(|| Error::Camera("no resolution found".into()))
}

/// Get the maximum supported frame rate for the given format and resolution.
fn get_max_frame_rate(
    cam: &Camera,
    format: &[u8],
    resolution: (u32, u32),
) -> Result<(u32, u32), Error> {
    let interval_info = cam.intervals(format, resolution)?;
    log::debug!("Found frame rates: {:?}", &interval_info);
    match interval_info {
        // Intervals are (numerator, denominator) of seconds per frame, so the highest frame
        // rate is the one with the highest denominator / numerator ratio
        rscam::IntervalInfo::Discretes(intervals) => intervals
            .iter()
            .filter(|(numerator, _)| *numerator > 0)
            .max_by_key(|(numerator, denominator)| denominator / numerator)
            .copied(),
        rscam::IntervalInfo::Stepwise { min, .. } => Some(min),
    }
    .ok_or_else(|| Error::Camera("no frame rate found".into()))
}

fn log_supported_formats(cam: &Camera, format: &str) {
    let formats: Vec<_> = cam.formats().filter_map(Result::ok).collect();
    log::debug!(
        "Supported formats: {:?}, using format {:?}",
        formats,
        format
    );
}
