//! Client configuration.
//!
use std::{path::PathBuf, time::Duration};

/// Backend used when nothing else is configured.
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

/// Font used for overlay labels when it exists on the system.
pub const DEFAULT_FONT_PATH: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSansMono.ttf";

#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// Base URL of the detection backend, without trailing slash.
    pub backend_url: String,
    pub camera: CameraConfig,
    pub live: LiveConfig,
    /// TrueType font for overlay label text.
    pub font_path: Option<PathBuf>,
    /// Time after which an error banner dismisses itself.
    pub banner_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_owned(),
            camera: CameraConfig::default(),
            live: LiveConfig::default(),
            font_path: Some(PathBuf::from(DEFAULT_FONT_PATH)),
            banner_timeout: Duration::from_secs(5),
        }
    }
}

/// Video device settings. Missing resolution or frame rate are picked as the maximum the device
/// supports for the format.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    pub device: String,
    pub format: String,
    pub resolution: Option<(u32, u32)>,
    pub frame_rate: Option<(u32, u32)>,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_owned(),
            format: "MJPG".to_owned(),
            resolution: None,
            frame_rate: None,
        }
    }
}

/// Live detection loop settings.
#[derive(Clone, Debug)]
pub struct LiveConfig {
    /// Ticks per second of the frame loop.
    pub refresh_rate_hz: u32,
    /// Every n-th tick sends a frame to the backend.
    pub sample_every: u64,
    /// JPEG quality of sampled frames.
    pub jpeg_quality: u8,
}

impl LiveConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.refresh_rate_hz.max(1) as f64)
    }
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            refresh_rate_hz: 60,
            sample_every: 5,
            jpeg_quality: 70,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tick_period() {
        let config = LiveConfig::default();
        assert_eq!(config.tick_period().as_micros(), 16_666);

        let config = LiveConfig {
            refresh_rate_hz: 0,
            ..Default::default()
        };
        assert_eq!(config.tick_period(), Duration::from_secs(1));
    }
}
