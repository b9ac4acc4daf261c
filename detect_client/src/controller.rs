//! Client controller.
//!
//! Owns the page, the backend client and the camera, and runs the user flows: submitting files,
//! capturing a still from the camera and live detection.
use std::{path::Path, path::PathBuf, sync::Arc};

use common::protocol::{DetectionResult, MediaKind};

use crate::{
    client::DetectClient,
    config::{ClientConfig, LiveConfig},
    intake::{first_dropped, MediaFile, CAPTURE_FILE_NAME},
    live::{LiveContext, LiveDetection, LIVE_CAMERA_ERROR},
    page::Page,
    render::{encode_png, format_detections, load_font, LabelFont, PLACEHOLDER_STATIC},
    sensors::MediaDevices,
    video::VideoElement,
    Error,
};

pub const INVALID_FILE_ERROR: &str = "Please select a valid image or video file";
pub const REQUEST_FAILED_ERROR: &str =
    "Failed to process file. Make sure the backend server is running.";
pub const CAMERA_ERROR: &str = "Could not access camera";
pub const DETECTION_FAILED_ERROR: &str = "Detection failed";

pub struct ClientController {
    page: Arc<Page>,
    client: DetectClient,
    devices: Arc<dyn MediaDevices>,
    live_config: LiveConfig,
    font: Option<Arc<LabelFont>>,
    current_tab: MediaKind,
    camera: Option<VideoElement>,
    live: Option<LiveDetection>,
}

impl ClientController {
    pub fn new(config: &ClientConfig, page: Arc<Page>, devices: Arc<dyn MediaDevices>) -> Self {
        let font = config
            .font_path
            .as_deref()
            .and_then(|path| match load_font(path) {
                Ok(font) => Some(Arc::new(font)),
                Err(err) => {
                    log::warn!("No label font, drawing boxes only: {err}");
                    None
                }
            });

        Self {
            page,
            client: DetectClient::new(&config.backend_url),
            devices,
            live_config: config.live.clone(),
            font,
            current_tab: MediaKind::Image,
            camera: None,
            live: None,
        }
    }

    pub fn page(&self) -> &Arc<Page> {
        &self.page
    }

    pub fn client(&self) -> &DetectClient {
        &self.client
    }

    pub fn current_tab(&self) -> MediaKind {
        self.current_tab
    }

    pub fn is_camera_armed(&self) -> bool {
        self.camera.is_some()
    }

    pub fn is_live(&self) -> bool {
        self.live.is_some()
    }

    /// Switch between the image and video upload tab.
    pub fn switch_media_type(&mut self, kind: MediaKind) {
        self.current_tab = kind;
        self.page.set_media_tab(kind);
    }

    /// Process a file picked by the user.
    pub async fn handle_file_select(&mut self, path: &Path) -> Result<(), Error> {
        let file = MediaFile::read(path).await.map_err(|err| {
            self.page.show_error(REQUEST_FAILED_ERROR);
            err
        })?;
        self.process_media(file).await
    }

    /// Process the first of a set of dropped files. Nothing happens for an empty drop.
    pub async fn handle_drop(&mut self, paths: &[PathBuf]) -> Result<(), Error> {
        match first_dropped(paths) {
            Some(path) => self.handle_file_select(path).await,
            None => Ok(()),
        }
    }

    /// Validate, submit and render a piece of media.
    pub async fn process_media(&mut self, file: MediaFile) -> Result<(), Error> {
        let kind = match file.kind() {
            Some(kind) => kind,
            None => {
                self.page.show_error(INVALID_FILE_ERROR);
                return Err(Error::UnsupportedMedia(file.mime));
            }
        };

        let _loading = self.page.loading();
        self.page.hide_results();

        match self.client.detect(kind, &file).await {
            Ok(result) => self.display_results(result, kind),
            Err(err) => {
                log::error!("Error: {err}");
                self.page.show_error(REQUEST_FAILED_ERROR);
                Err(err)
            }
        }
    }

    /// Show a backend answer for `kind`, or its error.
    pub fn display_results(&self, result: DetectionResult, kind: MediaKind) -> Result<(), Error> {
        if !result.success {
            let message = result
                .error
                .unwrap_or_else(|| DETECTION_FAILED_ERROR.to_owned());
            self.page.show_error(&message);
            return Err(Error::Backend(message));
        }

        let payload = result.payload(kind).unwrap_or_default();
        self.page
            .set_preview(kind, format!("{}{}", kind.data_uri_prefix(), payload));
        self.page
            .set_detection_info(format_detections(&result.detections, PLACEHOLDER_STATIC));
        self.page.show_results(true);

        Ok(())
    }

    /// First call opens the camera preview, the second one captures a still, releases the camera
    /// and submits the still.
    pub async fn toggle_camera(&mut self) -> Result<(), Error> {
        match self.camera.take() {
            None => match self.devices.get_user_media() {
                Ok(stream) => {
                    self.camera = Some(VideoElement::attach(stream));
                    self.page.set_camera_armed(true);
                    Ok(())
                }
                Err(err) => {
                    log::error!("Camera error: {err}");
                    self.page.show_error(CAMERA_ERROR);
                    Err(err)
                }
            },
            Some(video) => self.capture_image(video).await,
        }
    }

    async fn capture_image(&mut self, mut video: VideoElement) -> Result<(), Error> {
        let frame = match video.current_frame() {
            Some(frame) => Ok(frame),
            None => video
                .loaded_metadata()
                .await
                .and_then(|_| video.current_frame().ok_or_else(|| Error::Camera("no frame".into()))),
        };

        // Release the camera before anything else can fail
        drop(video);
        self.page.set_camera_armed(false);

        let frame = frame.map_err(|err| {
            self.page.show_error(CAMERA_ERROR);
            err
        })?;
        let png = encode_png(&frame)?;

        self.process_media(MediaFile::new(CAPTURE_FILE_NAME, "image/png", png))
            .await
    }

    /// Start live detection unless it is already running.
    pub fn start_live_detection(&mut self) -> Result<(), Error> {
        if self.live.is_some() {
            return Ok(());
        }

        let stream = self.devices.get_user_media().map_err(|err| {
            log::error!("Camera error: {err}");
            self.page.show_error(LIVE_CAMERA_ERROR);
            err
        })?;
        let video = VideoElement::attach(stream);

        self.page.hide_results();
        self.page.show_live_detection(true);

        let ctx = LiveContext {
            page: self.page.clone(),
            client: self.client.clone(),
            config: self.live_config.clone(),
            font: self.font.clone(),
        };
        self.live = Some(LiveDetection::start(video, ctx));
        log::info!("Live detection started");

        Ok(())
    }

    /// Stop live detection and release the camera.
    pub fn stop_live_detection(&mut self) {
        if let Some(mut live) = self.live.take() {
            live.stop();
        }
        self.page.show_live_detection(false);
    }
}
