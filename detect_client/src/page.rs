//! Document model of the client.
//!
//! [`Page`] holds everything a user can see: previews, detection lists, the live panel, the
//! loading indicator and the error banner. Changes are forwarded to an optional [`PageSink`].
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use common::protocol::MediaKind;
use image::RgbaImage;

use crate::render::DetectionRow;

pub const CAMERA_BUTTON_IDLE: &str = "Use Camera";
pub const CAMERA_BUTTON_ARMED: &str = "Capture Image";

/// Something that renders page changes.
pub trait PageSink: Send + Sync {
    fn on_event(&self, event: PageEvent<'_>);
}

#[derive(Debug)]
pub enum PageEvent<'a> {
    Loading(bool),
    Error(&'a str),
    Preview { kind: MediaKind, src: &'a str },
    DetectionInfo(&'a [DetectionRow]),
    LiveDetections(&'a [DetectionRow]),
    LiveOverlay(&'a RgbaImage),
    Fps(u64),
}

/// Image or video preview element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preview {
    pub visible: bool,
    pub src: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Banner {
    pub id: u64,
    pub message: String,
}

/// Snapshot of everything visible on the page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PageState {
    pub media_tab: MediaKind,
    pub accept: &'static str,
    pub upload_title: &'static str,
    pub upload_subtitle: &'static str,
    pub loading: bool,
    pub results_visible: bool,
    pub image_preview: Preview,
    pub video_preview: Preview,
    pub detection_info: Vec<DetectionRow>,
    pub camera_preview_visible: bool,
    pub camera_button: &'static str,
    pub live_visible: bool,
    pub live_detections: Vec<DetectionRow>,
    pub fps: u64,
    /// Number of overlay redraws so far.
    pub overlay_draws: u64,
    pub error: Option<Banner>,
}

impl Default for PageState {
    fn default() -> Self {
        let media_tab = MediaKind::Image;
        let (upload_title, upload_subtitle) = upload_texts(media_tab);
        Self {
            media_tab,
            accept: media_tab.accept(),
            upload_title,
            upload_subtitle,
            loading: false,
            results_visible: false,
            image_preview: Preview::default(),
            video_preview: Preview::default(),
            detection_info: Vec::new(),
            camera_preview_visible: false,
            camera_button: CAMERA_BUTTON_IDLE,
            live_visible: false,
            live_detections: Vec::new(),
            fps: 0,
            overlay_draws: 0,
            error: None,
        }
    }
}

fn upload_texts(kind: MediaKind) -> (&'static str, &'static str) {
    match kind {
        MediaKind::Image => (
            "Drop your image here or click to upload",
            "Supports JPG, PNG, GIF",
        ),
        MediaKind::Video => (
            "Drop your video here or click to upload",
            "Supports MP4, AVI, MOV",
        ),
    }
}

pub struct Page {
    state: Mutex<PageState>,
    sink: Option<Arc<dyn PageSink>>,
    banner_ids: AtomicU64,
    banner_timeout: Duration,
}

impl Page {
    pub fn new(banner_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(PageState::default()),
            sink: None,
            banner_ids: AtomicU64::new(0),
            banner_timeout,
        }
    }

    pub fn with_sink(banner_timeout: Duration, sink: Arc<dyn PageSink>) -> Self {
        Self {
            sink: Some(sink),
            ..Self::new(banner_timeout)
        }
    }

    pub fn snapshot(&self) -> PageState {
        self.state.lock().unwrap().clone()
    }

    fn update<R>(&self, f: impl FnOnce(&mut PageState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn emit(&self, event: PageEvent<'_>) {
        if let Some(sink) = &self.sink {
            sink.on_event(event);
        }
    }

    pub fn set_media_tab(&self, kind: MediaKind) {
        let (title, subtitle) = upload_texts(kind);
        self.update(|state| {
            state.media_tab = kind;
            state.accept = kind.accept();
            state.upload_title = title;
            state.upload_subtitle = subtitle;
        });
    }

    pub fn show_loading(&self, show: bool) {
        self.update(|state| state.loading = show);
        self.emit(PageEvent::Loading(show));
    }

    /// Show the loading indicator until the guard is dropped.
    pub fn loading(&self) -> LoadingGuard<'_> {
        self.show_loading(true);
        LoadingGuard { page: self }
    }

    pub fn show_results(&self, show: bool) {
        self.update(|state| state.results_visible = show);
    }

    pub fn show_live_detection(&self, show: bool) {
        self.update(|state| state.live_visible = show);
    }

    pub fn hide_results(&self) {
        self.update(|state| {
            state.results_visible = false;
            state.live_visible = false;
        });
    }

    /// Show the preview of `kind` with `src` and hide the other one.
    pub fn set_preview(&self, kind: MediaKind, src: String) {
        self.emit(PageEvent::Preview { kind, src: &src });
        self.update(|state| {
            let (shown, hidden) = match kind {
                MediaKind::Image => (&mut state.image_preview, &mut state.video_preview),
                MediaKind::Video => (&mut state.video_preview, &mut state.image_preview),
            };
            hidden.visible = false;
            shown.visible = true;
            shown.src = Some(src);
        });
    }

    pub fn set_detection_info(&self, rows: Vec<DetectionRow>) {
        self.emit(PageEvent::DetectionInfo(&rows));
        self.update(|state| state.detection_info = rows);
    }

    pub fn set_live_detections(&self, rows: Vec<DetectionRow>) {
        self.emit(PageEvent::LiveDetections(&rows));
        self.update(|state| state.live_detections = rows);
    }

    pub fn draw_live_overlay(&self, overlay: &RgbaImage) {
        self.update(|state| state.overlay_draws += 1);
        self.emit(PageEvent::LiveOverlay(overlay));
    }

    pub fn set_fps(&self, fps: u64) {
        self.update(|state| state.fps = fps);
        self.emit(PageEvent::Fps(fps));
    }

    /// Toggle the camera preview together with the label of the camera button.
    pub fn set_camera_armed(&self, armed: bool) {
        self.update(|state| {
            state.camera_preview_visible = armed;
            state.camera_button = match armed {
                true => CAMERA_BUTTON_ARMED,
                false => CAMERA_BUTTON_IDLE,
            };
        });
    }

    /// Replace any visible banner with `message`. The banner removes itself after the banner
    /// timeout unless it was replaced in the meantime.
    ///
    /// Must be called within a tokio runtime.
    pub fn show_error(self: &Arc<Self>, message: &str) {
        let id = self.banner_ids.fetch_add(1, Ordering::Relaxed) + 1;
        log::warn!("{message}");

        self.update(|state| {
            state.error = Some(Banner {
                id,
                message: message.to_owned(),
            })
        });
        self.emit(PageEvent::Error(message));

        let page = Arc::downgrade(self);
        let timeout = self.banner_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            if let Some(page) = page.upgrade() {
                page.dismiss_error(id);
            }
        });
    }

    /// Remove the banner if it is still the one with `id`.
    pub fn dismiss_error(&self, id: u64) {
        self.update(|state| {
            if state.error.as_ref().map(|banner| banner.id) == Some(id) {
                state.error = None;
            }
        });
    }
}

/// Resets the loading indicator when dropped.
pub struct LoadingGuard<'a> {
    page: &'a Page,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.page.show_loading(false);
    }
}
