//! Protocol definition of the detection backend.
//!
//! The backend answers `POST /detect` with a JSON [`DetectionResult`] and `GET /health` with a
//! [`HealthStatus`].
use serde::{Deserialize, Serialize};

/// Single detected object.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct Detection {
    /// Class label.
    pub class: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// `[x_top_left, y_top_left, x_bottom_right, y_bottom_right]` in source-image pixels.
    pub bbox: [f32; 4],
}

impl Detection {
    pub fn new(class: impl Into<String>, confidence: f32, bbox: [f32; 4]) -> Self {
        Self {
            class: class.into(),
            confidence,
            bbox,
        }
    }
}

/// Response body of the detect endpoint.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct DetectionResult {
    pub success: bool,
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Base64 encoded annotated JPEG, set for image requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Base64 encoded annotated MP4, set for video requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detection_count: Option<usize>,
}

impl DetectionResult {
    /// Base64 payload matching the media kind of the request.
    pub fn payload(&self, kind: MediaKind) -> Option<&str> {
        match kind {
            MediaKind::Image => self.image.as_deref(),
            MediaKind::Video => self.video.as_deref(),
        }
    }
}

/// Response body of the health endpoint.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HealthStatus {
    pub status: String,
    pub model_loaded: bool,
}

/// Kind of media sent to the backend.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    /// Classify a MIME type. Anything that is neither `image/*` nor `video/*` is rejected.
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.starts_with("image/") {
            Some(Self::Image)
        } else if mime.starts_with("video/") {
            Some(Self::Video)
        } else {
            None
        }
    }

    /// Name of the multipart field carrying the payload.
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Video => "video",
        }
    }

    /// Data URI prefix of the annotated payload returned by the backend.
    pub fn data_uri_prefix(&self) -> &'static str {
        match self {
            Self::Image => "data:image/jpeg;base64,",
            Self::Video => "data:video/mp4;base64,",
        }
    }

    /// File input filter for this kind.
    pub fn accept(&self) -> &'static str {
        match self {
            Self::Image => "image/*",
            Self::Video => "video/*",
        }
    }
}

#[cfg(test)]
mod test {

    use super::*;
    use crate::Error;

    #[test]
    fn test_deserialize_backend_response() -> Result<(), Error> {
        let body = r#"{
            "success": true,
            "image": "aGVsbG8=",
            "detections": [
                {"class": "cat", "confidence": 0.92, "bbox": [10.0, 10.0, 50.0, 50.0]},
                {"class": "dog", "confidence": 0.5, "bbox": [0, 0, 5, 5]}
            ],
            "detection_count": 2
        }"#;

        let result: DetectionResult = serde_json::from_str(body)?;

        assert!(result.success);
        assert_eq!(result.detections.len(), 2);
        assert_eq!(result.detections[0].class, "cat");
        assert_eq!(result.detections[1].bbox, [0.0, 0.0, 5.0, 5.0]);
        assert_eq!(result.payload(MediaKind::Image), Some("aGVsbG8="));
        assert_eq!(result.payload(MediaKind::Video), None);
        assert_eq!(result.detection_count, Some(2));

        Ok(())
    }

    #[test]
    fn test_failure_without_detections() -> Result<(), Error> {
        let result: DetectionResult =
            serde_json::from_str(r#"{"success": false, "error": "No image file provided"}"#)?;

        assert!(!result.success);
        assert!(result.detections.is_empty());
        assert_eq!(result.error.as_deref(), Some("No image file provided"));

        Ok(())
    }

    #[test]
    fn test_media_kind_from_mime() {
        assert_eq!(MediaKind::from_mime("image/jpeg"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("image/png"), Some(MediaKind::Image));
        assert_eq!(MediaKind::from_mime("video/mp4"), Some(MediaKind::Video));
        assert_eq!(MediaKind::from_mime("application/pdf"), None);
        assert_eq!(MediaKind::from_mime("text/plain"), None);
        assert_eq!(MediaKind::from_mime(""), None);
        assert_eq!(MediaKind::from_mime("imagex/png"), None);
    }

    #[test]
    fn test_field_names() {
        assert_eq!(MediaKind::Image.field_name(), "image");
        assert_eq!(MediaKind::Video.field_name(), "video");
        assert_eq!(MediaKind::Video.data_uri_prefix(), "data:video/mp4;base64,");
    }
}
