//! Error type of the detection client.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported media type {0:?}")]
    UnsupportedMedia(String),

    #[error("camera unavailable: {0}")]
    Camera(String),

    #[error("backend answered with status {0}")]
    Status(reqwest::StatusCode),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("detection failed: {0}")]
    Backend(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("invalid payload: {0}")]
    Payload(#[from] base64::DecodeError),
}

impl From<rscam::Error> for Error {
    fn from(err: rscam::Error) -> Self {
        Error::Camera(err.to_string())
    }
}
