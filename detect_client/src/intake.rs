//! Media intake from files, dropped paths and camera captures.
//!
use std::path::{Path, PathBuf};

use bytes::Bytes;
use common::protocol::MediaKind;

use crate::Error;

/// File name the backend sees for camera captures.
pub const CAPTURE_FILE_NAME: &str = "blob";

/// Binary media with its name and MIME type.
#[derive(Clone, Debug)]
pub struct MediaFile {
    pub name: String,
    pub mime: String,
    pub bytes: Bytes,
}

impl MediaFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Read a file from disk, guessing its MIME type from the extension.
    pub async fn read(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let mime = guess_mime(path);
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| CAPTURE_FILE_NAME.to_owned());

        log::debug!("Read {} ({}, {} bytes)", path.display(), &mime, bytes.len());

        Ok(Self::new(name, mime, bytes))
    }

    /// Media kind by MIME type, `None` for anything but images and videos.
    pub fn kind(&self) -> Option<MediaKind> {
        MediaKind::from_mime(&self.mime)
    }
}

/// MIME type of a path by extension, `application/octet-stream` if unknown.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_owned()
}

/// Only the first of several dropped paths is processed.
pub fn first_dropped(paths: &[PathBuf]) -> Option<&PathBuf> {
    if paths.len() > 1 {
        log::info!("{} paths dropped, using {}", paths.len(), paths[0].display());
    }
    paths.first()
}
