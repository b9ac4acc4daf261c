//! HTTP client of the detection backend.
//!
use common::protocol::{DetectionResult, HealthStatus, MediaKind};
use reqwest::{multipart, Client};

use crate::{config::DEFAULT_BACKEND_URL, intake::MediaFile, Error};

/// Handle to the detection backend. Cheap to clone.
#[derive(Clone, Debug)]
pub struct DetectClient {
    http: Client,
    backend_url: String,
}

impl Default for DetectClient {
    fn default() -> Self {
        Self::new(DEFAULT_BACKEND_URL)
    }
}

impl DetectClient {
    pub fn new(backend_url: &str) -> Self {
        Self {
            http: Client::new(),
            backend_url: backend_url.trim_end_matches('/').to_owned(),
        }
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Post media to `/detect` as a single multipart field named after its kind.
    ///
    /// Any non-2xx status is an error, no matter what the body says.
    pub async fn detect(&self, kind: MediaKind, file: &MediaFile) -> Result<DetectionResult, Error> {
        let part = multipart::Part::bytes(file.bytes.to_vec())
            .file_name(file.name.clone())
            .mime_str(&file.mime)?;
        let form = multipart::Form::new().part(kind.field_name(), part);

        log::debug!(
            "Posting {} ({} bytes) as {:?}",
            &file.name,
            file.bytes.len(),
            kind.field_name()
        );

        let resp = self
            .http
            .post(format!("{}/detect", &self.backend_url))
            .multipart(form)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status(status));
        }

        Ok(resp.json().await?)
    }

    /// Query `/health` of the backend.
    pub async fn health(&self) -> Result<HealthStatus, Error> {
        let resp = self
            .http
            .get(format!("{}/health", &self.backend_url))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::Status(status));
        }

        Ok(resp.json().await?)
    }
}
