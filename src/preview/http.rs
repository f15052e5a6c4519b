//! HTTP preview service for a Drive-style files API.
//!
//! - `POST {endpoint}/files?uploadType=media` uploads the bytes and returns `{"id"}`
//! - `GET {endpoint}/files/{id}?fields=thumbnailLink` polls for the thumbnail
//! - `PATCH {endpoint}/files/{id}` with `{"trashed": true}` soft-deletes it

use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use tracing::debug;
use url::Url;

use crate::config::PreviewConfig;
use crate::error::{ReceiptError, Result};
use crate::model::message::Attachment;

use super::{PreviewResponse, PreviewService, StagedId};

#[derive(Debug, Deserialize)]
struct CreatedFile {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ThumbnailFields {
    thumbnail_link: Option<String>,
}

/// Blocking client for the preview files API.
pub struct HttpPreviewService {
    client: Client,
    endpoint: Url,
    token: Option<String>,
}

impl HttpPreviewService {
    /// Build a client from the `[preview]` config section.
    pub fn from_config(config: &PreviewConfig) -> Result<Self> {
        let endpoint = Url::parse(config.endpoint.trim()).map_err(|e| {
            ReceiptError::Config(format!("preview.endpoint '{}': {e}", config.endpoint))
        })?;
        if endpoint.cannot_be_a_base() {
            return Err(ReceiptError::Config(format!(
                "preview.endpoint '{}' is not a base URL",
                config.endpoint
            )));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("receiptbox/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            token: config.resolved_token(),
        })
    }

    /// `{endpoint}/files[/{id}]`.
    fn files_url(&self, id: Option<&str>) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("files");
            if let Some(id) = id {
                segments.push(id);
            }
        }
        url
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

impl PreviewService for HttpPreviewService {
    fn stage(&self, attachment: &Attachment) -> Result<StagedId> {
        let mut url = self.files_url(None);
        url.query_pairs_mut().append_pair("uploadType", "media");

        let resp = self
            .authorized(self.client.post(url))
            .header(CONTENT_TYPE, attachment.mime_type.as_str())
            .body(attachment.bytes.clone())
            .send()?
            .error_for_status()?;
        let created: CreatedFile = resp.json()?;
        debug!(id = %created.id, name = %attachment.name, "Staged attachment for preview");
        Ok(StagedId(created.id))
    }

    fn thumbnail_link(&self, id: &StagedId) -> Result<Option<String>> {
        let mut url = self.files_url(Some(&id.0));
        url.query_pairs_mut().append_pair("fields", "thumbnailLink");

        let resp = self.authorized(self.client.get(url)).send()?;
        if !resp.status().is_success() {
            debug!(id = %id.0, status = resp.status().as_u16(), "Thumbnail lookup not successful");
            return Ok(None);
        }
        let fields: ThumbnailFields = resp.json()?;
        Ok(fields.thumbnail_link.filter(|l| !l.is_empty()))
    }

    fn fetch(&self, url: &str) -> Result<PreviewResponse> {
        let resp = self.authorized(self.client.get(url)).send()?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string());
        let bytes = resp.bytes()?.to_vec();
        Ok(PreviewResponse {
            status,
            content_type,
            bytes,
        })
    }

    fn remove(&self, id: &StagedId) -> Result<()> {
        self.authorized(self.client.patch(self.files_url(Some(&id.0))))
            .json(&serde_json::json!({ "trashed": true }))
            .send()?
            .error_for_status()?;
        Ok(())
    }
}
