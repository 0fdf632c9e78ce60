//! Turns embedded (`data:`) media into hosted locators.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use flicker_types::models::StoryItemInput;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ClientError, Result};

/// Blob storage collaborator.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store `bytes` and return a durable locator for them.
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str, owner_id: &str) -> Result<String>;
}

/// `POST {base_url}/media` with raw bytes.
pub struct HttpMediaStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMediaStore {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[derive(Deserialize)]
struct UploadedMedia {
    url: String,
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn upload(&self, bytes: Vec<u8>, mime_type: &str, owner_id: &str) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/media", self.base_url))
            .header(reqwest::header::CONTENT_TYPE, mime_type)
            .header("x-owner-id", owner_id)
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Upstream {
                status: status.as_u16(),
                body,
            });
        }
        let uploaded: UploadedMedia = resp.json().await?;
        // The server answers with a path relative to itself
        if uploaded.url.starts_with('/') {
            Ok(format!("{}{}", self.base_url, uploaded.url))
        } else {
            Ok(uploaded.url)
        }
    }
}

/// Decoded `data:[<mime>][;base64],<payload>` locator.
#[derive(Debug, PartialEq)]
pub struct DataUrl {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

pub fn is_data_url(locator: &str) -> bool {
    locator.starts_with("data:")
}

pub fn parse_data_url(locator: &str) -> Option<DataUrl> {
    let rest = locator.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    let (mime, is_base64) = match meta.strip_suffix(";base64") {
        Some(mime) => (mime, true),
        None => (meta, false),
    };
    let bytes = if is_base64 {
        STANDARD.decode(payload.trim()).ok()?
    } else {
        payload.as_bytes().to_vec()
    };
    let mime_type = match mime.split(';').next().unwrap_or_default() {
        "" => "text/plain".to_string(),
        m => m.to_string(),
    };
    Some(DataUrl { mime_type, bytes })
}

/// Uploads embedded media and falls back to the embedded payload on any
/// failure, so a broken blob store never blocks publishing.
#[derive(Clone)]
pub struct MediaUploadAdapter {
    store: Arc<dyn MediaStore>,
}

impl MediaUploadAdapter {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    pub async fn upload(&self, bytes: Vec<u8>, mime_type: &str, owner_id: &str) -> Result<String> {
        self.store.upload(bytes, mime_type, owner_id).await
    }

    /// Hosted locators pass through untouched.
    pub async fn resolve_locator(&self, locator: &str, owner_id: &str) -> String {
        if !is_data_url(locator) {
            return locator.to_string();
        }
        let Some(data) = parse_data_url(locator) else {
            warn!("Keeping malformed data URL for {}", owner_id);
            return locator.to_string();
        };
        let size = data.bytes.len();
        match self.store.upload(data.bytes, &data.mime_type, owner_id).await {
            Ok(url) => {
                debug!("Uploaded {} bytes of {} for {}", size, data.mime_type, owner_id);
                url
            }
            Err(e) => {
                warn!("Media upload failed, keeping embedded payload: {}", e);
                locator.to_string()
            }
        }
    }

    pub async fn resolve_items(&self, items: &[StoryItemInput], owner_id: &str) -> Vec<StoryItemInput> {
        let mut resolved = Vec::with_capacity(items.len());
        for item in items {
            let mut item = item.clone();
            if let Some(locator) = item.media_url.as_deref() {
                item.media_url = Some(self.resolve_locator(locator, owner_id).await);
            }
            resolved.push(item);
        }
        resolved
    }
}
