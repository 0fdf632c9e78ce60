use std::path::PathBuf;

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
};
use flicker_types::api::MediaUploadResponse;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// 50 MB upload limit for story media
pub const MAX_MEDIA_SIZE: usize = 50 * 1024 * 1024;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Flat on-disk blob store: `{dir}/{file_id}` plus a `{file_id}.mime` sidecar.
pub struct MediaStorage {
    dir: PathBuf,
}

impl MediaStorage {
    pub async fn new(dir: PathBuf) -> anyhow::Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Media directory: {}", dir.display());
        Ok(Self { dir })
    }

    fn file_path(&self, file_id: &str) -> PathBuf {
        self.dir.join(file_id)
    }

    fn mime_path(&self, file_id: &str) -> PathBuf {
        self.dir.join(format!("{file_id}.mime"))
    }

    pub async fn save(&self, bytes: &[u8], mime: &str) -> std::io::Result<String> {
        let file_id = Uuid::new_v4().to_string();
        let mut file = fs::File::create(self.file_path(&file_id)).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        fs::write(self.mime_path(&file_id), mime).await?;
        Ok(file_id)
    }

    /// `None` when the blob does not exist.
    pub async fn load(&self, file_id: &str) -> std::io::Result<Option<(Vec<u8>, String)>> {
        let bytes = match fs::read(self.file_path(file_id)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let mime = fs::read_to_string(self.mime_path(file_id))
            .await
            .map(|m| m.trim().to_string())
            .unwrap_or_else(|_| DEFAULT_MIME.to_string());
        Ok(Some((bytes, mime)))
    }
}

/// POST /media: raw bytes in, `{ fileId, url, size }` out.
pub async fn upload_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("empty upload".into()));
    }
    if bytes.len() > MAX_MEDIA_SIZE {
        return Err(ApiError::PayloadTooLarge);
    }

    let mime = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_MIME);
    let owner = headers
        .get("x-owner-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown");

    let file_id = state.media.save(&bytes, mime).await.map_err(|e| {
        error!("Failed to store media: {}", e);
        ApiError::Internal(format!("media write failed: {e}"))
    })?;
    debug!("Stored {} bytes of {} for {} as {}", bytes.len(), mime, owner, file_id);

    Ok((
        StatusCode::CREATED,
        Json(MediaUploadResponse {
            url: format!("/media/{file_id}"),
            file_id,
            size: bytes.len() as u64,
        }),
    ))
}

/// GET /media/{file_id}
pub async fn download_media(
    State(state): State<AppState>,
    Path(file_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    // Only ids we minted; this also rules out path traversal
    file_id
        .parse::<Uuid>()
        .map_err(|_| ApiError::BadRequest("invalid media id".into()))?;

    let (bytes, mime) = state
        .media
        .load(&file_id)
        .await
        .map_err(|e| {
            error!("Failed to read media {}: {}", file_id, e);
            ApiError::Internal(format!("media read failed: {e}"))
        })?
        .ok_or_else(|| ApiError::NotFound(format!("media {file_id}")))?;

    Ok(([(header::CONTENT_TYPE, mime)], bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_keeps_mime() {
        let dir = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(dir.path().join("media")).await.unwrap();
        let id = storage.save(b"jpegbytes", "image/jpeg").await.unwrap();

        let (bytes, mime) = storage.load(&id).await.unwrap().unwrap();
        assert_eq!(bytes, b"jpegbytes");
        assert_eq!(mime, "image/jpeg");
        assert!(storage.load(&Uuid::new_v4().to_string()).await.unwrap().is_none());
    }
}
