use std::sync::Arc;

use chrono::{DateTime, Utc};
use flicker_types::api::CreateStoryRequest;
use flicker_types::models::{StoryItemInput, UserSummary, Visibility};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::local::{LocalStore, PENDING_QUEUE_KEY, load_json, save_json};

/// A story that could not be published yet, kept with its original items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingStoryPayload {
    pub local_id: String,
    pub owner_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserSummary>,
    #[serde(default)]
    pub visibility: Visibility,
    pub items: Vec<StoryItemInput>,
    pub queued_at: DateTime<Utc>,
    #[serde(default)]
    pub attempts: u32,
}

impl PendingStoryPayload {
    pub fn to_request(&self, items: Vec<StoryItemInput>) -> CreateStoryRequest {
        CreateStoryRequest {
            user_id: self.owner_id.clone(),
            user: self.owner.clone(),
            visibility: serde_json::to_value(self.visibility)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string)),
            items,
        }
    }
}

/// Ordered, persisted list of pending stories. Every operation rewrites the
/// stored list under one lock, so concurrent publish and flush do not lose entries.
pub struct PendingQueue {
    store: Arc<dyn LocalStore>,
    lock: Mutex<()>,
}

impl PendingQueue {
    pub fn new(store: Arc<dyn LocalStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    async fn read(&self) -> Result<Vec<PendingStoryPayload>> {
        Ok(load_json(self.store.as_ref(), PENDING_QUEUE_KEY)
            .await?
            .unwrap_or_default())
    }

    /// An emptied queue drops its key rather than persisting `[]`.
    async fn write(&self, entries: &[PendingStoryPayload]) -> Result<()> {
        if entries.is_empty() {
            return self.store.remove(PENDING_QUEUE_KEY).await;
        }
        save_json(self.store.as_ref(), PENDING_QUEUE_KEY, entries).await
    }

    pub async fn entries(&self) -> Result<Vec<PendingStoryPayload>> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.entries().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    pub async fn push(&self, payload: PendingStoryPayload) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        debug!("Queueing story {} ({} already pending)", payload.local_id, entries.len());
        entries.push(payload);
        self.write(&entries).await
    }

    /// Returns false when no entry had that id.
    pub async fn remove(&self, local_id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        let before = entries.len();
        entries.retain(|e| e.local_id != local_id);
        if entries.len() == before {
            return Ok(false);
        }
        self.write(&entries).await?;
        Ok(true)
    }

    /// Replace an entry's items, e.g. once embedded media has been uploaded.
    pub async fn update_items(&self, local_id: &str, items: Vec<StoryItemInput>) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        if let Some(entry) = entries.iter_mut().find(|e| e.local_id == local_id) {
            entry.items = items;
            self.write(&entries).await?;
        }
        Ok(())
    }

    pub async fn record_attempt(&self, local_id: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await?;
        if let Some(entry) = entries.iter_mut().find(|e| e.local_id == local_id) {
            entry.attempts += 1;
            self.write(&entries).await?;
        }
        Ok(())
    }
}
