//! Client-side story synchronization.
//!
//! [`SyncEngine`] keeps a bounded, persisted copy of the feed, publishes
//! stories with retries and queues them when that fails, and applies
//! interactions optimistically with a snapshot-based self-heal on the server.

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod feed;
pub mod local;
pub mod media;
pub mod queue;
pub mod retry;
pub mod transport;

use std::sync::Arc;

pub use config::SyncConfig;
pub use engine::{FlushReport, PublishOutcome, StoryDraft, SyncEngine};
pub use error::{ClientError, Result};
pub use events::SyncEvent;
pub use feed::{FeedPhase, FeedState};

use crate::local::LocalStore;
use crate::media::HttpMediaStore;
use crate::transport::HttpStoryApi;

impl SyncEngine {
    /// Engine talking to a Flicker server at `base_url` for both stories and media.
    pub fn http(config: SyncConfig, base_url: &str, local: Arc<dyn LocalStore>) -> Self {
        let client = reqwest::Client::new();
        let api = Arc::new(HttpStoryApi::new(client.clone(), base_url));
        let media = Arc::new(HttpMediaStore::new(client, base_url));
        Self::new(config, api, media, local)
    }
}
