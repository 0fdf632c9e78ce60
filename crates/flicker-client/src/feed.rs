//! Feed state machine.
//!
//! ```text
//!  Cold ──cache loaded──▶ Cached
//!   │                       │
//!   └───refresh started─────┴──▶ Loading ──ok──▶ Live
//!                                  │  │
//!                     cancelled ◀──┘  └──failed──▶ Error ──dismissed──▶ Cached | Cold
//! ```
//!
//! The machine is driven purely by [`FeedEvent`]s; timers and network calls
//! live in the engine.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use flicker_types::models::{
    StoryItem, StoryRecord, UserSummary, Visibility, default_story_ttl,
};
use tokio::time::Instant;

/// Prefix of ids minted on the client for stories not yet accepted by the server.
pub const LOCAL_ID_PREFIX: &str = "local-";

const SAMPLE_ID_PREFIX: &str = "sample-";

pub fn is_local_id(id: &str) -> bool {
    id.starts_with(LOCAL_ID_PREFIX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    /// Nothing loaded yet.
    Cold,
    /// Showing persisted stories.
    Cached,
    Loading,
    /// Last fetch failed; whatever was held is still shown.
    Error,
    /// Showing a successful fetch.
    Live,
}

impl fmt::Display for FeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedPhase::Cold => write!(f, "cold"),
            FeedPhase::Cached => write!(f, "cached"),
            FeedPhase::Loading => write!(f, "loading"),
            FeedPhase::Error => write!(f, "error"),
            FeedPhase::Live => write!(f, "live"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum FeedEvent {
    CacheLoaded(Vec<StoryRecord>),
    RefreshStarted,
    RefreshSucceeded { stories: Vec<StoryRecord>, at: Instant },
    RefreshFailed(String),
    RefreshCancelled,
    ErrorDismissed,
    /// Insert or replace a story; `replaces` names a provisional id to drop.
    StoryMerged { story: StoryRecord, replaces: Option<String> },
    StoryRemoved(String),
}

#[derive(Debug, Clone)]
pub struct FeedState {
    pub phase: FeedPhase,
    /// Phase to fall back to when a refresh is cancelled.
    resting: FeedPhase,
    pub stories: Vec<StoryRecord>,
    pub last_fetched: Option<Instant>,
    pub last_error: Option<String>,
    /// The built-in offline sample is on screen instead of real stories.
    pub showing_sample: bool,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            phase: FeedPhase::Cold,
            resting: FeedPhase::Cold,
            stories: Vec::new(),
            last_fetched: None,
            last_error: None,
            showing_sample: false,
        }
    }
}

impl FeedState {
    pub fn apply(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::CacheLoaded(stories) => {
                if self.phase == FeedPhase::Cold && !stories.is_empty() {
                    self.stories = stories;
                    self.phase = FeedPhase::Cached;
                }
            }
            FeedEvent::RefreshStarted => {
                if self.phase != FeedPhase::Loading {
                    self.resting = self.phase;
                }
                self.phase = FeedPhase::Loading;
            }
            FeedEvent::RefreshSucceeded { stories, at } => {
                // Provisional stories still publishing stay on top
                let mut merged: Vec<StoryRecord> = self
                    .stories
                    .drain(..)
                    .filter(|s| is_local_id(&s.id))
                    .collect();
                merged.extend(stories);
                self.stories = merged;
                self.last_fetched = Some(at);
                self.last_error = None;
                self.showing_sample = false;
                self.phase = FeedPhase::Live;
            }
            FeedEvent::RefreshFailed(error) => {
                self.last_error = Some(error);
                if self.stories.is_empty() {
                    self.stories = offline_sample();
                    self.showing_sample = true;
                }
                self.phase = FeedPhase::Error;
            }
            FeedEvent::RefreshCancelled => {
                if self.phase == FeedPhase::Loading {
                    self.phase = self.resting;
                }
            }
            FeedEvent::ErrorDismissed => {
                if self.phase == FeedPhase::Error {
                    self.last_error = None;
                    self.phase = if self.stories.is_empty() {
                        FeedPhase::Cold
                    } else {
                        FeedPhase::Cached
                    };
                }
            }
            FeedEvent::StoryMerged { story, replaces } => {
                if self.showing_sample {
                    self.stories.clear();
                    self.showing_sample = false;
                }
                if let Some(old) = replaces {
                    if old != story.id {
                        self.stories.retain(|s| s.id != old);
                    }
                }
                match self.stories.iter_mut().find(|s| s.id == story.id) {
                    Some(existing) => *existing = story,
                    None => self.stories.insert(0, story),
                }
                if self.phase == FeedPhase::Cold {
                    self.phase = FeedPhase::Cached;
                }
            }
            FeedEvent::StoryRemoved(id) => {
                self.stories.retain(|s| s.id != id);
            }
        }
    }

    pub fn is_stale(&self, now: Instant, window: Duration) -> bool {
        match self.last_fetched {
            Some(at) => now.saturating_duration_since(at) >= window,
            None => true,
        }
    }

    pub fn story(&self, id: &str) -> Option<&StoryRecord> {
        self.stories.iter().find(|s| s.id == id)
    }

    pub fn story_mut(&mut self, id: &str) -> Option<&mut StoryRecord> {
        self.stories.iter_mut().find(|s| s.id == id)
    }

    /// Stories worth persisting: server-backed ones, in feed order.
    pub fn cacheable(&self, limit: usize) -> Vec<StoryRecord> {
        if self.showing_sample {
            return Vec::new();
        }
        self.stories
            .iter()
            .filter(|s| !is_local_id(&s.id))
            .take(limit)
            .cloned()
            .collect()
    }
}

/// Shown on a cold start when nothing could be fetched.
pub fn offline_sample() -> Vec<StoryRecord> {
    let now = Utc::now();
    ["welcome", "offline"]
        .iter()
        .map(|name| StoryRecord {
            id: format!("{SAMPLE_ID_PREFIX}{name}"),
            user_id: "flicker".into(),
            user: Some(UserSummary {
                id: "flicker".into(),
                display_name: "Flicker".into(),
                handle: "flicker".into(),
                avatar_url: None,
                messaging_alias: None,
            }),
            items: vec![StoryItem::placeholder(now)],
            created_at: now,
            expires_at: now + default_story_ttl(),
            visibility: Visibility::Public,
            viewer_ids: Vec::new(),
            liker_ids: Vec::new(),
            replies: Vec::new(),
            updated_at: None,
            version: 0,
        })
        .collect()
}
