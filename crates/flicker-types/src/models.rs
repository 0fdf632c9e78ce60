use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A story holds between one and this many items.
pub const MAX_STORY_ITEMS: usize = 5;

/// Replies are clamped to this many characters after trimming.
pub const MAX_REPLY_CHARS: usize = 1000;

pub const DEFAULT_STORY_TTL_HOURS: i64 = 24;

pub const IMAGE_DURATION_SECS: u32 = 6;
pub const MAX_VIDEO_DURATION_SECS: u32 = 15;

/// Locator used whenever an item arrives without any media.
pub const PLACEHOLDER_MEDIA_URL: &str = "/static/story-placeholder.png";

pub fn default_story_ttl() -> Duration {
    Duration::hours(DEFAULT_STORY_TTL_HOURS)
}

// -- Enums --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    #[default]
    Friends,
    CloseFriends,
}

impl Visibility {
    /// Accepts the wire spelling plus the dashed/camel variants older clients sent.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "public" => Some(Self::Public),
            "friends" => Some(Self::Friends),
            "close_friends" | "closefriends" => Some(Self::CloseFriends),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "image" | "photo" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }

    pub fn default_duration(self) -> u32 {
        match self {
            Self::Image => IMAGE_DURATION_SECS,
            Self::Video => MAX_VIDEO_DURATION_SECS,
        }
    }

    /// Clamp a requested playback duration to what this kind allows.
    pub fn clamp_duration(self, requested: Option<f64>) -> u32 {
        let secs = match requested {
            Some(d) if d.is_finite() && d >= 1.0 => d.round() as u32,
            _ => return self.default_duration(),
        };
        match self {
            Self::Image => secs,
            Self::Video => secs.min(MAX_VIDEO_DURATION_SECS),
        }
    }
}

// -- Identity --

/// Denormalized identity cached next to every story and reply so rendering
/// never waits on an identity lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messaging_alias: Option<String>,
}

impl UserSummary {
    pub fn bare(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            handle: id.clone(),
            display_name: id.clone(),
            id,
            avatar_url: None,
            messaging_alias: None,
        }
    }
}

// -- Stories --

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryItem {
    pub id: String,
    pub kind: MediaKind,
    pub media_url: String,
    pub duration: u32,
    pub created_at: DateTime<Utc>,
}

impl StoryItem {
    pub fn placeholder(now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: MediaKind::Image,
            media_url: PLACEHOLDER_MEDIA_URL.to_string(),
            duration: IMAGE_DURATION_SECS,
            created_at: now,
        }
    }
}

/// Loosely-typed item as submitted by clients. Everything is optional; the
/// store fills gaps when turning it into a [`StoryItem`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryItemInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, alias = "url", alias = "media", skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl StoryItemInput {
    pub fn new(kind: MediaKind, media_url: impl Into<String>) -> Self {
        Self {
            kind: Some(match kind {
                MediaKind::Image => "image".to_string(),
                MediaKind::Video => "video".to_string(),
            }),
            media_url: Some(media_url.into()),
            ..Self::default()
        }
    }

    /// Normalize into a stored item. Unknown kinds fall back to image, empty
    /// media falls back to the placeholder locator.
    pub fn into_item(self, now: DateTime<Utc>) -> StoryItem {
        let kind = self
            .kind
            .as_deref()
            .and_then(MediaKind::parse_lenient)
            .unwrap_or_default();
        let media_url = self
            .media_url
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_MEDIA_URL.to_string());
        StoryItem {
            id: self
                .id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            kind,
            media_url,
            duration: kind.clamp_duration(self.duration),
            created_at: self.created_at.unwrap_or(now),
        }
    }
}

impl From<&StoryItem> for StoryItemInput {
    fn from(item: &StoryItem) -> Self {
        Self {
            id: Some(item.id.clone()),
            kind: Some(match item.kind {
                MediaKind::Image => "image".to_string(),
                MediaKind::Video => "video".to_string(),
            }),
            media_url: Some(item.media_url.clone()),
            duration: Some(f64::from(item.duration)),
            created_at: Some(item.created_at),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryReply {
    pub id: String,
    pub story_id: String,
    pub author_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<UserSummary>,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryRecord {
    pub id: String,
    // snake_case aliases accept records written by the first storage layout
    #[serde(alias = "user_id")]
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    pub items: Vec<StoryItem>,
    #[serde(alias = "created_at")]
    pub created_at: DateTime<Utc>,
    #[serde(alias = "expires_at")]
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default, alias = "viewer_ids")]
    pub viewer_ids: Vec<String>,
    #[serde(default, alias = "liker_ids")]
    pub liker_ids: Vec<String>,
    #[serde(default)]
    pub replies: Vec<StoryReply>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Bumped on every stored write; compared before overwriting.
    #[serde(default)]
    pub version: u64,
}

impl StoryRecord {
    /// Expired records are logically absent even while still stored.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_liked_by(&self, user_id: &str) -> bool {
        self.liker_ids.iter().any(|id| id == user_id)
    }

    pub fn has_viewer(&self, user_id: &str) -> bool {
        self.viewer_ids.iter().any(|id| id == user_id)
    }

    /// Flip `user_id` in the liker set. Returns true when the user now likes the story.
    pub fn toggle_liker(&mut self, user_id: &str) -> bool {
        if self.is_liked_by(user_id) {
            self.liker_ids.retain(|id| id != user_id);
            false
        } else {
            self.liker_ids.push(user_id.to_string());
            true
        }
    }

    /// Returns true if the viewer was newly added.
    pub fn add_viewer(&mut self, user_id: &str) -> bool {
        if self.has_viewer(user_id) {
            return false;
        }
        self.viewer_ids.push(user_id.to_string());
        true
    }

    /// Full client-side copy suitable for server-side reconstruction.
    pub fn snapshot(&self) -> StorySnapshot {
        StorySnapshot {
            id: self.id.clone(),
            user_id: Some(self.user_id.clone()),
            user: self.user.clone(),
            items: self
                .items
                .iter()
                .filter_map(|item| serde_json::to_value(item).ok())
                .collect(),
            likes: self.liker_ids.clone(),
            viewers: self.viewer_ids.clone(),
            replies: self
                .replies
                .iter()
                .filter_map(|reply| serde_json::to_value(reply).ok())
                .collect(),
            visibility: Some(self.visibility),
            created_at: Some(self.created_at),
            expires_at: Some(self.expires_at),
        }
    }
}

/// Client-held copy of a story submitted so the server can rebuild a record
/// it no longer has. Only `id` is mandatory on the wire; items and replies are
/// kept as raw JSON so one malformed entry does not reject the whole snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySnapshot {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(default)]
    pub items: Vec<serde_json::Value>,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub viewers: Vec<String>,
    #[serde(default)]
    pub replies: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<Visibility>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl StorySnapshot {
    /// Owner id from either the flat field or the embedded summary.
    pub fn owner_id(&self) -> Option<&str> {
        self.user_id
            .as_deref()
            .or(self.user.as_ref().map(|u| u.id.as_str()))
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Trim and clamp reply text. Returns `None` when nothing is left after trimming.
pub fn normalize_reply_content(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_REPLY_CHARS).collect())
}
