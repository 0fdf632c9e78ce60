use serde::{Deserialize, Serialize};

use crate::models::{StoryItemInput, StoryRecord, StoryReply, StorySnapshot, UserSummary};

// -- Stories --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStoryRequest {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visibility: Option<String>,
    #[serde(default)]
    pub items: Vec<StoryItemInput>,
}

/// `POST /stories` takes either a plain create body or a full snapshot. A
/// snapshot always carries an `id`, which is how the two are told apart.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum CreateStoryBody {
    Snapshot(StorySnapshot),
    Create(CreateStoryRequest),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryEnvelope {
    pub story: StoryRecord,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListStoriesQuery {
    pub viewer_id: Option<String>,
}

/// One listed story, optionally annotated for the requesting viewer.
#[derive(Debug, Clone, Serialize)]
pub struct StoryListEntry {
    #[serde(flatten)]
    pub story: StoryRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub liked: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewed: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryListResponse {
    pub stories: Vec<StoryListEntry>,
}

/// Client-side view of `GET /stories`; viewer annotations are ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryFeedResponse {
    pub stories: Vec<StoryRecord>,
}

// -- Interactions --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewStoryRequest {
    pub viewer_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LikeStoryRequest {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub liker_snapshot: Option<UserSummary>,
    /// Present only when retrying after a not-found.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_snapshot: Option<StorySnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LikeStoryResponse {
    pub story: StoryRecord,
    pub liked: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyStoryRequest {
    pub author_id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_snapshot: Option<UserSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_snapshot: Option<StorySnapshot>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyStoryResponse {
    pub story: StoryRecord,
    pub reply: StoryReply,
}

// -- Media --

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaUploadResponse {
    pub file_id: String,
    pub url: String,
    pub size: u64,
}

// -- Errors --

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}
