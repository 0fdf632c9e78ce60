use serde::{Deserialize, Serialize};

/// Notifications handed to the external notification service.
/// Delivery is best-effort; nothing here is awaited by the request path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum StoryNotification {
    /// Someone other than the owner liked a story
    StoryLiked {
        story_id: String,
        owner_id: String,
        actor_id: String,
    },

    /// Someone other than the owner replied to a story
    StoryReplied {
        story_id: String,
        owner_id: String,
        actor_id: String,
        reply_id: String,
        preview: String,
    },
}

impl StoryNotification {
    /// The user the notification is addressed to.
    pub fn recipient(&self) -> &str {
        match self {
            Self::StoryLiked { owner_id, .. } | Self::StoryReplied { owner_id, .. } => owner_id,
        }
    }

    /// Self-interactions are never notified.
    pub fn is_self_interaction(&self) -> bool {
        match self {
            Self::StoryLiked { owner_id, actor_id, .. }
            | Self::StoryReplied { owner_id, actor_id, .. } => owner_id == actor_id,
        }
    }
}
