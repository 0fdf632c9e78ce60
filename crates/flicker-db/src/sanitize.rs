use chrono::{DateTime, Duration, Utc};
use flicker_types::models::{
    MAX_STORY_ITEMS, StoryItem, StoryItemInput, StoryRecord, StoryReply, StorySnapshot,
    UserSummary, normalize_reply_content,
};
use serde::Deserialize;
use std::collections::HashSet;

use crate::error::{Result, StoreError};

/// Inline (`data:`) locators above this size are rejected outright.
pub const MAX_MEDIA_LOCATOR_BYTES: usize = 12 * 1024 * 1024;

/// A record rebuilt from a snapshot plus the identities it carried.
#[derive(Debug, Clone)]
pub struct RebuiltStory {
    pub record: StoryRecord,
    pub users: Vec<UserSummary>,
}

/// Strict item validation for fresh creates: 1 to 5 items, bounded locators.
pub fn validate_new_items(inputs: Vec<StoryItemInput>, now: DateTime<Utc>) -> Result<Vec<StoryItem>> {
    if inputs.is_empty() {
        return Err(StoreError::validation("a story needs at least one item"));
    }
    if inputs.len() > MAX_STORY_ITEMS {
        return Err(StoreError::validation(format!(
            "a story holds at most {MAX_STORY_ITEMS} items, got {}",
            inputs.len()
        )));
    }
    check_locator_sizes(&inputs)?;
    Ok(inputs.into_iter().map(|input| input.into_item(now)).collect())
}

fn check_locator_sizes(inputs: &[StoryItemInput]) -> Result<()> {
    for input in inputs {
        if input.media_url.as_ref().is_some_and(|m| m.len() > MAX_MEDIA_LOCATOR_BYTES) {
            return Err(StoreError::validation("media payload too large"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReplyInput {
    #[serde(default)]
    id: Option<String>,
    #[serde(alias = "userId", alias = "author_id")]
    author_id: String,
    #[serde(default)]
    author: Option<UserSummary>,
    #[serde(default, alias = "text")]
    content: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Lenient rebuild used for self-healing. Malformed items and replies are
/// dropped rather than failing the whole snapshot; an item list that ends up
/// empty gets exactly one placeholder item.
pub fn rebuild_from_snapshot(
    snapshot: &StorySnapshot,
    now: DateTime<Utc>,
    ttl: Duration,
) -> Result<RebuiltStory> {
    let id = snapshot.id.trim();
    if id.is_empty() {
        return Err(StoreError::validation("snapshot is missing its id"));
    }
    let owner_id = snapshot
        .owner_id()
        .ok_or_else(|| StoreError::validation("snapshot is missing its owner"))?
        .to_string();

    let inputs: Vec<StoryItemInput> = snapshot
        .items
        .iter()
        .filter(|v| v.is_object())
        .filter_map(|v| serde_json::from_value(v.clone()).ok())
        .take(MAX_STORY_ITEMS)
        .collect();
    check_locator_sizes(&inputs)?;
    let mut items: Vec<StoryItem> = inputs.into_iter().map(|i| i.into_item(now)).collect();
    if items.is_empty() {
        items.push(StoryItem::placeholder(now));
    }

    let created_at = snapshot.created_at.unwrap_or(now);
    let expires_at = snapshot
        .expires_at
        .filter(|exp| *exp > created_at)
        .unwrap_or(created_at + ttl);

    let owner = snapshot.user.clone().filter(|u| u.id == owner_id);
    let mut users: Vec<UserSummary> = owner.iter().cloned().collect();

    let mut replies = Vec::new();
    for value in &snapshot.replies {
        let Ok(input) = serde_json::from_value::<ReplyInput>(value.clone()) else {
            continue;
        };
        let Some(content) = normalize_reply_content(&input.content) else {
            continue;
        };
        if input.author_id.trim().is_empty() {
            continue;
        }
        if let Some(author) = input.author.as_ref().filter(|a| a.id == input.author_id) {
            if !users.iter().any(|u| u.id == author.id) {
                users.push(author.clone());
            }
        }
        replies.push(StoryReply {
            id: input
                .id
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            story_id: id.to_string(),
            author_id: input.author_id,
            author: input.author,
            content,
            created_at: input.created_at.unwrap_or(now),
        });
    }

    let record = StoryRecord {
        id: id.to_string(),
        user_id: owner_id,
        user: owner,
        items,
        created_at,
        expires_at,
        visibility: snapshot.visibility.unwrap_or_default(),
        viewer_ids: dedup_ids(&snapshot.viewers),
        liker_ids: dedup_ids(&snapshot.likes),
        replies,
        updated_at: Some(now),
        version: 0,
    };

    Ok(RebuiltStory { record, users })
}

fn dedup_ids(ids: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    ids.iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(id.to_string()))
        .map(str::to_string)
        .collect()
}
