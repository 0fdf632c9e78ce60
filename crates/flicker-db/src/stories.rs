use chrono::{DateTime, Utc};
use flicker_types::models::{
    StoryItemInput, StoryRecord, StoryReply, StorySnapshot, UserSummary, Visibility,
    normalize_reply_content,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::Database;
use crate::error::{Result, StoreError};
use crate::keys::{
    CANONICAL_STORY_PREFIX, STORY_NAMESPACE_PREFIX, backup_story_key, backup_story_prefix,
    canonical_story_key, is_canonical_story_key, is_live_story_candidate, key_embeds_id,
};
use crate::reconcile::{LookupStrategy, Resolved, parse_story};
use crate::sanitize::{rebuild_from_snapshot, validate_new_items};

/// Compare-and-swap attempts before a mutation gives up with `Conflict`.
const MAX_CAS_ATTEMPTS: u32 = 5;

/// Timestamped backups retained per story.
const BACKUPS_PER_STORY: usize = 3;

impl Database {
    // -- Writes --

    /// Unconditional overwrite under the canonical key, plus a timestamped
    /// backup copy. Returns the record as stored (with its new version).
    pub fn put(&self, id: &str, mut record: StoryRecord) -> Result<StoryRecord> {
        record.id = id.to_string();
        let key = canonical_story_key(id);
        let version = self.upsert_record_with(&key, |version| {
            record.version = version;
            Ok(serde_json::to_string(&record)?)
        })?;
        record.version = version;
        self.write_backup(&record);
        Ok(record)
    }

    /// Backups are best effort; a failed backup never fails the write it shadows.
    pub(crate) fn write_backup(&self, record: &StoryRecord) {
        let result = serde_json::to_string(record)
            .map_err(StoreError::from)
            .and_then(|raw| {
                let key = backup_story_key(&record.id, Utc::now().timestamp_millis());
                self.upsert_record(&key, &raw)
            })
            .and_then(|_| self.prune_backups(&record.id));
        if let Err(e) = result {
            warn!("Backup of story {} failed: {}", record.id, e);
        }
    }

    /// Keep the newest backups of `id`. The scan prefix also covers ids that
    /// merely start with `id:`, so rows are matched on the exact id.
    fn prune_backups(&self, id: &str) -> Result<usize> {
        let stale: Vec<String> = self
            .scan_prefix(&backup_story_prefix(id))?
            .into_iter()
            .filter(|row| key_embeds_id(&row.key, id))
            .skip(BACKUPS_PER_STORY)
            .map(|row| row.key)
            .collect();
        self.delete_records(&stale)
    }

    /// Publish a fresh story for `owner_id`.
    pub fn create_story(
        &self,
        owner_id: &str,
        owner: Option<&UserSummary>,
        visibility: Visibility,
        items: Vec<StoryItemInput>,
    ) -> Result<StoryRecord> {
        let owner_id = owner_id.trim();
        if owner_id.is_empty() {
            return Err(StoreError::validation("userId is required"));
        }
        let now = Utc::now();
        let items = validate_new_items(items, now)?;
        let user = self.remember_user(owner_id, owner)?;

        let id = uuid::Uuid::new_v4().to_string();
        let record = StoryRecord {
            id: id.clone(),
            user_id: owner_id.to_string(),
            user,
            items,
            created_at: now,
            expires_at: now + self.story_ttl(),
            visibility,
            viewer_ids: Vec::new(),
            liker_ids: Vec::new(),
            replies: Vec::new(),
            updated_at: Some(now),
            version: 0,
        };
        let stored = self.put(&id, record)?;
        info!("Story {} created by {} ({} items)", stored.id, owner_id, stored.items.len());
        Ok(stored)
    }

    /// Rebuild a story the store has lost from a client-held copy. The
    /// snapshot wins outright over anything stored under the same id.
    pub fn reconstruct_from_snapshot(&self, snapshot: &StorySnapshot) -> Result<StoryRecord> {
        let now = Utc::now();
        let rebuilt = rebuild_from_snapshot(snapshot, now, self.story_ttl())?;
        if rebuilt.record.is_expired_at(now) {
            return Err(StoreError::NotFound(rebuilt.record.id));
        }
        for user in &rebuilt.users {
            self.put_user_summary(user)?;
        }
        let id = rebuilt.record.id.clone();
        let stored = self.put(&id, rebuilt.record)?;
        info!("Story {} reconstructed from snapshot", id);
        Ok(stored)
    }

    // -- Interactions --

    /// Flip `user_id`'s like. Not idempotent: every call flips.
    pub fn toggle_like(
        &self,
        id: &str,
        user_id: &str,
        liker: Option<&UserSummary>,
        snapshot: Option<&StorySnapshot>,
    ) -> Result<(StoryRecord, bool)> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(StoreError::validation("userId is required"));
        }
        self.remember_user(user_id, liker)?;
        self.mutate_story(id, snapshot, |story| Ok(story.toggle_liker(user_id)))
    }

    /// Append a reply. The author must be known, either already stored or
    /// supplied alongside the request.
    pub fn append_reply(
        &self,
        id: &str,
        author_id: &str,
        content: &str,
        author: Option<&UserSummary>,
        snapshot: Option<&StorySnapshot>,
    ) -> Result<(StoryRecord, StoryReply)> {
        let id = id.trim();
        let author_id = author_id.trim();
        if author_id.is_empty() {
            return Err(StoreError::validation("authorId is required"));
        }
        let content = normalize_reply_content(content)
            .ok_or_else(|| StoreError::validation("reply content is empty"))?;
        let author = self
            .remember_user(author_id, author)?
            .ok_or_else(|| StoreError::validation(format!("unknown author {author_id}")))?;

        let reply = StoryReply {
            id: uuid::Uuid::new_v4().to_string(),
            story_id: id.to_string(),
            author_id: author_id.to_string(),
            author: Some(author),
            content,
            created_at: Utc::now(),
        };
        self.mutate_story(id, snapshot, |story| {
            story.replies.push(reply.clone());
            Ok(reply.clone())
        })
    }

    /// Idempotent viewer-set add.
    pub fn register_view(&self, id: &str, viewer_id: &str) -> Result<StoryRecord> {
        let id = id.trim();
        let viewer_id = viewer_id.trim();
        if viewer_id.is_empty() {
            return Err(StoreError::validation("viewerId is required"));
        }
        let current = self
            .resolve(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if current.record.has_viewer(viewer_id) {
            return Ok(current.record);
        }
        let (story, _) = self.mutate_story(id, None, |story| Ok(story.add_viewer(viewer_id)))?;
        Ok(story)
    }

    /// Resolve `id`, rebuilding it from `snapshot` when nothing is stored.
    pub fn resolve_or_heal(&self, id: &str, snapshot: Option<&StorySnapshot>) -> Result<Resolved> {
        let id = id.trim();
        if let Some(resolved) = self.resolve(id)? {
            return Ok(resolved);
        }
        let Some(snapshot) = snapshot else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        let mut snapshot = snapshot.clone();
        snapshot.id = id.to_string();
        let record = self.reconstruct_from_snapshot(&snapshot)?;
        Ok(Resolved {
            version: record.version,
            record,
            found_by: LookupStrategy::Snapshot,
            migrated_from: None,
        })
    }

    /// Read-modify-write with a version check. A lost race re-reads the
    /// record and re-applies `apply`.
    pub(crate) fn mutate_story<T, F>(
        &self,
        id: &str,
        snapshot: Option<&StorySnapshot>,
        mut apply: F,
    ) -> Result<(StoryRecord, T)>
    where
        F: FnMut(&mut StoryRecord) -> Result<T>,
    {
        let id = id.trim();
        let key = canonical_story_key(id);
        let mut current = self.resolve_or_heal(id, snapshot)?;

        for attempt in 1..=MAX_CAS_ATTEMPTS {
            let mut next = current.record.clone();
            let outcome = apply(&mut next)?;
            next.updated_at = Some(Utc::now());
            next.version = current.version + 1;

            let raw = serde_json::to_string(&next)?;
            if self.compare_and_swap(&key, current.version, &raw)? {
                self.write_backup(&next);
                return Ok((next, outcome));
            }

            debug!("Version conflict on {} (attempt {}), re-reading", key, attempt);
            current = self.resolve_or_heal(id, snapshot)?;
        }

        Err(StoreError::Conflict {
            key,
            attempts: MAX_CAS_ATTEMPTS,
        })
    }

    // -- Reads --

    /// Every well-formed, unexpired story, newest first. Unreadable records
    /// are skipped, never fatal.
    pub fn list_live(&self, now: DateTime<Utc>) -> Result<Vec<StoryRecord>> {
        let mut by_id: HashMap<String, (bool, StoryRecord)> = HashMap::new();

        for row in self.scan_all()? {
            if !is_live_story_candidate(&row.key) {
                continue;
            }
            let hint = row.key.strip_prefix(CANONICAL_STORY_PREFIX);
            let Some(mut story) = parse_story(&row.value, hint) else {
                if row.key.starts_with(STORY_NAMESPACE_PREFIX) {
                    warn!("Skipping unreadable story record {}", row.key);
                }
                continue;
            };
            if story.items.is_empty() || story.is_expired_at(now) {
                continue;
            }
            story.version = row.version;

            let canonical = is_canonical_story_key(&row.key);
            match by_id.get(&story.id) {
                Some((true, _)) => continue,
                Some((false, _)) if !canonical => continue,
                _ => {
                    by_id.insert(story.id.clone(), (canonical, story));
                }
            }
        }

        let mut stories: Vec<StoryRecord> = by_id.into_values().map(|(_, s)| s).collect();
        stories.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(stories)
    }
}
