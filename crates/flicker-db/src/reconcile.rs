//! Story resolution across key-schema drift.
//!
//! [`Database::locate`] is the one place that decides where a story lives and
//! whether it has to move. [`Database::resolve`] acts on that decision: any
//! hit outside the canonical key is rewritten under it, so the next lookup
//! for the same id is a single point read.

use chrono::Utc;
use flicker_types::models::StoryRecord;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::Database;
use crate::error::Result;
use crate::keys::{
    STORY_NAMESPACE_PREFIX, canonical_story_key, is_backup_key, is_user_key, key_embeds_id,
    legacy_story_keys,
};
use crate::models::RecordRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStrategy {
    Canonical,
    LegacyKey,
    PrefixScan,
    FullScan,
    /// Not found anywhere; rebuilt from a client snapshot.
    Snapshot,
}

/// Where a story was found.
#[derive(Debug, Clone)]
pub struct Located {
    pub key: String,
    pub strategy: LookupStrategy,
    pub record: StoryRecord,
    pub version: u64,
}

impl Located {
    pub fn needs_migration(&self) -> bool {
        self.strategy != LookupStrategy::Canonical
    }

    pub fn canonical_key(&self) -> String {
        canonical_story_key(&self.record.id)
    }
}

/// A live story, now stored under its canonical key.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub record: StoryRecord,
    /// Row version of the canonical key, used for the next compare-and-swap.
    pub version: u64,
    pub found_by: LookupStrategy,
    pub migrated_from: Option<String>,
}

impl Database {
    /// Find a story by id: canonical key, then legacy keys, then the story
    /// namespace, then everything. Expired records are still located.
    pub fn locate(&self, id: &str) -> Result<Option<Located>> {
        let id = id.trim();
        if id.is_empty() {
            return Ok(None);
        }

        let canonical = canonical_story_key(id);
        if let Some(row) = self.get_record(&canonical)? {
            match parse_story(&row.value, Some(id)) {
                Some(record) => return Ok(Some(located(row, LookupStrategy::Canonical, record))),
                None => warn!("Canonical record {} is unreadable, probing older keys", canonical),
            }
        }

        for key in legacy_story_keys(id) {
            if let Some(row) = self.get_record(&key)? {
                if let Some(record) = parse_story(&row.value, Some(id)) {
                    debug!("Story {} found under legacy key {}", id, key);
                    return Ok(Some(located(row, LookupStrategy::LegacyKey, record)));
                }
            }
        }

        for row in self.scan_prefix(STORY_NAMESPACE_PREFIX)? {
            if row.key == canonical {
                continue;
            }
            if let Some(record) = match_row(&row, id) {
                debug!("Story {} found by namespace scan at {}", id, row.key);
                return Ok(Some(located(row, LookupStrategy::PrefixScan, record)));
            }
        }

        for row in self.scan_all()? {
            if row.key.starts_with(STORY_NAMESPACE_PREFIX) || is_user_key(&row.key) {
                continue;
            }
            if let Some(record) = match_row(&row, id) {
                debug!("Story {} found by full scan at {}", id, row.key);
                return Ok(Some(located(row, LookupStrategy::FullScan, record)));
            }
        }

        Ok(None)
    }

    /// Locate a live story and move it to the canonical key if needed.
    /// `Ok(None)` means every strategy came up empty or the story expired.
    pub fn resolve(&self, id: &str) -> Result<Option<Resolved>> {
        let Some(found) = self.locate(id)? else {
            debug!("Story {} not found under any key", id);
            return Ok(None);
        };

        if found.record.is_expired_at(Utc::now()) {
            debug!("Story {} at {} has expired", id, found.key);
            return Ok(None);
        }

        if !found.needs_migration() {
            return Ok(Some(Resolved {
                record: found.record,
                version: found.version,
                found_by: LookupStrategy::Canonical,
                migrated_from: None,
            }));
        }

        self.migrate(found).map(Some)
    }

    /// Copy a located story under its canonical key. The copy is only
    /// inserted if the canonical key is still free; when a concurrent request
    /// got there first, its record (and any mutation applied since) wins.
    fn migrate(&self, found: Located) -> Result<Resolved> {
        let id = found.record.id.clone();
        let canonical = found.canonical_key();

        let mut record = found.record.clone();
        record.version = 1;
        let raw = serde_json::to_string(&record)?;
        let record = if self.insert_record_if_absent(&canonical, &raw)? {
            self.write_backup(&record);
            record
        } else {
            match self.read_canonical(&id)? {
                Some(winner) => {
                    debug!("Story {} was already migrated to {}, adopting it", id, canonical);
                    winner
                }
                None => {
                    warn!("Canonical record {} is unreadable, replacing it", canonical);
                    self.put(&id, record)?
                }
            }
        };

        // Backups stay where they are; they are the recovery trail.
        if found.key != canonical && !is_backup_key(&found.key) {
            self.delete_record(&found.key)?;
        }

        info!(
            "Migrated story {} from {} to {} ({:?})",
            record.id, found.key, canonical, found.strategy
        );
        Ok(Resolved {
            version: record.version,
            record,
            found_by: found.strategy,
            migrated_from: Some(found.key),
        })
    }

    fn read_canonical(&self, id: &str) -> Result<Option<StoryRecord>> {
        let Some(row) = self.get_record(&canonical_story_key(id))? else {
            return Ok(None);
        };
        Ok(parse_story(&row.value, Some(id)).map(|mut record| {
            record.version = row.version;
            record
        }))
    }
}

fn located(row: RecordRow, strategy: LookupStrategy, mut record: StoryRecord) -> Located {
    record.version = row.version;
    Located {
        key: row.key,
        strategy,
        record,
        version: row.version,
    }
}

/// A scanned row matches when its key embeds the id or its value carries it.
fn match_row(row: &RecordRow, id: &str) -> Option<StoryRecord> {
    if key_embeds_id(&row.key, id) {
        return parse_story(&row.value, Some(id));
    }
    let value: Value = serde_json::from_str(&row.value).ok()?;
    if value.get("id").and_then(Value::as_str) != Some(id) {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Parse a stored value as a story. With `id_hint`, a value carrying a
/// different id is rejected and a value carrying none adopts the hint.
pub(crate) fn parse_story(raw: &str, id_hint: Option<&str>) -> Option<StoryRecord> {
    let mut value: Value = serde_json::from_str(raw).ok()?;
    let obj = value.as_object_mut()?;
    if let Some(id) = id_hint {
        match obj.get("id") {
            Some(Value::String(existing)) if existing != id => return None,
            Some(Value::String(_)) => {}
            _ => {
                obj.insert("id".to_string(), Value::String(id.to_string()));
            }
        }
    }
    serde_json::from_value(value).ok()
}
