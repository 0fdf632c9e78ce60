//! Storage key schema.
//!
//! Stories have been written under several key spellings over time. The
//! current spelling is [`canonical_story_key`]; older spellings are listed in
//! lookup order by [`legacy_story_keys`]. Anything else that still starts with
//! [`STORY_NAMESPACE_PREFIX`] is only reachable by scanning.

/// Version tag embedded in canonical story keys.
pub const STORY_SCHEMA_VERSION: u32 = 2;

pub const CANONICAL_STORY_PREFIX: &str = "story:v2:";
pub const BACKUP_PREFIX: &str = "backup:";
pub const BACKUP_STORY_PREFIX: &str = "backup:story:";
pub const USER_PREFIX: &str = "user:";

/// Prefix covered by the story-namespace scan (also matches `stories…`).
pub const STORY_NAMESPACE_PREFIX: &str = "story";

/// Separators that may precede an embedded id at the end of a key.
const ID_SEPARATORS: &[char] = &[':', '_', '-', '/'];

pub fn canonical_story_key(id: &str) -> String {
    format!("{CANONICAL_STORY_PREFIX}{id}")
}

/// Historical key spellings, most recent first.
pub fn legacy_story_keys(id: &str) -> Vec<String> {
    vec![
        format!("story:{id}"),
        format!("stories:{id}"),
        format!("story_{id}"),
        format!("story-{id}"),
        id.to_string(),
    ]
}

/// Backup key for one write. Millis are zero-padded so keys sort by time.
pub fn backup_story_key(id: &str, millis: i64) -> String {
    format!("{BACKUP_STORY_PREFIX}{id}:{millis:013}")
}

pub fn backup_story_prefix(id: &str) -> String {
    format!("{BACKUP_STORY_PREFIX}{id}:")
}

pub fn user_key(id: &str) -> String {
    format!("{USER_PREFIX}{id}")
}

pub fn is_canonical_story_key(key: &str) -> bool {
    key.starts_with(CANONICAL_STORY_PREFIX)
}

pub fn is_backup_key(key: &str) -> bool {
    key.starts_with(BACKUP_PREFIX)
}

pub fn is_user_key(key: &str) -> bool {
    key.starts_with(USER_PREFIX)
}

/// Whether `key` may hold a live story (anything but backups and user summaries).
pub fn is_live_story_candidate(key: &str) -> bool {
    !is_backup_key(key) && !is_user_key(key)
}

/// True when `key` is `id` itself or ends with `id` after a known separator.
/// Backup keys carry a trailing timestamp, so the id is checked one segment in.
pub fn key_embeds_id(key: &str, id: &str) -> bool {
    if id.is_empty() {
        return false;
    }
    if key == id {
        return true;
    }
    let key = match key.strip_prefix(BACKUP_STORY_PREFIX) {
        Some(rest) => return rest.rsplit_once(':').is_some_and(|(head, _)| head == id),
        None => key,
    };
    key.strip_suffix(id)
        .and_then(|head| head.chars().last())
        .is_some_and(|c| ID_SEPARATORS.contains(&c))
}
