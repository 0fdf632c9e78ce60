use flicker_types::models::UserSummary;
use tracing::warn;

use crate::Database;
use crate::error::{Result, StoreError};
use crate::keys::user_key;

impl Database {
    // -- User summaries --

    pub fn put_user_summary(&self, user: &UserSummary) -> Result<()> {
        if user.id.trim().is_empty() {
            return Err(StoreError::validation("user summary is missing its id"));
        }
        let raw = serde_json::to_string(user)?;
        self.upsert_record(&user_key(user.id.trim()), &raw)?;
        Ok(())
    }

    pub fn get_user_summary(&self, id: &str) -> Result<Option<UserSummary>> {
        let Some(row) = self.get_record(&user_key(id.trim()))? else {
            return Ok(None);
        };
        match serde_json::from_str(&row.value) {
            Ok(user) => Ok(Some(user)),
            Err(e) => {
                warn!("Unreadable user summary {}: {}", row.key, e);
                Ok(None)
            }
        }
    }

    /// Store `supplied` if it describes `user_id`, otherwise fall back to what
    /// is already stored.
    pub fn remember_user(&self, user_id: &str, supplied: Option<&UserSummary>) -> Result<Option<UserSummary>> {
        match supplied.filter(|u| u.id == user_id) {
            Some(user) => {
                self.put_user_summary(user)?;
                Ok(Some(user.clone()))
            }
            None => self.get_user_summary(user_id),
        }
    }
}
