use crate::Database;
use crate::error::Result;
use crate::models::RecordRow;
use rusqlite::{Connection, OptionalExtension};

impl Database {
    // -- Single keys --

    pub fn get_record(&self, key: &str) -> Result<Option<RecordRow>> {
        self.with_conn(|conn| query_record(conn, key))
    }

    /// Unconditional write. `build` receives the version the row will carry
    /// once written, so the value can embed it. Returns that version.
    pub fn upsert_record_with<F>(&self, key: &str, build: F) -> Result<u64>
    where
        F: FnOnce(u64) -> Result<String>,
    {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let current: Option<i64> = tx
                .query_row("SELECT version FROM records WHERE key = ?1", [key], |row| row.get(0))
                .optional()?;
            let next = current.map_or(1, |v| v as u64 + 1);
            let value = build(next)?;
            tx.execute(
                "INSERT INTO records (key, value, version, updated_at)
                 VALUES (?1, ?2, ?3, datetime('now'))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    version = excluded.version,
                    updated_at = excluded.updated_at",
                rusqlite::params![key, value, next as i64],
            )?;
            tx.commit()?;
            Ok(next)
        })
    }

    /// Write `value` at version 1 unless `key` already exists. Returns false
    /// when the row was already there, leaving it untouched.
    pub fn insert_record_if_absent(&self, key: &str, value: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "INSERT INTO records (key, value, version, updated_at)
                 VALUES (?1, ?2, 1, datetime('now'))
                 ON CONFLICT(key) DO NOTHING",
                rusqlite::params![key, value],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn upsert_record(&self, key: &str, value: &str) -> Result<u64> {
        self.upsert_record_with(key, |_| Ok(value.to_string()))
    }

    /// Write `value` only if the row is still at `expected_version`; the row
    /// moves to `expected_version + 1`. Returns false when another writer got there first.
    pub fn compare_and_swap(&self, key: &str, expected_version: u64, value: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute(
                "UPDATE records SET value = ?1, version = ?2, updated_at = datetime('now')
                 WHERE key = ?3 AND version = ?4",
                rusqlite::params![value, (expected_version + 1) as i64, key, expected_version as i64],
            )?;
            Ok(changed == 1)
        })
    }

    pub fn delete_record(&self, key: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let changed = conn.execute("DELETE FROM records WHERE key = ?1", [key])?;
            Ok(changed > 0)
        })
    }

    // -- Scans --

    /// All rows whose key starts with `prefix`, newest key first.
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<RecordRow>> {
        self.with_conn(|conn| {
            // substr() rather than LIKE so '_' and '%' in ids stay literal
            let mut stmt = conn.prepare(
                "SELECT key, value, version, updated_at FROM records
                 WHERE substr(key, 1, ?2) = ?1
                 ORDER BY key DESC",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![prefix, prefix.chars().count() as i64], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Every row in the store, newest key first.
    pub fn scan_all(&self) -> Result<Vec<RecordRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value, version, updated_at FROM records ORDER BY key DESC",
            )?;
            let rows = stmt
                .query_map([], map_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Delete every listed key in one transaction. Returns how many rows went away.
    pub fn delete_records(&self, keys: &[String]) -> Result<usize> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let mut removed = 0;
            for key in keys {
                removed += tx.execute("DELETE FROM records WHERE key = ?1", [key])?;
            }
            tx.commit()?;
            Ok(removed)
        })
    }
}

fn query_record(conn: &Connection, key: &str) -> Result<Option<RecordRow>> {
    let mut stmt =
        conn.prepare("SELECT key, value, version, updated_at FROM records WHERE key = ?1")?;
    let row = stmt.query_row([key], map_row).optional()?;
    Ok(row)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        key: row.get(0)?,
        value: row.get(1)?,
        version: row.get::<_, i64>(2)? as u64,
        updated_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_bumps_version() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.upsert_record("k", "a").unwrap(), 1);
        assert_eq!(db.upsert_record("k", "b").unwrap(), 2);
        let row = db.get_record("k").unwrap().unwrap();
        assert_eq!(row.value, "b");
        assert_eq!(row.version, 2);
    }

    #[test]
    fn compare_and_swap_rejects_stale_version() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_record("k", "a").unwrap();
        assert!(db.compare_and_swap("k", 1, "b").unwrap());
        assert!(!db.compare_and_swap("k", 1, "c").unwrap());
        assert_eq!(db.get_record("k").unwrap().unwrap().value, "b");
    }

    #[test]
    fn prefix_scan_treats_underscore_literally() {
        let db = Database::open_in_memory().unwrap();
        db.upsert_record("story_1", "x").unwrap();
        db.upsert_record("storyX1", "y").unwrap();
        let rows = db.scan_prefix("story_").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, "story_1");
    }

    #[test]
    fn insert_if_absent_keeps_existing_row() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.insert_record_if_absent("k", "first").unwrap());
        assert!(!db.insert_record_if_absent("k", "second").unwrap());
        let row = db.get_record("k").unwrap().unwrap();
        assert_eq!(row.value, "first");
        assert_eq!(row.version, 1);
    }

    #[test]
    fn delete_records_counts_removed_rows() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..3 {
            db.upsert_record(&format!("p:{i}"), "v").unwrap();
        }
        let keys = vec!["p:0".to_string(), "p:2".to_string(), "p:9".to_string()];
        assert_eq!(db.delete_records(&keys).unwrap(), 2);
        let left: Vec<String> = db.scan_prefix("p:").unwrap().into_iter().map(|r| r.key).collect();
        assert_eq!(left, vec!["p:1".to_string()]);
    }
}
