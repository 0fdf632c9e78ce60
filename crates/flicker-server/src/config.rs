use std::path::PathBuf;

use flicker_types::models::DEFAULT_STORY_TTL_HOURS;

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub story_ttl_hours: i64,
    /// Unset means notifications are only logged.
    pub notify_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = get("FLICKER_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("FLICKER_PORT").unwrap_or_else(|| "3000".into()).parse()?;
        let db_path: PathBuf = get("FLICKER_DB_PATH").unwrap_or_else(|| "flicker.db".into()).into();
        let media_dir: PathBuf = get("FLICKER_MEDIA_DIR").unwrap_or_else(|| "./media".into()).into();
        let story_ttl_hours: i64 = match get("FLICKER_STORY_TTL_HOURS") {
            Some(raw) => raw.parse()?,
            None => DEFAULT_STORY_TTL_HOURS,
        };
        if story_ttl_hours <= 0 {
            anyhow::bail!("FLICKER_STORY_TTL_HOURS must be positive, got {story_ttl_hours}");
        }
        let notify_url = get("FLICKER_NOTIFY_URL").filter(|u| !u.trim().is_empty());

        Ok(Self {
            host,
            port,
            db_path,
            media_dir,
            story_ttl_hours,
            notify_url,
        })
    }
}
