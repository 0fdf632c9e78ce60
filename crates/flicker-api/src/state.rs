use std::sync::Arc;

use flicker_db::Database;

use crate::error::ApiError;
use crate::media::MediaStorage;
use crate::notify::Notifier;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub media: MediaStorage,
    pub notifier: Arc<dyn Notifier>,
}

impl AppStateInner {
    pub fn new(db: Database, media: MediaStorage, notifier: Arc<dyn Notifier>) -> AppState {
        Arc::new(Self { db, media, notifier })
    }
}

/// Run a store call on the blocking pool.
pub async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&Database) -> flicker_db::Result<T> + Send + 'static,
{
    let state = state.clone();
    let result = tokio::task::spawn_blocking(move || f(&state.db)).await?;
    Ok(result?)
}
