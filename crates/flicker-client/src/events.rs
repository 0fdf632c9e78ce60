use crate::feed::FeedState;

/// Broadcast to UI subscribers. Slow subscribers may miss events; the
/// latest `FeedChanged` always carries the full state.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    FeedChanged(FeedState),
    /// Informational, never an error: something could not be synced but
    /// local state was kept.
    Note(String),
    Queued { local_id: String },
    Published { local_id: String, story_id: String },
}
