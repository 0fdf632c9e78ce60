//! Offline-tolerant story sync.
//!
//! The engine owns the feed state machine, the pending queue and every
//! network call the client makes. Interactions (like, reply, view) are
//! applied to the local feed first and sent in the background; publishing
//! falls back to the durable queue whenever the network is not cooperating.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use flicker_types::api::{LikeStoryRequest, LikeStoryResponse, ReplyStoryRequest, ReplyStoryResponse};
use flicker_types::models::{
    MAX_STORY_ITEMS, StoryItemInput, StoryRecord, StoryReply, StorySnapshot, UserSummary,
    Visibility, default_story_ttl, normalize_reply_content,
};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::error::{ClientError, Result};
use crate::events::SyncEvent;
use crate::feed::{FeedEvent, FeedPhase, FeedState, LOCAL_ID_PREFIX, is_local_id};
use crate::local::{FEED_CACHE_KEY, FeedCache, LocalStore, load_json, save_json};
use crate::media::{MediaStore, MediaUploadAdapter};
use crate::queue::{PendingQueue, PendingStoryPayload};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::transport::StoryApi;

const EVENT_CAPACITY: usize = 256;

/// A story the user wants to publish.
#[derive(Debug, Clone)]
pub struct StoryDraft {
    pub owner: UserSummary,
    pub visibility: Visibility,
    pub items: Vec<StoryItemInput>,
}

#[derive(Debug, Clone)]
pub enum PublishOutcome {
    Published(StoryRecord),
    /// Kept in the pending queue under this provisional id.
    Queued { local_id: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub published: usize,
    pub dropped: usize,
    pub remaining: usize,
    /// Another flush was already running.
    pub skipped: bool,
}

type LikeKey = (String, String);

/// A like or reply made on a story that only exists locally. Sent once the
/// story has a server id.
#[derive(Debug, Clone)]
enum DeferredInteraction {
    Like { user: UserSummary, liked: bool },
    Reply { author: UserSummary, content: String },
}

#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<Inner>,
}

struct Inner {
    config: SyncConfig,
    api: Arc<dyn StoryApi>,
    media: MediaUploadAdapter,
    local: Arc<dyn LocalStore>,
    queue: PendingQueue,
    feed: Mutex<FeedState>,
    online: AtomicBool,
    refresh_token: Mutex<Option<CancellationToken>>,
    refresh_seq: AtomicU64,
    shutdown: CancellationToken,
    flush_lock: tokio::sync::Mutex<()>,
    likes_in_flight: Arc<Mutex<HashSet<LikeKey>>>,
    deferred: Mutex<HashMap<String, Vec<DeferredInteraction>>>,
    events: broadcast::Sender<SyncEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        api: Arc<dyn StoryApi>,
        media: Arc<dyn MediaStore>,
        local: Arc<dyn LocalStore>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                config,
                api,
                media: MediaUploadAdapter::new(media),
                queue: PendingQueue::new(local.clone()),
                local,
                feed: Mutex::new(FeedState::default()),
                online: AtomicBool::new(true),
                refresh_token: Mutex::new(None),
                refresh_seq: AtomicU64::new(0),
                shutdown: CancellationToken::new(),
                flush_lock: tokio::sync::Mutex::new(()),
                likes_in_flight: Arc::new(Mutex::new(HashSet::new())),
                deferred: Mutex::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.inner.events.subscribe()
    }

    pub fn feed(&self) -> FeedState {
        lock(&self.inner.feed).clone()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.inner.config
    }

    pub fn is_online(&self) -> bool {
        self.inner.online.load(Ordering::SeqCst)
    }

    /// Reconnecting triggers a queue flush in the background.
    pub fn set_online(&self, online: bool) {
        let was_online = self.inner.online.swap(online, Ordering::SeqCst);
        if online == was_online {
            return;
        }
        if !online {
            info!("Network lost, new stories will be queued");
            return;
        }
        info!("Network back, flushing pending stories");
        let engine = self.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.flush_queue().await {
                warn!("Flush after reconnect failed: {}", e);
            }
        });
    }

    pub async fn pending_count(&self) -> Result<usize> {
        self.inner.queue.len().await
    }

    pub async fn pending(&self) -> Result<Vec<PendingStoryPayload>> {
        self.inner.queue.entries().await
    }

    /// Cancels any refresh in flight and stops the staleness ticker.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
    }

    // -- Feed --

    /// Load the persisted cache, then refresh if the feed is stale.
    pub async fn mount(&self) -> Result<()> {
        match load_json::<FeedCache>(self.inner.local.as_ref(), FEED_CACHE_KEY).await {
            Ok(Some(cache)) => {
                let now = Utc::now();
                let stories: Vec<StoryRecord> = cache
                    .stories
                    .into_iter()
                    .filter(|s| !s.is_expired_at(now))
                    .collect();
                debug!("Loaded {} cached stories from {}", stories.len(), cache.cached_at);
                self.apply(FeedEvent::CacheLoaded(stories));
            }
            Ok(None) => debug!("No feed cache yet"),
            Err(e) => warn!("Could not read feed cache: {}", e),
        }
        self.refresh_if_stale().await
    }

    pub fn is_stale(&self) -> bool {
        lock(&self.inner.feed).is_stale(Instant::now(), self.inner.config.staleness)
    }

    pub async fn refresh_if_stale(&self) -> Result<()> {
        if self.is_stale() {
            self.refresh().await
        } else {
            Ok(())
        }
    }

    /// Fetch the feed. A newer refresh cancels this one; a cancelled
    /// refresh returns `Ok(())` without touching the feed.
    pub async fn refresh(&self) -> Result<()> {
        let (seq, token) = self.begin_refresh();
        self.apply(FeedEvent::RefreshStarted);

        let result = if !self.is_online() {
            Err(ClientError::Offline)
        } else {
            let fetch_timeout = self.inner.config.fetch_timeout;
            tokio::select! {
                biased;
                _ = token.cancelled() => {
                    if self.is_current_refresh(seq) {
                        self.apply(FeedEvent::RefreshCancelled);
                    }
                    debug!("Refresh {} cancelled", seq);
                    return Ok(());
                }
                fetched = timeout(fetch_timeout, self.inner.api.fetch_stories()) => {
                    fetched.unwrap_or(Err(ClientError::Timeout(fetch_timeout)))
                }
            }
        };

        if !self.is_current_refresh(seq) {
            debug!("Refresh {} superseded, dropping its result", seq);
            return Ok(());
        }

        match result {
            Ok(stories) => {
                info!("Fetched {} stories", stories.len());
                self.apply(FeedEvent::RefreshSucceeded {
                    stories,
                    at: Instant::now(),
                });
                self.persist_cache().await;
                self.flush_in_background_if_pending().await;
                Ok(())
            }
            Err(e) => {
                warn!("Feed refresh failed: {}", e);
                self.apply(FeedEvent::RefreshFailed(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn dismiss_error(&self) {
        self.apply(FeedEvent::ErrorDismissed);
    }

    fn begin_refresh(&self) -> (u64, CancellationToken) {
        let token = self.inner.shutdown.child_token();
        let seq = self.inner.refresh_seq.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = lock(&self.inner.refresh_token).replace(token.clone()) {
            previous.cancel();
        }
        (seq, token)
    }

    fn is_current_refresh(&self, seq: u64) -> bool {
        self.inner.refresh_seq.load(Ordering::SeqCst) == seq
    }

    /// Periodically refetch once the feed goes stale. Stops on [`Self::shutdown`].
    pub fn spawn_staleness_ticker(&self) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(engine.inner.config.staleness_check);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = engine.inner.shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let phase = engine.feed().phase;
                        // Errors wait for an explicit retry
                        if matches!(phase, FeedPhase::Loading | FeedPhase::Error) || !engine.is_online() {
                            continue;
                        }
                        if let Err(e) = engine.refresh_if_stale().await {
                            debug!("Background refresh failed: {}", e);
                        }
                    }
                }
            }
            debug!("Staleness ticker stopped");
        })
    }

    // -- Publishing --

    pub async fn publish(&self, draft: StoryDraft) -> Result<PublishOutcome> {
        validate_draft(&draft)?;

        let now = Utc::now();
        let mut payload = PendingStoryPayload {
            local_id: format!("{LOCAL_ID_PREFIX}{}", uuid::Uuid::new_v4()),
            owner_id: draft.owner.id.clone(),
            owner: Some(draft.owner),
            visibility: draft.visibility,
            items: draft.items,
            queued_at: now,
            attempts: 0,
        };
        self.apply(FeedEvent::StoryMerged {
            story: provisional_record(&payload),
            replaces: None,
        });

        if !self.is_online() {
            let local_id = payload.local_id.clone();
            self.enqueue(payload).await?;
            return Ok(PublishOutcome::Queued { local_id });
        }

        match self.submit(&mut payload, &self.inner.config.publish_policy()).await {
            Ok(story) => {
                self.accept(&payload.local_id, story.clone()).await;
                Ok(PublishOutcome::Published(story))
            }
            Err(e) if e.is_retryable() => {
                info!("Publish of {} failed ({}), queueing", payload.local_id, e);
                let local_id = payload.local_id.clone();
                self.enqueue(payload).await?;
                Ok(PublishOutcome::Queued { local_id })
            }
            Err(e) => {
                self.discard_provisional(&payload.local_id);
                Err(e)
            }
        }
    }

    /// Publish queued stories in order. Only one flush runs at a time; a
    /// concurrent call returns a skipped report immediately.
    pub async fn flush_queue(&self) -> Result<FlushReport> {
        let Ok(_guard) = self.inner.flush_lock.try_lock() else {
            debug!("Flush already running");
            return Ok(FlushReport {
                skipped: true,
                ..FlushReport::default()
            });
        };

        let entries = self.inner.queue.entries().await?;
        let total = entries.len();
        let mut report = FlushReport::default();
        let policy = self.inner.config.flush_policy();

        for (index, mut entry) in entries.into_iter().enumerate() {
            if !self.is_online() {
                report.remaining += total - index;
                debug!("Went offline mid-flush, {} left", report.remaining);
                break;
            }
            let queued_items = entry.items.clone();
            match self.submit(&mut entry, &policy).await {
                Ok(story) => {
                    self.inner.queue.remove(&entry.local_id).await?;
                    self.accept(&entry.local_id, story).await;
                    report.published += 1;
                }
                Err(e) if e.is_retryable() => {
                    warn!("Queued story {} still failing: {}", entry.local_id, e);
                    if entry.items != queued_items {
                        self.inner.queue.update_items(&entry.local_id, entry.items).await?;
                    }
                    self.inner.queue.record_attempt(&entry.local_id).await?;
                    report.remaining += 1;
                }
                Err(e) => {
                    self.inner.queue.remove(&entry.local_id).await?;
                    self.discard_provisional(&entry.local_id);
                    self.note(format!("A queued story could not be published and was dropped: {e}"));
                    report.dropped += 1;
                }
            }
        }

        if total > 0 {
            info!(
                "Flush done: {} published, {} dropped, {} remaining",
                report.published, report.dropped, report.remaining
            );
        }
        Ok(report)
    }

    async fn flush_in_background_if_pending(&self) {
        match self.inner.queue.is_empty().await {
            Ok(true) => {}
            Ok(false) => {
                let engine = self.clone();
                tokio::spawn(async move {
                    if let Err(e) = engine.flush_queue().await {
                        warn!("Flush after refresh failed: {}", e);
                    }
                });
            }
            Err(e) => warn!("Could not read pending queue: {}", e),
        }
    }

    /// Upload embedded media, then create with retries. Uploaded locators
    /// are written back into `payload` so a later retry does not upload
    /// the same bytes again.
    async fn submit(&self, payload: &mut PendingStoryPayload, policy: &RetryPolicy) -> Result<StoryRecord> {
        payload.items = self
            .inner
            .media
            .resolve_items(&payload.items, &payload.owner_id)
            .await;
        let request = &payload.to_request(payload.items.clone());
        let api = self.inner.api.as_ref();
        let local_id = payload.local_id.as_str();
        retry_with_backoff(policy, move |attempt| {
            debug!("Publishing {} (attempt {})", local_id, attempt);
            api.create_story(request)
        })
        .await
    }

    async fn enqueue(&self, payload: PendingStoryPayload) -> Result<()> {
        let local_id = payload.local_id.clone();
        self.inner.queue.push(payload).await?;
        self.emit(SyncEvent::Queued { local_id });
        Ok(())
    }

    async fn accept(&self, local_id: &str, story: StoryRecord) {
        let story_id = story.id.clone();
        self.apply(FeedEvent::StoryMerged {
            story: story.clone(),
            replaces: Some(local_id.to_string()),
        });
        self.persist_cache().await;
        info!("Story {} published as {}", local_id, story_id);
        self.emit(SyncEvent::Published {
            local_id: local_id.to_string(),
            story_id,
        });
        self.replay_deferred(local_id, story).await;
    }

    fn discard_provisional(&self, local_id: &str) {
        if let Some(dropped) = lock(&self.inner.deferred).remove(local_id) {
            debug!("Dropping {} interactions on {}", dropped.len(), local_id);
        }
        self.apply(FeedEvent::StoryRemoved(local_id.to_string()));
    }

    /// Send the likes and replies made while `local_id` was provisional,
    /// against the record that replaced it.
    async fn replay_deferred(&self, local_id: &str, mut story: StoryRecord) {
        let Some(deferred) = lock(&self.inner.deferred).remove(local_id) else {
            return;
        };
        debug!("Replaying {} interactions from {} on {}", deferred.len(), local_id, story.id);

        let mut failed = 0;
        for interaction in deferred {
            let result = match interaction {
                DeferredInteraction::Like { user, liked } => {
                    if story.is_liked_by(&user.id) == liked {
                        continue;
                    }
                    self.send_like(&story.id, story.snapshot(), &user)
                        .await
                        .map(|resp| resp.story)
                }
                DeferredInteraction::Reply { author, content } => self
                    .send_reply(&story.id, story.snapshot(), &author, &content)
                    .await
                    .map(|resp| resp.story),
            };
            match result {
                Ok(updated) => story = updated,
                Err(e) => {
                    debug!("Deferred interaction on {} failed: {}", story.id, e);
                    failed += 1;
                }
            }
        }
        let story_id = story.id.clone();
        self.merge_remote(story).await;
        if failed > 0 {
            warn!("{} deferred interactions on {} were not sent", failed, story_id);
            self.note("Some likes or replies on your new story could not be sent.".into());
        }
    }

    // -- Interactions --

    /// Flip the like locally and sync it in the background. On a story that
    /// is still being published the like is held until the server record
    /// arrives.
    pub fn toggle_like(&self, story_id: &str, user: &UserSummary) -> Result<JoinHandle<()>> {
        let guard = InFlightGuard::acquire(&self.inner.likes_in_flight, story_id, &user.id)?;
        let (snapshot, liked) = {
            let mut feed = lock(&self.inner.feed);
            let story = feed
                .story_mut(story_id)
                .ok_or_else(|| ClientError::NotFound(story_id.to_string()))?;
            let snapshot = story.snapshot();
            let liked = story.toggle_liker(&user.id);
            if is_local_id(story_id) {
                self.defer(story_id, DeferredInteraction::Like { user: user.clone(), liked });
            }
            (snapshot, liked)
        };
        self.emit_feed();
        debug!("Story {} {} by {}", story_id, if liked { "liked" } else { "unliked" }, user.id);

        let engine = self.clone();
        let story_id = story_id.to_string();
        let user = user.clone();
        Ok(tokio::spawn(async move {
            let _guard = guard;
            if is_local_id(&story_id) {
                return;
            }
            match engine.send_like(&story_id, snapshot, &user).await {
                Ok(resp) => engine.merge_remote(resp.story).await,
                Err(e) => {
                    warn!("Like on {} not synced: {}", story_id, e);
                    engine.note(format!("Your like could not be sent: {e}"));
                }
            }
        }))
    }

    /// Append a reply locally and sync it in the background. Replies to a
    /// story that is still being published wait for the server record.
    pub fn reply(&self, story_id: &str, author: &UserSummary, content: &str) -> Result<JoinHandle<()>> {
        let content = normalize_reply_content(content)
            .ok_or_else(|| ClientError::validation("reply is empty"))?;
        let snapshot = {
            let mut feed = lock(&self.inner.feed);
            let story = feed
                .story_mut(story_id)
                .ok_or_else(|| ClientError::NotFound(story_id.to_string()))?;
            let snapshot = story.snapshot();
            story.replies.push(StoryReply {
                id: format!("{LOCAL_ID_PREFIX}{}", uuid::Uuid::new_v4()),
                story_id: story_id.to_string(),
                author_id: author.id.clone(),
                author: Some(author.clone()),
                content: content.clone(),
                created_at: Utc::now(),
            });
            if is_local_id(story_id) {
                self.defer(
                    story_id,
                    DeferredInteraction::Reply {
                        author: author.clone(),
                        content: content.clone(),
                    },
                );
            }
            snapshot
        };
        self.emit_feed();

        let engine = self.clone();
        let story_id = story_id.to_string();
        let author = author.clone();
        Ok(tokio::spawn(async move {
            if is_local_id(&story_id) {
                return;
            }
            match engine.send_reply(&story_id, snapshot, &author, &content).await {
                Ok(resp) => engine.merge_remote(resp.story).await,
                Err(e) => {
                    warn!("Reply on {} not synced: {}", story_id, e);
                    engine.note(format!("Your reply could not be sent: {e}"));
                }
            }
        }))
    }

    /// Called with the feed lock held, so `accept` either sees the
    /// interaction or the story is already gone from the feed.
    fn defer(&self, local_id: &str, interaction: DeferredInteraction) {
        let mut deferred = lock(&self.inner.deferred);
        let pending = deferred.entry(local_id.to_string()).or_default();
        // Only the last like state per user matters
        if let DeferredInteraction::Like { user, .. } = &interaction {
            pending.retain(|p| !matches!(p, DeferredInteraction::Like { user: u, .. } if u.id == user.id));
        }
        pending.push(interaction);
    }

    async fn send_like(
        &self,
        story_id: &str,
        snapshot: StorySnapshot,
        user: &UserSummary,
    ) -> Result<LikeStoryResponse> {
        self.with_self_heal(snapshot, |story_snapshot| {
            let api = self.inner.api.clone();
            let story_id = story_id.to_string();
            let req = LikeStoryRequest {
                user_id: user.id.clone(),
                liker_snapshot: Some(user.clone()),
                story_snapshot,
            };
            async move { api.toggle_like(&story_id, &req).await }
        })
        .await
    }

    async fn send_reply(
        &self,
        story_id: &str,
        snapshot: StorySnapshot,
        author: &UserSummary,
        content: &str,
    ) -> Result<ReplyStoryResponse> {
        self.with_self_heal(snapshot, |story_snapshot| {
            let api = self.inner.api.clone();
            let story_id = story_id.to_string();
            let req = ReplyStoryRequest {
                author_id: author.id.clone(),
                content: content.to_string(),
                author_snapshot: Some(author.clone()),
                story_snapshot,
            };
            async move { api.reply(&story_id, &req).await }
        })
        .await
    }

    /// Record a first view. Returns the background call, if one was made;
    /// its outcome is never surfaced.
    pub fn view(&self, story_id: &str, viewer_id: &str) -> Option<JoinHandle<()>> {
        let added = lock(&self.inner.feed)
            .story_mut(story_id)
            .is_some_and(|story| story.add_viewer(viewer_id));
        if !added {
            return None;
        }
        self.emit_feed();
        if is_local_id(story_id) || !self.is_online() {
            return None;
        }

        let api = self.inner.api.clone();
        let story_id = story_id.to_string();
        let viewer_id = viewer_id.to_string();
        Some(tokio::spawn(async move {
            match api.register_view(&story_id, &viewer_id).await {
                Ok(()) => debug!("View of {} by {} recorded", story_id, viewer_id),
                Err(e) => debug!("View of {} by {} not recorded: {}", story_id, viewer_id, e),
            }
        }))
    }

    /// Send once; on not-found send again with the snapshot so the server
    /// can rebuild the story.
    async fn with_self_heal<T, F, Fut>(&self, snapshot: StorySnapshot, mut call: F) -> Result<T>
    where
        F: FnMut(Option<StorySnapshot>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.is_online() {
            return Err(ClientError::Offline);
        }
        match call(None).await {
            Err(ClientError::NotFound(_)) => {
                debug!("Story {} missing on server, resending with snapshot", snapshot.id);
                call(Some(snapshot)).await
            }
            other => other,
        }
    }

    async fn merge_remote(&self, story: StoryRecord) {
        self.apply(FeedEvent::StoryMerged { story, replaces: None });
        self.persist_cache().await;
    }

    // -- Plumbing --

    fn apply(&self, event: FeedEvent) {
        let state = {
            let mut feed = lock(&self.inner.feed);
            feed.apply(event);
            feed.clone()
        };
        self.emit(SyncEvent::FeedChanged(state));
    }

    fn emit_feed(&self) {
        self.emit(SyncEvent::FeedChanged(self.feed()));
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine
        let _ = self.inner.events.send(event);
    }

    fn note(&self, message: String) {
        info!("{}", message);
        self.emit(SyncEvent::Note(message));
    }

    async fn persist_cache(&self) {
        let stories = {
            let feed = lock(&self.inner.feed);
            if feed.showing_sample {
                return;
            }
            feed.cacheable(self.inner.config.cache_limit)
        };
        let cache = FeedCache {
            stories,
            cached_at: Utc::now(),
        };
        if let Err(e) = save_json(self.inner.local.as_ref(), FEED_CACHE_KEY, &cache).await {
            warn!("Could not persist feed cache: {}", e);
        }
    }
}

fn validate_draft(draft: &StoryDraft) -> Result<()> {
    if draft.owner.id.trim().is_empty() {
        return Err(ClientError::validation("story has no owner"));
    }
    if draft.items.is_empty() || draft.items.len() > MAX_STORY_ITEMS {
        return Err(ClientError::validation(format!(
            "a story needs 1 to {MAX_STORY_ITEMS} items, got {}",
            draft.items.len()
        )));
    }
    Ok(())
}

/// What the feed shows while a story is being published.
fn provisional_record(payload: &PendingStoryPayload) -> StoryRecord {
    let now = payload.queued_at;
    StoryRecord {
        id: payload.local_id.clone(),
        user_id: payload.owner_id.clone(),
        user: payload.owner.clone(),
        items: payload.items.iter().cloned().map(|i| i.into_item(now)).collect(),
        created_at: now,
        expires_at: now + default_story_ttl(),
        visibility: payload.visibility,
        viewer_ids: Vec::new(),
        liker_ids: Vec::new(),
        replies: Vec::new(),
        updated_at: None,
        version: 0,
    }
}

/// Marks a (story, user) like as in flight until dropped.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<LikeKey>>>,
    key: LikeKey,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<LikeKey>>>, story_id: &str, user_id: &str) -> Result<Self> {
        let key = (story_id.to_string(), user_id.to_string());
        if !lock(set).insert(key.clone()) {
            return Err(ClientError::InFlight {
                story_id: key.0,
                user_id: key.1,
            });
        }
        Ok(Self { set: set.clone(), key })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock(&self.set).remove(&self.key);
    }
}
