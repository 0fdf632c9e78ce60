use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use flicker_client::local::{
    FEED_CACHE_KEY, FeedCache, MemoryLocalStore, PENDING_QUEUE_KEY, load_json, save_json,
};
use flicker_client::media::MediaStore;
use flicker_client::queue::PendingStoryPayload;
use flicker_client::transport::StoryApi;
use flicker_client::{
    ClientError, FeedPhase, PublishOutcome, Result, StoryDraft, SyncConfig, SyncEngine, SyncEvent,
};
use flicker_types::api::{
    CreateStoryRequest, LikeStoryRequest, LikeStoryResponse, ReplyStoryRequest, ReplyStoryResponse,
};
use flicker_types::models::{
    MediaKind, StoryItem, StoryItemInput, StoryRecord, StoryReply, UserSummary, Visibility,
    default_story_ttl,
};

// ── Fakes ───────────────────────────────────────────────────────────────

#[derive(Clone, Copy)]
enum Script {
    Ok,
    NotFound,
    Transient,
    Invalid,
    Hang,
}

#[derive(Default)]
struct FakeApi {
    server: Mutex<Vec<StoryRecord>>,
    fetch: Mutex<VecDeque<Script>>,
    create: Mutex<VecDeque<Script>>,
    like: Mutex<VecDeque<Script>>,
    reply: Mutex<VecDeque<Script>>,
    creates: Mutex<Vec<CreateStoryRequest>>,
    likes: Mutex<Vec<LikeStoryRequest>>,
    replies: Mutex<Vec<ReplyStoryRequest>>,
    views: Mutex<Vec<(String, String)>>,
    calls: AtomicUsize,
}

impl FakeApi {
    fn with_stories(stories: Vec<StoryRecord>) -> Arc<Self> {
        let api = Self::default();
        *api.server.lock().unwrap() = stories;
        Arc::new(api)
    }

    fn script(queue: &Mutex<VecDeque<Script>>, steps: &[Script]) {
        queue.lock().unwrap().extend(steps.iter().copied());
    }

    fn next(queue: &Mutex<VecDeque<Script>>) -> Script {
        queue.lock().unwrap().pop_front().unwrap_or(Script::Ok)
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn play(&self, queue: &Mutex<VecDeque<Script>>) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match Self::next(queue) {
            Script::Ok => Ok(()),
            Script::NotFound => Err(ClientError::NotFound("story".into())),
            Script::Transient => Err(ClientError::Upstream {
                status: 503,
                body: "unavailable".into(),
            }),
            Script::Invalid => Err(ClientError::validation("rejected")),
            Script::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(ClientError::Network("hung".into()))
            }
        }
    }

    fn server_story(&self, id: &str) -> StoryRecord {
        self.server
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.id == id)
            .cloned()
            .unwrap_or_else(|| story(id))
    }

    fn store(&self, updated: StoryRecord) {
        let mut server = self.server.lock().unwrap();
        server.retain(|s| s.id != updated.id);
        server.push(updated);
    }
}

#[async_trait]
impl StoryApi for FakeApi {
    async fn fetch_stories(&self) -> Result<Vec<StoryRecord>> {
        self.play(&self.fetch).await?;
        Ok(self.server.lock().unwrap().clone())
    }

    async fn create_story(&self, req: &CreateStoryRequest) -> Result<StoryRecord> {
        let n = {
            let mut creates = self.creates.lock().unwrap();
            creates.push(req.clone());
            creates.len()
        };
        self.play(&self.create).await?;
        let now = Utc::now();
        let mut created = story(&format!("srv-{n}"));
        created.user_id = req.user_id.clone();
        created.items = req.items.iter().cloned().map(|i| i.into_item(now)).collect();
        Ok(created)
    }

    async fn toggle_like(&self, story_id: &str, req: &LikeStoryRequest) -> Result<LikeStoryResponse> {
        self.likes.lock().unwrap().push(req.clone());
        self.play(&self.like).await?;
        let mut updated = self.server_story(story_id);
        let liked = updated.toggle_liker(&req.user_id);
        self.store(updated.clone());
        Ok(LikeStoryResponse { story: updated, liked })
    }

    async fn reply(&self, story_id: &str, req: &ReplyStoryRequest) -> Result<ReplyStoryResponse> {
        self.replies.lock().unwrap().push(req.clone());
        self.play(&self.reply).await?;
        let mut updated = self.server_story(story_id);
        let reply = StoryReply {
            id: format!("r{}", updated.replies.len() + 1),
            story_id: story_id.to_string(),
            author_id: req.author_id.clone(),
            author: req.author_snapshot.clone(),
            content: req.content.clone(),
            created_at: Utc::now(),
        };
        updated.replies.push(reply.clone());
        self.store(updated.clone());
        Ok(ReplyStoryResponse { story: updated, reply })
    }

    async fn register_view(&self, story_id: &str, viewer_id: &str) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.views
            .lock()
            .unwrap()
            .push((story_id.to_string(), viewer_id.to_string()));
        Ok(())
    }
}

struct FakeMedia {
    fail: bool,
    uploads: AtomicUsize,
}

#[async_trait]
impl MediaStore for FakeMedia {
    async fn upload(&self, _bytes: Vec<u8>, _mime_type: &str, _owner_id: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(ClientError::Network("blob store down".into()));
        }
        Ok("https://cdn.example/m/1".into())
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

const EMBEDDED: &str = "data:image/png;base64,AQID";

fn story(id: &str) -> StoryRecord {
    let now = Utc::now();
    StoryRecord {
        id: id.to_string(),
        user_id: "owner".into(),
        user: None,
        items: vec![StoryItem::placeholder(now)],
        created_at: now,
        expires_at: now + default_story_ttl(),
        visibility: Visibility::Friends,
        viewer_ids: vec![],
        liker_ids: vec![],
        replies: vec![],
        updated_at: None,
        version: 1,
    }
}

fn user(id: &str) -> UserSummary {
    UserSummary::bare(id)
}

fn media(fail: bool) -> Arc<FakeMedia> {
    Arc::new(FakeMedia {
        fail,
        uploads: AtomicUsize::new(0),
    })
}

fn draft(items: Vec<StoryItemInput>) -> StoryDraft {
    StoryDraft {
        owner: user("u1"),
        visibility: Visibility::Friends,
        items,
    }
}

fn image(url: &str) -> StoryItemInput {
    StoryItemInput::new(MediaKind::Image, url)
}

fn pending(local_id: &str) -> PendingStoryPayload {
    PendingStoryPayload {
        local_id: local_id.to_string(),
        owner_id: "u1".into(),
        owner: Some(user("u1")),
        visibility: Visibility::Public,
        items: vec![image("https://cdn/q.jpg")],
        queued_at: Utc::now(),
        attempts: 0,
    }
}

fn engine_with(api: &Arc<FakeApi>, media: &Arc<FakeMedia>, local: &Arc<MemoryLocalStore>) -> SyncEngine {
    SyncEngine::new(SyncConfig::default(), api.clone(), media.clone(), local.clone())
}

fn drain(rx: &mut tokio::sync::broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

// ── Feed ────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn fetch_caches_first_thirty_in_server_order() {
    let api = FakeApi::with_stories((0..40).map(|i| story(&format!("s{i}"))).collect());
    let local = Arc::new(MemoryLocalStore::new());
    let engine = engine_with(&api, &media(false), &local);

    engine.mount().await.unwrap();

    let feed = engine.feed();
    assert_eq!(feed.phase, FeedPhase::Live);
    assert_eq!(feed.stories.len(), 40);

    let cache: FeedCache = load_json(local.as_ref(), FEED_CACHE_KEY).await.unwrap().unwrap();
    let cached: Vec<String> = cache.stories.iter().map(|s| s.id.clone()).collect();
    let expected: Vec<String> = (0..30).map(|i| format!("s{i}")).collect();
    assert_eq!(cached, expected);
}

#[tokio::test(start_paused = true)]
async fn cold_start_failure_shows_sample() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.fetch, &[Script::Transient]);
    let local = Arc::new(MemoryLocalStore::new());
    let engine = engine_with(&api, &media(false), &local);

    assert!(engine.mount().await.is_err());

    let feed = engine.feed();
    assert_eq!(feed.phase, FeedPhase::Error);
    assert!(feed.showing_sample);
    assert!(!feed.stories.is_empty());
    assert!(feed.last_error.is_some());
    let cache: Option<FeedCache> = load_json(local.as_ref(), FEED_CACHE_KEY).await.unwrap();
    assert!(cache.is_none());

    engine.dismiss_error();
    assert_eq!(engine.feed().phase, FeedPhase::Cached);
}

#[tokio::test(start_paused = true)]
async fn fetch_timeout_keeps_cached_stories() {
    let api = FakeApi::with_stories(vec![story("fresh")]);
    FakeApi::script(&api.fetch, &[Script::Hang]);
    let local = Arc::new(MemoryLocalStore::new());
    let cache = FeedCache {
        stories: vec![story("c1")],
        cached_at: Utc::now(),
    };
    save_json(local.as_ref(), FEED_CACHE_KEY, &cache).await.unwrap();
    let engine = engine_with(&api, &media(false), &local);

    let started = tokio::time::Instant::now();
    let err = engine.mount().await.unwrap_err();
    assert!(matches!(err, ClientError::Timeout(_)));
    assert!(started.elapsed() >= Duration::from_millis(4_500));
    assert!(started.elapsed() < Duration::from_secs(5));

    let feed = engine.feed();
    assert_eq!(feed.phase, FeedPhase::Error);
    assert!(!feed.showing_sample);
    assert_eq!(feed.stories[0].id, "c1");

    // explicit retry succeeds
    engine.refresh().await.unwrap();
    assert_eq!(engine.feed().stories[0].id, "fresh");
}

#[tokio::test(start_paused = true)]
async fn newer_refresh_supersedes_older() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    FakeApi::script(&api.fetch, &[Script::Hang]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));

    let background = engine.clone();
    let first = tokio::spawn(async move { background.refresh().await });
    tokio::time::sleep(Duration::from_millis(10)).await;

    engine.refresh().await.unwrap();
    first.await.unwrap().unwrap();
    assert_eq!(engine.feed().phase, FeedPhase::Live);
}

#[tokio::test(start_paused = true)]
async fn shutdown_cancels_refresh_in_flight() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.fetch, &[Script::Hang]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));

    let background = engine.clone();
    let refresh = tokio::spawn(async move { background.refresh().await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(engine.feed().phase, FeedPhase::Loading);

    engine.shutdown();
    refresh.await.unwrap().unwrap();
    assert_eq!(engine.feed().phase, FeedPhase::Cold);
}

#[tokio::test(start_paused = true)]
async fn stale_feed_is_refetched_in_background() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.refresh().await.unwrap();
    assert_eq!(api.calls(), 1);

    let ticker = engine.spawn_staleness_ticker();
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(api.calls(), 1);
    assert!(!engine.is_stale());

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert!(api.calls() >= 2);

    engine.shutdown();
    ticker.await.unwrap();
}

// ── Publishing ──────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn offline_publish_queues_without_network() {
    let api = FakeApi::with_stories(vec![]);
    let media = media(false);
    let engine = engine_with(&api, &media, &Arc::new(MemoryLocalStore::new()));
    engine.set_online(false);

    let items = vec![image(EMBEDDED), image("https://cdn/2.jpg")];
    let outcome = engine.publish(draft(items.clone())).await.unwrap();
    let PublishOutcome::Queued { local_id } = outcome else {
        panic!("expected the story to be queued");
    };

    assert_eq!(api.calls(), 0);
    assert_eq!(media.uploads.load(Ordering::SeqCst), 0);

    let queued = engine.pending().await.unwrap();
    assert_eq!(queued.len(), 1);
    assert_eq!(queued[0].local_id, local_id);
    assert_eq!(queued[0].items, items);
    assert!(engine.feed().story(&local_id).is_some());
}

#[tokio::test(start_paused = true)]
async fn publish_retries_then_replaces_provisional_story() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Transient]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    let mut rx = engine.subscribe();

    let outcome = engine.publish(draft(vec![image("https://cdn/1.jpg")])).await.unwrap();
    let PublishOutcome::Published(story) = outcome else {
        panic!("expected a published story");
    };
    assert_eq!(story.id, "srv-2");
    assert_eq!(api.creates.lock().unwrap().len(), 2);

    let feed = engine.feed();
    assert_eq!(feed.stories.len(), 1);
    assert_eq!(feed.stories[0].id, "srv-2");
    assert!(drain(&mut rx)
        .iter()
        .any(|e| matches!(e, SyncEvent::Published { story_id, .. } if story_id == "srv-2")));
}

#[tokio::test(start_paused = true)]
async fn publish_exhausting_retries_queues() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Transient, Script::Transient, Script::Transient]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));

    let outcome = engine.publish(draft(vec![image("https://cdn/1.jpg")])).await.unwrap();
    assert!(matches!(outcome, PublishOutcome::Queued { .. }));
    assert_eq!(api.creates.lock().unwrap().len(), 3);
    assert_eq!(engine.pending_count().await.unwrap(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_drafts_are_never_queued() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Invalid]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));

    let err = engine.publish(draft(vec![])).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    let six = (0..6).map(|i| image(&format!("https://cdn/{i}.jpg"))).collect();
    assert!(matches!(engine.publish(draft(six)).await, Err(ClientError::Validation(_))));
    assert_eq!(api.calls(), 0);

    let err = engine.publish(draft(vec![image("https://cdn/1.jpg")])).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert_eq!(engine.pending_count().await.unwrap(), 0);
    assert!(engine.feed().stories.is_empty());
}

#[tokio::test(start_paused = true)]
async fn adapter_failure_keeps_embedded_payload() {
    let api = FakeApi::with_stories(vec![]);
    let media = media(true);
    let engine = engine_with(&api, &media, &Arc::new(MemoryLocalStore::new()));

    engine.publish(draft(vec![image(EMBEDDED)])).await.unwrap();

    assert_eq!(media.uploads.load(Ordering::SeqCst), 1);
    let creates = api.creates.lock().unwrap();
    assert_eq!(creates[0].items[0].media_url.as_deref(), Some(EMBEDDED));
}

#[tokio::test(start_paused = true)]
async fn embedded_media_is_uploaded_before_submit() {
    let api = FakeApi::with_stories(vec![]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));

    engine.publish(draft(vec![image(EMBEDDED)])).await.unwrap();

    let creates = api.creates.lock().unwrap();
    assert_eq!(creates[0].items[0].media_url.as_deref(), Some("https://cdn.example/m/1"));
}

#[tokio::test(start_paused = true)]
async fn queued_story_keeps_uploaded_locator() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Transient, Script::Transient, Script::Transient]);
    let media = media(false);
    let engine = engine_with(&api, &media, &Arc::new(MemoryLocalStore::new()));

    let outcome = engine.publish(draft(vec![image(EMBEDDED)])).await.unwrap();
    assert!(matches!(outcome, PublishOutcome::Queued { .. }));
    let queued = engine.pending().await.unwrap();
    assert_eq!(queued[0].items[0].media_url.as_deref(), Some("https://cdn.example/m/1"));

    let report = engine.flush_queue().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(media.uploads.load(Ordering::SeqCst), 1);
    let creates = api.creates.lock().unwrap();
    assert_eq!(creates.len(), 4);
    assert_eq!(creates[3].items[0].media_url.as_deref(), Some("https://cdn.example/m/1"));
}

// ── Queue flush ─────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn failed_flush_stores_uploaded_locator() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Transient, Script::Transient]);
    let media = media(false);
    let local = Arc::new(MemoryLocalStore::new());
    let mut entry = pending("local-a");
    entry.items = vec![image(EMBEDDED)];
    save_json(local.as_ref(), PENDING_QUEUE_KEY, &vec![entry]).await.unwrap();
    let engine = engine_with(&api, &media, &local);

    let report = engine.flush_queue().await.unwrap();
    assert_eq!(report.remaining, 1);
    let left = engine.pending().await.unwrap();
    assert_eq!(left[0].items[0].media_url.as_deref(), Some("https://cdn.example/m/1"));
    assert_eq!(left[0].attempts, 1);

    let report = engine.flush_queue().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(media.uploads.load(Ordering::SeqCst), 1);
    assert!(engine.pending().await.unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn flush_keeps_failed_entry_and_merges_the_rest() {
    let api = FakeApi::with_stories(vec![]);
    // two attempts for the first entry, then the second succeeds
    FakeApi::script(&api.create, &[Script::Transient, Script::Transient, Script::Ok]);
    let local = Arc::new(MemoryLocalStore::new());
    save_json(local.as_ref(), PENDING_QUEUE_KEY, &vec![pending("local-a"), pending("local-b")])
        .await
        .unwrap();
    let engine = engine_with(&api, &media(false), &local);

    let report = engine.flush_queue().await.unwrap();
    assert_eq!(report.published, 1);
    assert_eq!(report.remaining, 1);
    assert!(!report.skipped);

    let left = engine.pending().await.unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].local_id, "local-a");
    assert_eq!(left[0].attempts, 1);

    assert!(engine.feed().story("srv-3").is_some());
    let cache: FeedCache = load_json(local.as_ref(), FEED_CACHE_KEY).await.unwrap().unwrap();
    assert_eq!(cache.stories.len(), 1);
    assert_eq!(cache.stories[0].id, "srv-3");
}

#[tokio::test(start_paused = true)]
async fn flush_drops_rejected_entries_with_a_note() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Invalid]);
    let local = Arc::new(MemoryLocalStore::new());
    save_json(local.as_ref(), PENDING_QUEUE_KEY, &vec![pending("local-a")])
        .await
        .unwrap();
    let engine = engine_with(&api, &media(false), &local);
    let mut rx = engine.subscribe();

    let report = engine.flush_queue().await.unwrap();
    assert_eq!(report.dropped, 1);
    assert_eq!(engine.pending_count().await.unwrap(), 0);
    assert!(drain(&mut rx).iter().any(|e| matches!(e, SyncEvent::Note(_))));
}

#[tokio::test(start_paused = true)]
async fn reconnect_flushes_queue() {
    let api = FakeApi::with_stories(vec![]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.set_online(false);
    let PublishOutcome::Queued { local_id } =
        engine.publish(draft(vec![image("https://cdn/1.jpg")])).await.unwrap()
    else {
        panic!("expected the story to be queued");
    };
    let mut rx = engine.subscribe();

    engine.set_online(true);

    let published = tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match rx.recv().await {
                Ok(SyncEvent::Published { local_id: id, story_id }) if id == local_id => break story_id,
                Ok(_) => continue,
                Err(e) => panic!("event stream closed: {e}"),
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(engine.pending_count().await.unwrap(), 0);
    let feed = engine.feed();
    assert!(feed.story(&published).is_some());
    assert!(feed.story(&local_id).is_none());
}

// ── Interactions ────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn like_not_found_retries_with_pre_mutation_snapshot() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    FakeApi::script(&api.like, &[Script::NotFound]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.refresh().await.unwrap();

    engine.toggle_like("s1", &user("u2")).unwrap().await.unwrap();

    let likes = api.likes.lock().unwrap().clone();
    assert_eq!(likes.len(), 2);
    assert!(likes[0].story_snapshot.is_none());
    let snapshot = likes[1].story_snapshot.as_ref().unwrap();
    assert_eq!(snapshot.id, "s1");
    assert!(snapshot.likes.is_empty());

    assert_eq!(engine.feed().story("s1").unwrap().liker_ids, vec!["u2".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn like_failure_keeps_optimistic_state() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    FakeApi::script(&api.like, &[Script::Transient]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.refresh().await.unwrap();
    let mut rx = engine.subscribe();

    engine.toggle_like("s1", &user("u2")).unwrap().await.unwrap();

    assert_eq!(api.likes.lock().unwrap().len(), 1);
    assert_eq!(engine.feed().story("s1").unwrap().liker_ids, vec!["u2".to_string()]);
    let events = drain(&mut rx);
    assert!(events.iter().any(|e| matches!(e, SyncEvent::Note(_))));
    assert_eq!(engine.feed().phase, FeedPhase::Live);
}

#[tokio::test(start_paused = true)]
async fn duplicate_like_in_flight_is_rejected() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    FakeApi::script(&api.like, &[Script::Hang]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.refresh().await.unwrap();

    let first = engine.toggle_like("s1", &user("u2")).unwrap();
    let second = engine.toggle_like("s1", &user("u2"));
    assert!(matches!(second, Err(ClientError::InFlight { .. })));

    // other users are independent
    engine.toggle_like("s1", &user("u3")).unwrap().await.unwrap();

    first.await.unwrap();
    assert!(engine.toggle_like("s1", &user("u2")).is_ok());
}

#[tokio::test(start_paused = true)]
async fn reply_is_validated_and_synced() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.refresh().await.unwrap();

    assert!(matches!(
        engine.reply("s1", &user("u2"), "   "),
        Err(ClientError::Validation(_))
    ));

    engine.reply("s1", &user("u2"), "  hello  ").unwrap().await.unwrap();
    let replies = engine.feed().story("s1").unwrap().replies.clone();
    assert_eq!(replies.len(), 1);
    assert_eq!(replies[0].id, "r1");
    assert_eq!(replies[0].content, "hello");
}

#[tokio::test(start_paused = true)]
async fn reply_not_found_retries_with_pre_mutation_snapshot() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    FakeApi::script(&api.reply, &[Script::NotFound]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.refresh().await.unwrap();

    engine.reply("s1", &user("u2"), "hello").unwrap().await.unwrap();

    let replies = api.replies.lock().unwrap().clone();
    assert_eq!(replies.len(), 2);
    assert!(replies[0].story_snapshot.is_none());
    let snapshot = replies[1].story_snapshot.as_ref().unwrap();
    assert_eq!(snapshot.id, "s1");
    assert!(snapshot.replies.is_empty());
    assert_eq!(replies[1].content, "hello");

    let synced = engine.feed().story("s1").unwrap().replies.clone();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].id, "r1");
}

#[tokio::test(start_paused = true)]
async fn interactions_on_provisional_story_follow_it_to_the_server() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Transient, Script::Transient, Script::Transient]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    let PublishOutcome::Queued { local_id } =
        engine.publish(draft(vec![image("https://cdn/1.jpg")])).await.unwrap()
    else {
        panic!("expected the story to be queued");
    };

    engine.toggle_like(&local_id, &user("u2")).unwrap().await.unwrap();
    engine.reply(&local_id, &user("u3"), "first!").unwrap().await.unwrap();
    // liked then unliked before publishing: nothing to send
    engine.toggle_like(&local_id, &user("u4")).unwrap().await.unwrap();
    engine.toggle_like(&local_id, &user("u4")).unwrap().await.unwrap();
    assert!(api.likes.lock().unwrap().is_empty());
    assert!(api.replies.lock().unwrap().is_empty());

    let report = engine.flush_queue().await.unwrap();
    assert_eq!(report.published, 1);

    let likes = api.likes.lock().unwrap().clone();
    assert_eq!(likes.len(), 1);
    assert_eq!(likes[0].user_id, "u2");
    assert_eq!(api.replies.lock().unwrap().len(), 1);

    let feed = engine.feed();
    assert!(feed.story(&local_id).is_none());
    let published = feed.story("srv-4").unwrap();
    assert_eq!(published.liker_ids, vec!["u2".to_string()]);
    assert_eq!(published.replies.len(), 1);
    assert_eq!(published.replies[0].content, "first!");
}

#[tokio::test(start_paused = true)]
async fn unsent_provisional_interactions_are_reported() {
    let api = FakeApi::with_stories(vec![]);
    FakeApi::script(&api.create, &[Script::Transient, Script::Transient, Script::Transient]);
    FakeApi::script(&api.reply, &[Script::Invalid]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    let PublishOutcome::Queued { local_id } =
        engine.publish(draft(vec![image("https://cdn/1.jpg")])).await.unwrap()
    else {
        panic!("expected the story to be queued");
    };
    engine.reply(&local_id, &user("u3"), "hi").unwrap().await.unwrap();
    let mut rx = engine.subscribe();

    assert_eq!(engine.flush_queue().await.unwrap().published, 1);

    assert_eq!(api.replies.lock().unwrap().len(), 1);
    let notes = drain(&mut rx)
        .into_iter()
        .filter(|e| matches!(e, SyncEvent::Note(_)))
        .count();
    assert_eq!(notes, 1);
    assert!(engine.feed().story("srv-4").unwrap().replies.is_empty());
}

#[tokio::test(start_paused = true)]
async fn view_is_recorded_once() {
    let api = FakeApi::with_stories(vec![story("s1")]);
    let engine = engine_with(&api, &media(false), &Arc::new(MemoryLocalStore::new()));
    engine.refresh().await.unwrap();

    engine.view("s1", "v1").unwrap().await.unwrap();
    assert!(engine.view("s1", "v1").is_none());
    assert!(engine.view("missing", "v1").is_none());

    assert_eq!(api.views.lock().unwrap().len(), 1);
    assert_eq!(engine.feed().story("s1").unwrap().viewer_ids, vec!["v1".to_string()]);
}
