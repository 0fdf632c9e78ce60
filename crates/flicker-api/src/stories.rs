use axum::{
    Json,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use flicker_types::api::{
    CreateStoryBody, LikeStoryRequest, LikeStoryResponse, ListStoriesQuery, ReplyStoryRequest,
    ReplyStoryResponse, StoryEnvelope, StoryListEntry, StoryListResponse, ViewStoryRequest,
};
use flicker_types::events::StoryNotification;
use flicker_types::models::Visibility;
use tracing::debug;

use crate::error::ApiError;
use crate::notify;
use crate::state::{AppState, blocking};

/// Characters of reply text carried in a notification preview.
const REPLY_PREVIEW_CHARS: usize = 80;

/// GET /stories[?viewerId=...]
pub async fn list_stories(
    State(state): State<AppState>,
    query: Result<Query<ListStoriesQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let stories = blocking(&state, |db| db.list_live(Utc::now())).await?;
    let viewer = query
        .viewer_id
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let stories = stories
        .into_iter()
        .map(|story| StoryListEntry {
            liked: viewer.map(|v| story.is_liked_by(v)),
            viewed: viewer.map(|v| story.has_viewer(v)),
            story,
        })
        .collect();

    Ok(Json(StoryListResponse { stories }))
}

/// POST /stories: a plain create, or a snapshot to rebuild from.
pub async fn create_story(
    State(state): State<AppState>,
    body: Result<Json<CreateStoryBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(body) = body?;
    let story = match body {
        CreateStoryBody::Create(req) => {
            let visibility = match req.visibility.as_deref() {
                None => Visibility::default(),
                Some(raw) => Visibility::parse_lenient(raw)
                    .ok_or_else(|| ApiError::BadRequest(format!("unknown visibility {raw:?}")))?,
            };
            blocking(&state, move |db| {
                db.create_story(&req.user_id, req.user.as_ref(), visibility, req.items)
            })
            .await?
        }
        CreateStoryBody::Snapshot(snapshot) => {
            debug!("Rebuilding story {} from submitted snapshot", snapshot.id);
            blocking(&state, move |db| db.reconstruct_from_snapshot(&snapshot)).await?
        }
    };

    Ok((StatusCode::CREATED, Json(StoryEnvelope { story })))
}

/// POST /stories/{id}/view
pub async fn view_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
    req: Result<Json<ViewStoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req?;
    let story = blocking(&state, move |db| db.register_view(&story_id, &req.viewer_id)).await?;
    Ok(Json(StoryEnvelope { story }))
}

/// POST /stories/{id}/like
pub async fn like_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
    req: Result<Json<LikeStoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req?;
    let actor_id = req.user_id.trim().to_string();
    let (story, liked) = blocking(&state, move |db| {
        db.toggle_like(
            &story_id,
            &req.user_id,
            req.liker_snapshot.as_ref(),
            req.story_snapshot.as_ref(),
        )
    })
    .await?;

    if liked {
        notify::dispatch(
            &state.notifier,
            StoryNotification::StoryLiked {
                story_id: story.id.clone(),
                owner_id: story.user_id.clone(),
                actor_id,
            },
        );
    }

    Ok(Json(LikeStoryResponse { story, liked }))
}

/// POST /stories/{id}/reply
pub async fn reply_story(
    State(state): State<AppState>,
    Path(story_id): Path<String>,
    req: Result<Json<ReplyStoryRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = req?;
    let (story, reply) = blocking(&state, move |db| {
        db.append_reply(
            &story_id,
            &req.author_id,
            &req.content,
            req.author_snapshot.as_ref(),
            req.story_snapshot.as_ref(),
        )
    })
    .await?;

    notify::dispatch(
        &state.notifier,
        StoryNotification::StoryReplied {
            story_id: story.id.clone(),
            owner_id: story.user_id.clone(),
            actor_id: reply.author_id.clone(),
            reply_id: reply.id.clone(),
            preview: reply.content.chars().take(REPLY_PREVIEW_CHARS).collect(),
        },
    );

    Ok(Json(ReplyStoryResponse { story, reply }))
}
