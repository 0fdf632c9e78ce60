use async_trait::async_trait;
use flicker_types::api::{
    CreateStoryRequest, ErrorBody, LikeStoryRequest, LikeStoryResponse, ReplyStoryRequest,
    ReplyStoryResponse, StoryEnvelope, StoryFeedResponse, ViewStoryRequest,
};
use flicker_types::models::StoryRecord;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{ClientError, Result};

/// The story endpoints the engine talks to.
#[async_trait]
pub trait StoryApi: Send + Sync {
    async fn fetch_stories(&self) -> Result<Vec<StoryRecord>>;
    async fn create_story(&self, req: &CreateStoryRequest) -> Result<StoryRecord>;
    async fn toggle_like(&self, story_id: &str, req: &LikeStoryRequest) -> Result<LikeStoryResponse>;
    async fn reply(&self, story_id: &str, req: &ReplyStoryRequest) -> Result<ReplyStoryResponse>;
    async fn register_view(&self, story_id: &str, viewer_id: &str) -> Result<()>;
}

pub struct HttpStoryApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpStoryApi {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + Sync + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        Ok(check(resp).await?.json().await?)
    }
}

/// Map non-success statuses onto the error taxonomy.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&body)
        .map(|b| b.error)
        .unwrap_or(body);
    Err(match status.as_u16() {
        404 => ClientError::NotFound(message),
        400 | 422 => ClientError::Validation(message),
        status => ClientError::Upstream { status, body: message },
    })
}

#[async_trait]
impl StoryApi for HttpStoryApi {
    async fn fetch_stories(&self) -> Result<Vec<StoryRecord>> {
        let resp = self
            .client
            .get(format!("{}/stories", self.base_url))
            .send()
            .await?;
        let feed: StoryFeedResponse = check(resp).await?.json().await?;
        Ok(feed.stories)
    }

    async fn create_story(&self, req: &CreateStoryRequest) -> Result<StoryRecord> {
        let envelope: StoryEnvelope = self.post("/stories", req).await?;
        Ok(envelope.story)
    }

    async fn toggle_like(&self, story_id: &str, req: &LikeStoryRequest) -> Result<LikeStoryResponse> {
        self.post(&format!("/stories/{story_id}/like"), req).await
    }

    async fn reply(&self, story_id: &str, req: &ReplyStoryRequest) -> Result<ReplyStoryResponse> {
        self.post(&format!("/stories/{story_id}/reply"), req).await
    }

    async fn register_view(&self, story_id: &str, viewer_id: &str) -> Result<()> {
        let req = ViewStoryRequest {
            viewer_id: viewer_id.to_string(),
        };
        let _: StoryEnvelope = self.post(&format!("/stories/{story_id}/view"), &req).await?;
        Ok(())
    }
}
