use std::sync::Arc;

use async_trait::async_trait;
use flicker_types::events::StoryNotification;
use tracing::{debug, info, warn};

/// Outbound notification channel. Delivery is best effort.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &StoryNotification) -> anyhow::Result<()>;
}

/// Posts each notification as JSON to a fixed endpoint.
pub struct HttpNotifier {
    client: reqwest::Client,
    url: String,
}

impl HttpNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for HttpNotifier {
    async fn notify(&self, notification: &StoryNotification) -> anyhow::Result<()> {
        let resp = self.client.post(&self.url).json(notification).send().await?;
        if !resp.status().is_success() {
            anyhow::bail!("notification endpoint returned {}", resp.status());
        }
        Ok(())
    }
}

/// Used when no endpoint is configured.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, notification: &StoryNotification) -> anyhow::Result<()> {
        info!("Notification for {}: {:?}", notification.recipient(), notification);
        Ok(())
    }
}

/// Fire-and-forget: the request path never waits on delivery.
pub fn dispatch(notifier: &Arc<dyn Notifier>, notification: StoryNotification) {
    if notification.is_self_interaction() {
        debug!("Skipping self-interaction notification for {}", notification.recipient());
        return;
    }
    let notifier = notifier.clone();
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&notification).await {
            warn!("Notification to {} failed: {}", notification.recipient(), e);
        }
    });
}
