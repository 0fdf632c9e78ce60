mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use tracing::info;

use flicker_api::AppStateInner;
use flicker_api::media::MediaStorage;
use flicker_api::notify::{HttpNotifier, LogNotifier, Notifier};
use flicker_db::Database;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flicker_server=debug,flicker_api=debug,flicker_db=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init store and media directory
    let db = Database::open(&config.db_path)?
        .with_story_ttl(chrono::Duration::hours(config.story_ttl_hours));
    let media = MediaStorage::new(config.media_dir.clone()).await?;

    let notifier: Arc<dyn Notifier> = match &config.notify_url {
        Some(url) => {
            info!("Notifications go to {}", url);
            Arc::new(HttpNotifier::new(url.clone()))
        }
        None => Arc::new(LogNotifier),
    };

    let app = flicker_api::router(AppStateInner::new(db, media, notifier));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Flicker server listening on {}", addr);
    info!("Stories live for {} hours", config.story_ttl_hours);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                tracing::warn!("SIGTERM handler unavailable ({}), waiting for Ctrl+C", e);
                ctrl_c.await.ok();
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
