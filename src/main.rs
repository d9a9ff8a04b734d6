use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod ambient;
mod config;
mod engine;
mod models;
mod prefs;
mod services;

use config::AppConfig;
use engine::renderer::LogRenderer;
use engine::RotationEngine;
use models::ArtworkSource;
use prefs::PrefsStore;
use services::fanart::FanartClient;
use services::plex::{PlexClient, PlexLibrary};
use services::plex_link::{PlexLinkClient, DEFAULT_LINK_TIMEOUT, DEFAULT_POLL_INTERVAL};
use services::provider::ArtworkProvider;
use services::resolver::ArtworkResolver;
use services::tmdb::TmdbClient;

/// Tracks all background task handles for graceful shutdown
struct BackgroundTasks {
    handles: Vec<(&'static str, JoinHandle<()>)>,
    shutdown: CancellationToken,
}

impl BackgroundTasks {
    fn new() -> Self {
        Self {
            handles: Vec::new(),
            shutdown: CancellationToken::new(),
        }
    }

    fn token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    fn spawn<F>(&mut self, name: &'static str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(future);
        self.handles.push((name, handle));
    }

    async fn shutdown(self) {
        tracing::info!("Initiating graceful shutdown...");

        self.shutdown.cancel();

        for (name, handle) in self.handles {
            tracing::debug!("Waiting for {} to finish...", name);
            match tokio::time::timeout(Duration::from_secs(10), handle).await {
                Ok(Ok(())) => tracing::debug!("{} finished cleanly", name),
                Ok(Err(e)) => tracing::warn!("{} panicked: {}", name, e),
                Err(_) => tracing::warn!("{} timed out during shutdown", name),
            }
        }

        tracing::info!("All background tasks stopped");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "plex_dream=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = AppConfig::load();
    config.paths.ensure_dirs().await?;
    config.log_config();

    let mut prefs = PrefsStore::load(config.paths.prefs_path()).await?;

    if std::env::args().any(|arg| arg == "--sign-out") {
        prefs.set_auth_token(None).await?;
        tracing::info!("Signed out, removed token from {}", prefs.path().display());
        return Ok(());
    }

    let client_identifier = match config.client_identifier.clone() {
        Some(id) => id,
        None => prefs.device_id().await?,
    };

    let token = match config
        .plex_token
        .clone()
        .or_else(|| prefs.get().auth_token.clone())
    {
        Some(token) => token,
        None => {
            let token = link_device(&client_identifier).await?;
            prefs.set_auth_token(Some(token.clone())).await?;
            token
        }
    };

    let plex = PlexClient::new(token, client_identifier);

    let server_id = match config
        .server_id
        .clone()
        .or_else(|| prefs.get().selected_server_id.clone())
    {
        Some(id) => Some(id),
        None => remember_server(&plex, &mut prefs).await,
    };
    let libraries = if config.libraries.is_empty() {
        prefs.get().selected_libraries.clone()
    } else {
        config.libraries.clone()
    };

    let library = Arc::new(PlexLibrary::new(
        Some(plex),
        server_id,
        libraries,
        config.batch_size,
    ));

    let tmdb = Arc::new(TmdbClient::new(config.tmdb_api_key.clone(), &config.language));
    let fanart = Arc::new(FanartClient::new(
        config.fanart_api_key.clone(),
        &config.language,
    ));

    let mut providers: Vec<Arc<dyn ArtworkProvider>> = Vec::new();
    for source in &config.provider_priority {
        match source {
            ArtworkSource::Fanart => providers.push(fanart.clone()),
            ArtworkSource::Tmdb => providers.push(tmdb.clone()),
            ArtworkSource::Plex => {
                tracing::debug!("Plex artwork is always consulted first, ignoring in priority")
            }
        }
    }
    let resolver = ArtworkResolver::new(providers, config.backdrop_order.clone());
    if !resolver.has_providers() {
        tracing::debug!("No supplemental providers configured, items need a Plex logo");
    }

    let engine = RotationEngine::new(
        library,
        resolver,
        Arc::new(LogRenderer::new()),
        config.engine_config(),
    );

    let mut bg_tasks = BackgroundTasks::new();
    let handle = engine.spawn(&bg_tasks.token());
    tracing::info!("Rotation engine started ({})", handle.state());

    // Periodic engine and provider cache report
    {
        let cancel = bg_tasks.token();
        let state = handle.subscribe();
        let tmdb = tmdb.clone();
        let fanart = fanart.clone();
        bg_tasks.spawn("cache-stats", async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("Cache stats task received shutdown signal");
                        break;
                    }
                    _ = tokio::time::sleep(Duration::from_secs(300)) => {
                        tracing::debug!("Rotation engine is {}", *state.borrow());
                        tracing::debug!(
                            "TMDB cache: {} entries, {} hits, {} misses",
                            tmdb.cache().len().await,
                            tmdb.cache().hits(),
                            tmdb.cache().misses()
                        );
                        tracing::debug!(
                            "Fanart.tv cache: {} entries, {} hits, {} misses",
                            fanart.cache().len().await,
                            fanart.cache().hits(),
                            fanart.cache().misses()
                        );
                    }
                }
            }
        });
    }

    let result = handle.run_until(shutdown_signal()).await;

    bg_tasks.shutdown().await;

    result?;
    tracing::info!("Screensaver stopped");
    Ok(())
}

/// Link this device to a Plex account through plex.tv/link
async fn link_device(client_identifier: &str) -> Result<String> {
    let link = PlexLinkClient::new(client_identifier);
    let code = link.request_pin().await?;

    println!();
    println!("  To sign in, visit {} and enter: {}", code.link_url, code.code);
    println!();

    let token = link
        .poll_for_auth(code.pin_id, DEFAULT_LINK_TIMEOUT, DEFAULT_POLL_INTERVAL)
        .await?;
    tracing::info!("Signed in to Plex");
    Ok(token)
}

/// Pick the first server on the account and remember it
async fn remember_server(plex: &PlexClient, prefs: &mut PrefsStore) -> Option<String> {
    let servers = match plex.discover_servers().await {
        Ok(servers) => servers,
        Err(e) => {
            tracing::warn!("Server discovery failed: {:#}", e);
            return None;
        }
    };

    let server = servers.first()?;
    tracing::info!("Selected server '{}'", server.name);

    let saved = prefs
        .update(|p| {
            p.selected_server_id = Some(server.client_identifier.clone());
            p.selected_server_name = Some(server.name.clone());
        })
        .await;
    if let Err(e) = saved {
        tracing::warn!("Failed to save server selection: {:#}", e);
    }

    Some(server.client_identifier.clone())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
