// Rotation engine - drives the screensaver state machine and sequences
// backdrop, logo and ambient color commands to the renderer.

pub mod logo;
pub mod playlist;
pub mod renderer;
pub mod surfaces;
pub mod timeline;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::ambient::gradient::GradientAnimator;
use crate::ambient::{AmbientExtractor, Regions};
use crate::models::ResolvedArtwork;
use crate::services::library::{LibraryError, LibrarySource};
use crate::services::resolver::ArtworkResolver;

use logo::{DisplayMetrics, LogoSize};
use playlist::Playlist;
use renderer::{redact, PanZoom, Renderer};
use surfaces::SurfacePair;
use timeline::{Cue, Timeline, Timing, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Loading,
    Rotating,
    Stopped,
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineState::Idle => write!(f, "idle"),
            EngineState::Loading => write!(f, "loading"),
            EngineState::Rotating => write!(f, "rotating"),
            EngineState::Stopped => write!(f, "stopped"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EngineConfig {
    pub timing: Timing,
    pub display: DisplayMetrics,
    pub regions: Regions,
    pub sample_size: u32,
    pub frame_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timing: Timing::default(),
            display: DisplayMetrics::default(),
            regions: Regions::default(),
            sample_size: 200,
            frame_interval: Duration::from_millis(33),
        }
    }
}

pub struct RotationEngine {
    library: Arc<dyn LibrarySource>,
    resolver: ArtworkResolver,
    renderer: Arc<dyn Renderer>,
    ambient: AmbientExtractor,
    gradient: GradientAnimator,
    timing: Timing,
    display: DisplayMetrics,
    playlist: Playlist,
    surfaces: SurfacePair,
    current_backdrop: Option<String>,
    current_logo: Option<String>,
    logo_visible: bool,
    state: watch::Sender<EngineState>,
}

/// Running engine task
pub struct EngineHandle {
    state: watch::Receiver<EngineState>,
    cancel: CancellationToken,
    task: JoinHandle<Result<(), LibraryError>>,
}

impl EngineHandle {
    pub fn state(&self) -> EngineState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.clone()
    }

    /// Stop rotating, leaving the last frame on screen. Returns the library
    /// error if the engine never got past loading.
    pub async fn stop(self) -> Result<(), LibraryError> {
        self.cancel.cancel();
        joined(self.task.await)
    }

    /// Keep rotating until `shutdown` completes, then stop. Returns early
    /// if the engine ends on its own, which only happens when loading fails.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<(), LibraryError>
    where
        F: std::future::Future<Output = ()>,
    {
        tokio::select! {
            _ = shutdown => {}
            result = &mut self.task => return joined(result),
        }
        self.stop().await
    }
}

fn joined(
    result: Result<Result<(), LibraryError>, tokio::task::JoinError>,
) -> Result<(), LibraryError> {
    match result {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!("Rotation engine task failed: {}", e);
            Ok(())
        }
    }
}

impl RotationEngine {
    pub fn new(
        library: Arc<dyn LibrarySource>,
        resolver: ArtworkResolver,
        renderer: Arc<dyn Renderer>,
        config: EngineConfig,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Idle);
        let gradient = GradientAnimator::new(
            renderer.clone(),
            config.timing.crossfade,
            config.frame_interval,
        );

        Self {
            library,
            resolver,
            renderer,
            ambient: AmbientExtractor::new(config.regions, config.sample_size),
            gradient,
            timing: config.timing,
            display: config.display,
            playlist: Playlist::default(),
            surfaces: SurfacePair::default(),
            current_backdrop: None,
            current_logo: None,
            logo_visible: false,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<EngineState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: EngineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::info!("Rotation engine: {} -> {}", previous, state);
        }
    }

    /// Load, deduplicate and shuffle the library. On failure the engine
    /// falls back to `Idle`.
    pub async fn load(&mut self) -> Result<usize, LibraryError> {
        self.set_state(EngineState::Loading);

        let items = match self.library.load_items().await {
            Ok(items) => items,
            Err(e) => {
                tracing::error!("Failed to load artwork library: {}", e);
                self.set_state(EngineState::Idle);
                return Err(e);
            }
        };

        let raw = items.len();
        self.playlist = Playlist::shuffled(items, &mut rand::thread_rng());
        tracing::info!(
            "Loaded {} unique items ({} before deduplication)",
            self.playlist.len(),
            raw
        );
        tracing::debug!("First items after shuffle: {:?}", self.playlist.titles(5));

        if self.playlist.is_empty() {
            self.set_state(EngineState::Idle);
            return Err(LibraryError::NoItems);
        }
        Ok(self.playlist.len())
    }

    /// Show the next displayable item. Items without a logo are skipped,
    /// trying each playlist entry at most once; returns false if none of
    /// them could be shown.
    pub async fn show_next(&mut self) -> bool {
        let attempts = self.playlist.len();

        for _ in 0..attempts {
            let Some(index) = self.playlist.advance() else {
                break;
            };
            let Some(item) = self.playlist.get_mut(index) else {
                break;
            };

            let artwork = self.resolver.resolve(item).await;
            let title = item.title.clone();

            if !artwork.is_usable() {
                tracing::debug!("Skipping '{}' (#{}): no logo from any source", title, index);
                continue;
            }

            tracing::debug!("Showing '{}' (#{})", title, index);
            self.present(&title, artwork).await;
            return true;
        }

        tracing::warn!("No displayable artwork among {} items", attempts);
        false
    }

    async fn present(&mut self, title: &str, artwork: ResolvedArtwork) {
        let ResolvedArtwork {
            backdrop_url,
            logo_url,
            ..
        } = artwork;

        let new_backdrop = backdrop_url.filter(|url| Some(url) != self.current_backdrop.as_ref());
        let logo_changes = logo_url != self.current_logo;

        // Stage the backdrop off screen first; a failed load changes nothing
        let mut pixels = None;
        if let Some(url) = &new_backdrop {
            match self.renderer.load_backdrop(self.surfaces.standby, url).await {
                Ok(decoded) => pixels = decoded,
                Err(e) => {
                    tracing::warn!("Backdrop for '{}' failed to load: {}", title, e);
                    return;
                }
            }
        }

        let transition = Transition {
            fade_out_logo: logo_changes && self.logo_visible,
            swap_backdrop: new_backdrop.is_some(),
            reveal_logo: logo_changes,
        };
        let timeline = Timeline::for_transition(transition, &self.timing);
        if timeline.is_empty() {
            tracing::debug!("'{}' is already on screen", title);
            return;
        }
        tracing::debug!(
            "Transition to '{}': {:?} over {:?}",
            title,
            transition,
            timeline.duration()
        );
        let started = Instant::now();

        for step in timeline.steps() {
            tokio::time::sleep_until(started + step.at).await;

            match step.cue {
                Cue::FadeOutLogo => {
                    self.renderer.hide_logo(self.timing.logo_fade_out).await;
                    self.logo_visible = false;
                }
                Cue::SwapBackdrop => {
                    let first = self.current_backdrop.is_none();
                    self.surfaces.swap();
                    let fade = if first {
                        Duration::ZERO
                    } else {
                        self.timing.crossfade
                    };
                    self.renderer
                        .crossfade(self.surfaces.active, self.surfaces.standby, fade)
                        .await;

                    let pan = PanZoom::random(self.timing.pan_zoom_duration(), &mut rand::thread_rng());
                    self.renderer.apply_pan_zoom(self.surfaces.active, pan).await;

                    self.current_backdrop = new_backdrop.clone();
                    if let Some(image) = pixels.take() {
                        self.update_ambient(image).await;
                    }
                }
                Cue::RevealLogo => self.reveal_logo(title, logo_url.as_deref()).await,
            }
        }
    }

    async fn update_ambient(&mut self, image: image::RgbaImage) {
        let extractor = self.ambient;
        match tokio::task::spawn_blocking(move || extractor.extract(&image)).await {
            Ok(colors) => {
                tracing::debug!(
                    "Ambient colors: {:?}",
                    colors.iter().map(|c| format!("#{:08X}", c)).collect::<Vec<_>>()
                );
                self.gradient.animate_to(colors);
            }
            Err(e) => tracing::warn!("Ambient color extraction failed: {}", e),
        }
    }

    async fn reveal_logo(&mut self, title: &str, url: Option<&str>) {
        let Some(url) = url else {
            self.current_logo = None;
            return;
        };

        let size = match self.renderer.load_logo(url).await {
            Ok(dimensions) => LogoSize::fit(dimensions, &self.display),
            Err(e) => {
                tracing::warn!("Logo for '{}' failed to load: {}", title, e);
                None
            }
        };

        match size {
            Some(size) => {
                self.renderer.show_logo(size, self.timing.logo_fade_in).await;
                self.current_logo = Some(url.to_string());
                self.logo_visible = true;
            }
            None => {
                tracing::debug!("Hiding logo, {} is unusable", redact(url));
                self.renderer.hide_logo(Duration::ZERO).await;
                self.current_logo = None;
                self.logo_visible = false;
            }
        }
    }

    /// Load the library, then show an item immediately and another on
    /// every tick until cancelled. Cancelling abandons the tick in flight.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<(), LibraryError> {
        let loaded = tokio::select! {
            _ = cancel.cancelled() => None,
            result = self.load() => Some(result),
        };
        match loaded {
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(e),
            None => {
                self.set_state(EngineState::Stopped);
                return Ok(());
            }
        }

        self.set_state(EngineState::Rotating);

        let mut ticker = tokio::time::interval(self.timing.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = self.show_next() => {}
            }
        }

        self.gradient.cancel();
        self.set_state(EngineState::Stopped);
        Ok(())
    }

    /// Run on a background task, stopped through the handle or when
    /// `parent` is cancelled.
    pub fn spawn(self, parent: &CancellationToken) -> EngineHandle {
        let cancel = parent.child_token();
        let state = self.subscribe();
        let task = tokio::spawn(self.run(cancel.clone()));

        EngineHandle {
            state,
            cancel,
            task,
        }
    }
}
