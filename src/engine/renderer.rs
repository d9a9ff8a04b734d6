use async_trait::async_trait;
use image::RgbaImage;
use rand::Rng;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use super::logo::LogoSize;
use super::surfaces::Surface;
use crate::ambient::gradient::GradientStops;

const PAN_SCALE: f32 = 1.08;
const PAN_DISTANCE_PX: f32 = 40.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("failed to decode {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },

    #[error("image decoding task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Ken Burns move: a slight zoom and a slow horizontal pan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PanZoom {
    pub scale: f32,
    pub from_x: f32,
    pub to_x: f32,
    pub duration: Duration,
}

impl PanZoom {
    /// Pan across the full travel in a random direction
    pub fn random<R: Rng + ?Sized>(duration: Duration, rng: &mut R) -> Self {
        let from_x = if rng.gen_bool(0.5) {
            -PAN_DISTANCE_PX
        } else {
            PAN_DISTANCE_PX
        };
        Self {
            scale: PAN_SCALE,
            from_x,
            to_x: -from_x,
            duration,
        }
    }
}

/// Display side of the screensaver. The engine only issues commands; how
/// images reach the screen is up to the implementation.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load a backdrop into a hidden surface. Implementations that decode
    /// the image return its pixels for ambient color sampling.
    async fn load_backdrop(
        &self,
        surface: Surface,
        url: &str,
    ) -> Result<Option<RgbaImage>, RenderError>;

    /// Fade `show` in and `hide` out; a zero duration is an instant cut
    async fn crossfade(&self, show: Surface, hide: Surface, duration: Duration);

    async fn apply_pan_zoom(&self, surface: Surface, pan_zoom: PanZoom);

    /// Load the title logo, returning its intrinsic size
    async fn load_logo(&self, url: &str) -> Result<(u32, u32), RenderError>;

    async fn show_logo(&self, size: LogoSize, fade: Duration);

    async fn hide_logo(&self, fade: Duration);

    /// One set of stops per ambient region, left to right
    async fn update_gradient(&self, regions: &[GradientStops]);
}

/// Plex image URLs carry the account token in the query string
pub fn redact(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

/// Headless renderer: fetches and decodes images so ambient colors are
/// real, and logs every display command.
pub struct LogRenderer {
    client: Client,
}

impl LogRenderer {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>, RenderError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| RenderError::Fetch {
                url: redact(url).to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(RenderError::Status {
                url: redact(url).to_string(),
                status: response.status(),
            });
        }

        let bytes = response.bytes().await.map_err(|source| RenderError::Fetch {
            url: redact(url).to_string(),
            source,
        })?;
        Ok(bytes.to_vec())
    }
}

impl Default for LogRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Renderer for LogRenderer {
    async fn load_backdrop(
        &self,
        surface: Surface,
        url: &str,
    ) -> Result<Option<RgbaImage>, RenderError> {
        let bytes = self.fetch(url).await?;
        let name = redact(url).to_string();

        let decoded = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|img| img.to_rgba8())
                .map_err(|source| RenderError::Decode { url: name, source })
        })
        .await??;

        tracing::info!(
            "Loaded backdrop {}x{} into {} surface: {}",
            decoded.width(),
            decoded.height(),
            surface,
            redact(url)
        );
        Ok(Some(decoded))
    }

    async fn crossfade(&self, show: Surface, hide: Surface, duration: Duration) {
        tracing::info!("Crossfade {} -> {} over {:?}", hide, show, duration);
    }

    async fn apply_pan_zoom(&self, surface: Surface, pan_zoom: PanZoom) {
        tracing::debug!(
            "Pan {} surface x {} -> {} at {}x over {:?}",
            surface,
            pan_zoom.from_x,
            pan_zoom.to_x,
            pan_zoom.scale,
            pan_zoom.duration
        );
    }

    async fn load_logo(&self, url: &str) -> Result<(u32, u32), RenderError> {
        let bytes = self.fetch(url).await?;
        let name = redact(url).to_string();

        let dimensions = tokio::task::spawn_blocking(move || {
            image::load_from_memory(&bytes)
                .map(|img| (img.width(), img.height()))
                .map_err(|source| RenderError::Decode { url: name, source })
        })
        .await??;

        tracing::info!("Loaded logo {}x{}: {}", dimensions.0, dimensions.1, redact(url));
        Ok(dimensions)
    }

    async fn show_logo(&self, size: LogoSize, fade: Duration) {
        tracing::info!(
            "Show logo at {}x{}px, fade in over {:?}",
            size.width_px,
            size.height_px,
            fade
        );
    }

    async fn hide_logo(&self, fade: Duration) {
        tracing::info!("Hide logo over {:?}", fade);
    }

    async fn update_gradient(&self, regions: &[GradientStops]) {
        tracing::trace!(
            "Gradient {:?}",
            regions
                .iter()
                .map(|r| format!("#{:08X}", r.base()))
                .collect::<Vec<_>>()
        );
    }
}
