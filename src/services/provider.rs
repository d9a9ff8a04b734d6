use async_trait::async_trait;

use crate::models::{ArtworkSource, MediaItem, ProviderImages};

/// A supplemental artwork source (TMDB, Fanart.tv).
///
/// Lookups fail soft: missing keys, network errors, non-2xx answers and
/// malformed payloads all come back as empty [`ProviderImages`].
#[async_trait]
pub trait ArtworkProvider: Send + Sync {
    fn source(&self) -> ArtworkSource;

    /// False when no API key is configured; every lookup is then empty.
    fn is_configured(&self) -> bool;

    async fn lookup_images(&self, item: &MediaItem) -> ProviderImages;
}
