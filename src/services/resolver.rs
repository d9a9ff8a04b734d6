use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::guid::extract_provider_id;
use super::provider::ArtworkProvider;
use crate::models::{ArtworkSource, MediaItem, ProviderImages, ResolvedArtwork};

/// One step of the backdrop fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackdropSource {
    Fanart,
    Tmdb,
    PlexArt,
    PlexThumb,
}

impl BackdropSource {
    pub fn default_order() -> Vec<BackdropSource> {
        vec![
            BackdropSource::Fanart,
            BackdropSource::PlexArt,
            BackdropSource::Tmdb,
            BackdropSource::PlexThumb,
        ]
    }

    fn provider(&self) -> Option<ArtworkSource> {
        match self {
            BackdropSource::Fanart => Some(ArtworkSource::Fanart),
            BackdropSource::Tmdb => Some(ArtworkSource::Tmdb),
            BackdropSource::PlexArt | BackdropSource::PlexThumb => None,
        }
    }
}

/// Merges Plex metadata with the supplemental providers into one
/// backdrop + logo pair per item.
pub struct ArtworkResolver {
    providers: Vec<Arc<dyn ArtworkProvider>>,
    backdrop_order: Vec<BackdropSource>,
}

/// Provider answers for a single resolve call, fetched on first use
struct Lookups<'a> {
    item: &'a MediaItem,
    providers: &'a [Arc<dyn ArtworkProvider>],
    results: Vec<Option<ProviderImages>>,
}

impl<'a> Lookups<'a> {
    fn new(item: &'a MediaItem, providers: &'a [Arc<dyn ArtworkProvider>]) -> Self {
        Self {
            item,
            providers,
            results: vec![None; providers.len()],
        }
    }

    async fn get(&mut self, index: usize) -> &ProviderImages {
        if self.results[index].is_none() {
            let provider = &self.providers[index];
            let images = if provider.is_configured() {
                provider.lookup_images(self.item).await
            } else {
                ProviderImages::empty()
            };
            self.results[index] = Some(images);
        }
        self.results[index].get_or_insert_with(ProviderImages::empty)
    }
}

impl ArtworkResolver {
    /// `providers` are consulted for logos in the order given
    pub fn new(
        providers: Vec<Arc<dyn ArtworkProvider>>,
        backdrop_order: Vec<BackdropSource>,
    ) -> Self {
        Self {
            providers,
            backdrop_order,
        }
    }

    pub fn has_providers(&self) -> bool {
        self.providers.iter().any(|p| p.is_configured())
    }

    /// Resolve artwork for an item, writing usable results back onto it.
    ///
    /// Memoized items return immediately. Otherwise the logo comes from
    /// Plex or the first provider (in priority order) that has one, and the
    /// backdrop from the first non-empty entry of the backdrop order.
    pub async fn resolve(&self, item: &mut MediaItem) -> ResolvedArtwork {
        if let Some(memoized) = item.memoized() {
            tracing::debug!("Using memoized artwork for '{}'", item.title);
            return memoized;
        }

        let resolved = {
            let mut lookups = Lookups::new(item, &self.providers);
            let (logo_url, logo_source) = self.resolve_logo(&mut lookups).await;
            let (backdrop_url, backdrop_source) = self.resolve_backdrop(&mut lookups).await;
            ResolvedArtwork {
                backdrop_url,
                logo_url,
                backdrop_source,
                logo_source,
            }
        };

        tracing::debug!(
            "Resolved '{}': backdrop from {}, logo from {}",
            item.title,
            resolved
                .backdrop_source
                .map_or_else(|| "nowhere".to_string(), |s| s.to_string()),
            resolved
                .logo_source
                .map_or_else(|| "nowhere".to_string(), |s| s.to_string()),
        );

        if resolved.is_usable() {
            item.resolved_backdrop_url = resolved.backdrop_url.clone();
            item.resolved_logo_url = resolved.logo_url.clone();
            item.resolved_backdrop_source = resolved.backdrop_source;
            item.resolved_logo_source = resolved.logo_source;
        } else {
            tracing::debug!(
                "No logo for '{}' (imdb {})",
                item.title,
                extract_provider_id(&item.guids, "imdb").unwrap_or("unknown")
            );
        }

        resolved
    }

    async fn resolve_logo(
        &self,
        lookups: &mut Lookups<'_>,
    ) -> (Option<String>, Option<ArtworkSource>) {
        if let Some(logo) = &lookups.item.logo_url {
            return (Some(logo.clone()), Some(ArtworkSource::Plex));
        }

        for (index, provider) in self.providers.iter().enumerate() {
            if let Some(logo) = &lookups.get(index).await.logo {
                return (Some(logo.clone()), Some(provider.source()));
            }
        }

        (None, None)
    }

    async fn resolve_backdrop(
        &self,
        lookups: &mut Lookups<'_>,
    ) -> (Option<String>, Option<ArtworkSource>) {
        for step in &self.backdrop_order {
            let url = match step.provider() {
                Some(source) => {
                    let Some(index) = self.providers.iter().position(|p| p.source() == source)
                    else {
                        continue;
                    };
                    lookups.get(index).await.backdrop.clone()
                }
                None if *step == BackdropSource::PlexArt => lookups.item.art_url.clone(),
                None => lookups.item.thumb_url.clone(),
            };

            if let Some(url) = url {
                let source = step.provider().unwrap_or(ArtworkSource::Plex);
                return (Some(url), Some(source));
            }
        }

        (None, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeProvider {
        source: ArtworkSource,
        images: ProviderImages,
        configured: bool,
        calls: AtomicUsize,
    }

    impl FakeProvider {
        fn new(source: ArtworkSource, backdrop: Option<&str>, logo: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                source,
                images: ProviderImages {
                    backdrop: backdrop.map(String::from),
                    logo: logo.map(String::from),
                },
                configured: true,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ArtworkProvider for FakeProvider {
        fn source(&self) -> ArtworkSource {
            self.source
        }

        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn lookup_images(&self, _item: &MediaItem) -> ProviderImages {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.images.clone()
        }
    }

    fn resolver(a: &Arc<FakeProvider>, b: &Arc<FakeProvider>) -> ArtworkResolver {
        ArtworkResolver::new(
            vec![
                a.clone() as Arc<dyn ArtworkProvider>,
                b.clone() as Arc<dyn ArtworkProvider>,
            ],
            BackdropSource::default_order(),
        )
    }

    #[tokio::test]
    async fn test_backdrop_and_logo_from_different_providers() {
        let fanart = FakeProvider::new(ArtworkSource::Fanart, Some("https://a/bg.jpg"), None);
        let tmdb = FakeProvider::new(
            ArtworkSource::Tmdb,
            Some("https://b/bg.jpg"),
            Some("https://b/logo.png"),
        );
        let mut item = MediaItem::new("The Matrix", MediaType::Movie, "tmdb://movie/603");

        let resolved = resolver(&fanart, &tmdb).resolve(&mut item).await;

        assert_eq!(resolved.backdrop_url.as_deref(), Some("https://a/bg.jpg"));
        assert_eq!(resolved.logo_url.as_deref(), Some("https://b/logo.png"));
        assert_eq!(resolved.backdrop_source, Some(ArtworkSource::Fanart));
        assert_eq!(resolved.logo_source, Some(ArtworkSource::Tmdb));
        assert_eq!(item.resolved_backdrop_url.as_deref(), Some("https://a/bg.jpg"));
        assert_eq!(item.resolved_logo_url.as_deref(), Some("https://b/logo.png"));
        assert_eq!(fanart.calls(), 1);
        assert_eq!(tmdb.calls(), 1);
    }

    #[tokio::test]
    async fn test_memoized_result_keeps_provenance() {
        let fanart = FakeProvider::new(ArtworkSource::Fanart, Some("https://a/bg.jpg"), None);
        let tmdb = FakeProvider::new(
            ArtworkSource::Tmdb,
            Some("https://b/bg.jpg"),
            Some("https://b/logo.png"),
        );
        let resolver = resolver(&fanart, &tmdb);
        let mut item = MediaItem::new("The Matrix", MediaType::Movie, "tmdb://movie/603");

        let first = resolver.resolve(&mut item).await;
        let second = resolver.resolve(&mut item).await;

        assert_eq!(first, second);
        assert_eq!(second.backdrop_source, Some(ArtworkSource::Fanart));
        assert_eq!(second.logo_source, Some(ArtworkSource::Tmdb));
        assert_eq!(fanart.calls(), 1);
        assert_eq!(tmdb.calls(), 1);
    }

    #[tokio::test]
    async fn test_priority_provider_wins_backdrop_and_logo() {
        let fanart = FakeProvider::new(
            ArtworkSource::Fanart,
            Some("https://a/bg.jpg"),
            Some("https://a/logo.png"),
        );
        let tmdb = FakeProvider::new(
            ArtworkSource::Tmdb,
            Some("https://b/bg.jpg"),
            Some("https://b/logo.png"),
        );
        let mut item = MediaItem::new("Alien", MediaType::Movie, "tmdb://348");
        item.art_url = Some("https://plex/art".to_string());

        let resolved = resolver(&fanart, &tmdb).resolve(&mut item).await;

        assert_eq!(resolved.backdrop_url.as_deref(), Some("https://a/bg.jpg"));
        assert_eq!(resolved.logo_url.as_deref(), Some("https://a/logo.png"));
        // Plex art sits ahead of TMDB in the backdrop order, so TMDB is never asked
        assert_eq!(tmdb.calls(), 0);
    }

    #[tokio::test]
    async fn test_plex_art_beats_secondary_provider() {
        let fanart = FakeProvider::new(ArtworkSource::Fanart, None, None);
        let tmdb = FakeProvider::new(
            ArtworkSource::Tmdb,
            Some("https://b/bg.jpg"),
            Some("https://b/logo.png"),
        );
        let mut item = MediaItem::new("Heat", MediaType::Movie, "tmdb://949");
        item.art_url = Some("https://plex/art".to_string());
        item.thumb_url = Some("https://plex/thumb".to_string());

        let resolved = resolver(&fanart, &tmdb).resolve(&mut item).await;

        assert_eq!(resolved.backdrop_url.as_deref(), Some("https://plex/art"));
        assert_eq!(resolved.backdrop_source, Some(ArtworkSource::Plex));
    }

    #[tokio::test]
    async fn test_thumb_is_last_resort() {
        let fanart = FakeProvider::new(ArtworkSource::Fanart, None, Some("https://a/logo.png"));
        let tmdb = FakeProvider::new(ArtworkSource::Tmdb, None, None);
        let mut item = MediaItem::new("Obscure", MediaType::Movie, "tmdb://1");
        item.thumb_url = Some("https://plex/thumb".to_string());

        let resolved = resolver(&fanart, &tmdb).resolve(&mut item).await;
        assert_eq!(resolved.backdrop_url.as_deref(), Some("https://plex/thumb"));
    }

    #[tokio::test]
    async fn test_plex_logo_skips_logo_fan_out() {
        let fanart = FakeProvider::new(ArtworkSource::Fanart, None, Some("https://a/logo.png"));
        let tmdb = FakeProvider::new(ArtworkSource::Tmdb, None, Some("https://b/logo.png"));
        let mut item = MediaItem::new("Dune", MediaType::Movie, "tmdb://438631");
        item.logo_url = Some("https://plex/logo".to_string());
        item.art_url = Some("https://plex/art".to_string());

        let resolved = resolver(&fanart, &tmdb).resolve(&mut item).await;

        assert_eq!(resolved.logo_url.as_deref(), Some("https://plex/logo"));
        assert_eq!(resolved.logo_source, Some(ArtworkSource::Plex));
        // Fanart is still asked for its backdrop, TMDB never
        assert_eq!(fanart.calls(), 1);
        assert_eq!(tmdb.calls(), 0);
    }

    #[tokio::test]
    async fn test_second_resolve_is_memoized() {
        let fanart = FakeProvider::new(
            ArtworkSource::Fanart,
            Some("https://a/bg.jpg"),
            Some("https://a/logo.png"),
        );
        let tmdb = FakeProvider::new(ArtworkSource::Tmdb, None, None);
        let resolver = resolver(&fanart, &tmdb);
        let mut item = MediaItem::new("Up", MediaType::Movie, "tmdb://14160");

        let first = resolver.resolve(&mut item).await;
        let second = resolver.resolve(&mut item).await;

        assert_eq!(first, second);
        assert_eq!(fanart.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_logo_is_not_written_back() {
        let fanart = FakeProvider::new(ArtworkSource::Fanart, Some("https://a/bg.jpg"), None);
        let tmdb = FakeProvider::new(ArtworkSource::Tmdb, None, None);
        let resolver = resolver(&fanart, &tmdb);
        let mut item = MediaItem::new("Nameless", MediaType::Movie, "tmdb://5");

        let resolved = resolver.resolve(&mut item).await;
        assert!(!resolved.is_usable());
        assert!(item.resolved_backdrop_url.is_none());

        resolver.resolve(&mut item).await;
        assert_eq!(fanart.calls(), 2);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_never_called() {
        let fanart = Arc::new(FakeProvider {
            source: ArtworkSource::Fanart,
            images: ProviderImages {
                backdrop: Some("https://a/bg.jpg".to_string()),
                logo: Some("https://a/logo.png".to_string()),
            },
            configured: false,
            calls: AtomicUsize::new(0),
        });
        let tmdb = FakeProvider::new(
            ArtworkSource::Tmdb,
            Some("https://b/bg.jpg"),
            Some("https://b/logo.png"),
        );
        let mut item = MediaItem::new("Jaws", MediaType::Movie, "tmdb://578");

        let resolved = resolver(&fanart, &tmdb).resolve(&mut item).await;

        assert_eq!(resolved.logo_url.as_deref(), Some("https://b/logo.png"));
        assert_eq!(resolved.backdrop_url.as_deref(), Some("https://b/bg.jpg"));
        assert_eq!(fanart.calls(), 0);
    }
}
