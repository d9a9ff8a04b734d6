use serde::{Deserialize, Serialize};

/// Kind of library item, as reported by Plex's `type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Show,
    Episode,
    Other,
}

impl MediaType {
    pub fn from_plex(value: &str) -> Self {
        match value {
            "movie" => MediaType::Movie,
            "show" => MediaType::Show,
            "episode" => MediaType::Episode,
            _ => MediaType::Other,
        }
    }

    pub fn is_tv(&self) -> bool {
        matches!(self, MediaType::Show | MediaType::Episode)
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaType::Movie => write!(f, "movie"),
            MediaType::Show => write!(f, "show"),
            MediaType::Episode => write!(f, "episode"),
            MediaType::Other => write!(f, "other"),
        }
    }
}

/// A library item taking part in the rotation.
///
/// Created when the library is loaded and mutated in place by the resolver:
/// `resolved_*` fields are written back after the first usable resolution so
/// later passes over the playlist reuse them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MediaItem {
    pub title: String,
    pub media_type: Option<MediaType>,
    pub rating_key: Option<String>,
    /// Pipe-joined provider GUIDs, e.g. `tmdb://603|tvdb://169|imdb://tt0133093`
    pub guids: String,
    pub thumb_url: Option<String>,
    pub art_url: Option<String>,
    /// Plex `clearLogo`, when the server has one
    pub logo_url: Option<String>,
    /// Fanart.tv image id pinned by the user
    pub preferred_artwork_id: Option<String>,
    pub resolved_backdrop_url: Option<String>,
    pub resolved_logo_url: Option<String>,
    pub resolved_backdrop_source: Option<ArtworkSource>,
    pub resolved_logo_source: Option<ArtworkSource>,
}

impl MediaItem {
    #[cfg(test)]
    pub fn new(title: impl Into<String>, media_type: MediaType, guids: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            media_type: Some(media_type),
            guids: guids.into(),
            ..Default::default()
        }
    }

    /// Key used for playlist deduplication: the GUID string, or the title
    /// when the item carries no GUID at all.
    pub fn dedup_key(&self) -> &str {
        if self.guids.is_empty() {
            &self.title
        } else {
            &self.guids
        }
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type.unwrap_or(MediaType::Other)
    }

    /// Previously resolved artwork, if this item has been displayed before
    pub fn memoized(&self) -> Option<ResolvedArtwork> {
        let logo_url = self.resolved_logo_url.clone()?;
        Some(ResolvedArtwork {
            backdrop_url: self.resolved_backdrop_url.clone(),
            logo_url: Some(logo_url),
            backdrop_source: self.resolved_backdrop_source,
            logo_source: self.resolved_logo_source,
        })
    }
}

/// Provenance of a resolved image, for diagnostics only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtworkSource {
    Plex,
    Fanart,
    Tmdb,
}

impl std::fmt::Display for ArtworkSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtworkSource::Plex => write!(f, "Plex"),
            ArtworkSource::Fanart => write!(f, "Fanart.tv"),
            ArtworkSource::Tmdb => write!(f, "TMDB"),
        }
    }
}

/// Resolver output for a single item
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResolvedArtwork {
    pub backdrop_url: Option<String>,
    pub logo_url: Option<String>,
    pub backdrop_source: Option<ArtworkSource>,
    pub logo_source: Option<ArtworkSource>,
}

impl ResolvedArtwork {
    /// Items are only shown with a title treatment; no logo means skip.
    pub fn is_usable(&self) -> bool {
        self.logo_url.is_some()
    }
}

/// What a single provider offers for an item
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProviderImages {
    pub backdrop: Option<String>,
    pub logo: Option<String>,
}

impl ProviderImages {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.backdrop.is_none() && self.logo.is_none()
    }
}

/// A provider image considered during best-image selection
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ImageCandidate {
    pub id: Option<String>,
    pub url: String,
    /// Empty or `None` means text-free
    pub language: Option<String>,
    pub width: u32,
    pub height: u32,
    pub rating: Option<f64>,
    /// Votes (TMDB) or likes (Fanart.tv)
    pub votes: Option<u32>,
}

impl ImageCandidate {
    pub fn is_text_free(&self) -> bool {
        self.language.as_deref().map_or(true, str::is_empty)
    }

    pub fn has_language(&self, language: &str) -> bool {
        self.language.as_deref() == Some(language)
    }

    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Close to 16:9
    pub fn is_tv_ratio(&self) -> bool {
        (1.75..=1.80).contains(&self.aspect_ratio())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlexServer {
    pub name: String,
    pub client_identifier: String,
    pub uri: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibrarySection {
    pub id: String,
    pub title: String,
    /// movie, show, artist, photo
    pub section_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_key_falls_back_to_title() {
        let with_guid = MediaItem::new("The Matrix", MediaType::Movie, "tmdb://603");
        assert_eq!(with_guid.dedup_key(), "tmdb://603");

        let without = MediaItem::new("Home Video", MediaType::Other, "");
        assert_eq!(without.dedup_key(), "Home Video");
    }

    #[test]
    fn test_tv_ratio() {
        let wide = ImageCandidate {
            width: 1920,
            height: 1080,
            ..Default::default()
        };
        assert!(wide.is_tv_ratio());

        let scope = ImageCandidate {
            width: 2048,
            height: 858,
            ..Default::default()
        };
        assert!(!scope.is_tv_ratio());

        let broken = ImageCandidate::default();
        assert!(!broken.is_tv_ratio());
    }

    #[test]
    fn test_memoized_requires_logo() {
        let mut item = MediaItem::new("Alien", MediaType::Movie, "tmdb://348");
        item.resolved_backdrop_url = Some("https://a/bg.jpg".into());
        assert!(item.memoized().is_none());

        item.resolved_logo_url = Some("https://a/logo.png".into());
        item.resolved_backdrop_source = Some(ArtworkSource::Fanart);
        item.resolved_logo_source = Some(ArtworkSource::Plex);
        let memo = item.memoized().unwrap();
        assert!(memo.is_usable());
        assert_eq!(memo.backdrop_url.as_deref(), Some("https://a/bg.jpg"));
        assert_eq!(memo.backdrop_source, Some(ArtworkSource::Fanart));
        assert_eq!(memo.logo_source, Some(ArtworkSource::Plex));
    }

    #[test]
    fn test_media_type_from_plex() {
        assert_eq!(MediaType::from_plex("movie"), MediaType::Movie);
        assert_eq!(MediaType::from_plex("show"), MediaType::Show);
        assert_eq!(MediaType::from_plex("artist"), MediaType::Other);
        assert!(MediaType::Episode.is_tv());
    }
}
