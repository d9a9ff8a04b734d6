// TMDB artwork provider service
// API Documentation: https://developer.themoviedb.org/reference/movie-images

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::cache::{Fetch, ResponseCache};
use super::guid::{extract_tmdb_ref, TmdbKind};
use super::provider::ArtworkProvider;
use super::selection::{
    select_backdrop, select_logo, BackdropPolicy, BackdropRanking, LogoPolicy,
};
use crate::models::{ArtworkSource, ImageCandidate, MediaItem, ProviderImages};

const TMDB_API_BASE: &str = "https://api.themoviedb.org/3";
const TMDB_IMAGE_BASE: &str = "https://image.tmdb.org/t/p/original";

const BACKDROP_POLICY: BackdropPolicy = BackdropPolicy {
    prefer_tv_ratio: true,
    ranking: BackdropRanking::RatingThenWidth,
};

/// TMDB API client
pub struct TmdbClient {
    client: Client,
    api_key: Option<String>,
    language: String,
    base_url: String,
    cache: ResponseCache<ImagesResponse>,
}

/// `/{movie|tv}/{id}/images` response. Logos and backdrops come back in one
/// call, so a single cached response serves both lookups.
#[derive(Debug, Deserialize)]
pub struct ImagesResponse {
    pub id: i64,
    #[serde(default)]
    pub logos: Vec<TmdbImage>,
    #[serde(default)]
    pub backdrops: Vec<TmdbImage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbImage {
    pub file_path: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    pub vote_average: Option<f64>,
    pub vote_count: Option<u32>,
    pub iso_639_1: Option<String>,
}

impl TmdbImage {
    fn to_candidate(&self) -> ImageCandidate {
        let url = if self.file_path.is_empty() {
            String::new()
        } else {
            format!("{}{}", TMDB_IMAGE_BASE, self.file_path)
        };

        ImageCandidate {
            id: Some(self.file_path.clone()),
            url,
            language: self.iso_639_1.clone(),
            width: self.width,
            height: self.height,
            rating: self.vote_average,
            votes: self.vote_count,
        }
    }
}

impl TmdbClient {
    /// Create a new TMDB client. Without an API key every lookup is empty.
    pub fn new(api_key: Option<String>, language: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            language: language.into(),
            base_url: TMDB_API_BASE.to_string(),
            cache: ResponseCache::new("tmdb"),
        }
    }

    /// Point the client at another API root
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn cache(&self) -> &ResponseCache<ImagesResponse> {
        &self.cache
    }

    /// Fetch the image lists for an id, from cache when possible
    pub async fn fetch_images(&self, kind: TmdbKind, tmdb_id: &str) -> Option<Arc<ImagesResponse>> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("TMDB API key not configured, skipping");
            return None;
        };

        let key = self.cache.key(kind.as_str(), tmdb_id);
        self.cache
            .get_or_fetch(&key, || self.request_images(api_key, kind, tmdb_id))
            .await
    }

    async fn request_images(
        &self,
        api_key: &str,
        kind: TmdbKind,
        tmdb_id: &str,
    ) -> Fetch<ImagesResponse> {
        let url = format!(
            "{}/{}/{}/images?api_key={}",
            self.base_url,
            kind.as_str(),
            tmdb_id,
            urlencoding::encode(api_key)
        );

        tracing::debug!("Fetching TMDB images for {}/{} (API call)", kind.as_str(), tmdb_id);

        let response = match self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("TMDB request for {}/{} failed: {}", kind.as_str(), tmdb_id, e);
                return Fetch::Unavailable;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "TMDB returned {} for {}/{}",
                response.status(),
                kind.as_str(),
                tmdb_id
            );
            return Fetch::Missing;
        }

        match response.json::<ImagesResponse>().await {
            Ok(images) => Fetch::Found(images),
            Err(e) => {
                tracing::warn!("Failed to parse TMDB images for {}/{}: {}", kind.as_str(), tmdb_id, e);
                Fetch::Missing
            }
        }
    }

    /// Pick backdrop and logo from an images response
    pub fn select_images(&self, images: &ImagesResponse) -> ProviderImages {
        let backdrops: Vec<ImageCandidate> =
            images.backdrops.iter().map(TmdbImage::to_candidate).collect();
        let logos: Vec<ImageCandidate> = images.logos.iter().map(TmdbImage::to_candidate).collect();

        tracing::debug!(
            "TMDB {}: {} backdrops, {} logos",
            images.id,
            backdrops.len(),
            logos.len()
        );

        ProviderImages {
            backdrop: select_backdrop(&backdrops, BACKDROP_POLICY, &self.language, None)
                .map(|c| c.url.clone()),
            logo: select_logo(&logos, LogoPolicy::CompositeScore, &self.language, None)
                .map(|c| c.url.clone()),
        }
    }
}

#[async_trait]
impl ArtworkProvider for TmdbClient {
    fn source(&self) -> ArtworkSource {
        ArtworkSource::Tmdb
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn lookup_images(&self, item: &MediaItem) -> ProviderImages {
        if !self.is_configured() {
            return ProviderImages::empty();
        }

        let Some((kind, tmdb_id)) = extract_tmdb_ref(&item.guids, item.media_type()) else {
            tracing::debug!("No TMDB id for '{}'", item.title);
            return ProviderImages::empty();
        };

        match self.fetch_images(kind, &tmdb_id).await {
            Some(images) => {
                let selected = self.select_images(&images);
                tracing::debug!(
                    "TMDB images for '{}': backdrop={}, logo={}",
                    item.title,
                    selected.backdrop.is_some(),
                    selected.logo.is_some()
                );
                selected
            }
            None => ProviderImages::empty(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaType;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn matrix_images() -> serde_json::Value {
        json!({
            "id": 603,
            "backdrops": [
                { "file_path": "/titled.jpg", "width": 3840, "height": 2160,
                  "vote_average": 5.9, "vote_count": 12, "iso_639_1": "en" },
                { "file_path": "/clean.jpg", "width": 1920, "height": 1080,
                  "vote_average": 5.4, "vote_count": 3, "iso_639_1": null },
                { "file_path": "/clean-wide.jpg", "width": 3000, "height": 1250,
                  "vote_average": 5.8, "vote_count": 8, "iso_639_1": null }
            ],
            "logos": [
                { "file_path": "/logo-en.png", "width": 800, "height": 300,
                  "vote_average": 5.3, "vote_count": 2, "iso_639_1": "en" },
                { "file_path": "/logo-de.png", "width": 900, "height": 300,
                  "vote_average": 9.0, "vote_count": 40, "iso_639_1": "de" }
            ]
        })
    }

    #[tokio::test]
    async fn test_lookup_selects_and_caches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/603/images"))
            .and(query_param("api_key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(matrix_images()))
            .expect(1)
            .mount(&server)
            .await;

        let client = TmdbClient::new(Some("secret".to_string()), "en").with_base_url(server.uri());
        let item = MediaItem::new("The Matrix", MediaType::Movie, "tmdb://movie/603");

        let first = client.lookup_images(&item).await;
        assert_eq!(
            first.backdrop.as_deref(),
            Some("https://image.tmdb.org/t/p/original/clean.jpg")
        );
        assert_eq!(
            first.logo.as_deref(),
            Some("https://image.tmdb.org/t/p/original/logo-en.png")
        );

        let second = client.lookup_images(&item).await;
        assert_eq!(first, second);
        assert_eq!(client.cache().hits(), 1);
    }

    #[tokio::test]
    async fn test_show_uses_tv_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/tv/1399/images"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1399,
                "backdrops": [],
                "logos": [{ "file_path": "/got.png", "width": 500, "height": 200,
                            "vote_average": 0.0, "vote_count": 0, "iso_639_1": "en" }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = TmdbClient::new(Some("k".to_string()), "en").with_base_url(server.uri());
        let item = MediaItem::new("Game of Thrones", MediaType::Show, "tmdb://1399|tvdb://121361");

        let images = client.lookup_images(&item).await;
        assert!(images.backdrop.is_none());
        assert_eq!(
            images.logo.as_deref(),
            Some("https://image.tmdb.org/t/p/original/got.png")
        );
    }

    #[tokio::test]
    async fn test_error_status_fails_soft_and_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/1/images"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;

        let client = TmdbClient::new(Some("k".to_string()), "en").with_base_url(server.uri());
        let item = MediaItem::new("Broken", MediaType::Movie, "tmdb://1");

        assert!(client.lookup_images(&item).await.is_empty());
        assert!(client.lookup_images(&item).await.is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_fails_soft() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/movie/2/images"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let client = TmdbClient::new(Some("k".to_string()), "en").with_base_url(server.uri());
        let item = MediaItem::new("Garbage", MediaType::Movie, "tmdb://2");
        assert!(client.lookup_images(&item).await.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_client_makes_no_calls() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(matrix_images()))
            .expect(0)
            .mount(&server)
            .await;

        let client = TmdbClient::new(None, "en").with_base_url(server.uri());
        assert!(!client.is_configured());

        let item = MediaItem::new("The Matrix", MediaType::Movie, "tmdb://603");
        assert!(client.lookup_images(&item).await.is_empty());
    }

    #[tokio::test]
    async fn test_item_without_tmdb_guid() {
        let client = TmdbClient::new(Some("k".to_string()), "en");
        let item = MediaItem::new("Local", MediaType::Movie, "imdb://tt0000001");
        assert!(client.lookup_images(&item).await.is_empty());
    }
}
