// Fanart.tv artwork provider service
// API Documentation: https://fanarttv.docs.apiary.io/
// Movies are keyed by TMDB id, TV shows by TVDB id (TMDB id also accepted)

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;

use super::cache::{Fetch, ResponseCache};
use super::guid::{extract_tmdb_id, extract_tvdb_id};
use super::provider::ArtworkProvider;
use super::selection::{
    select_backdrop, select_logo, BackdropPolicy, BackdropRanking, LogoPolicy,
};
use crate::models::{ArtworkSource, ImageCandidate, MediaItem, MediaType, ProviderImages};

const FANART_API_BASE: &str = "https://webservice.fanart.tv/v3.2";

const BACKDROP_POLICY: BackdropPolicy = BackdropPolicy {
    prefer_tv_ratio: false,
    ranking: BackdropRanking::WidthThenLikes,
};

/// Fanart.tv API client
pub struct FanartClient {
    client: Client,
    api_key: Option<String>,
    language: String,
    base_url: String,
    cache: ResponseCache<FanartResponse>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FanartResponse {
    #[serde(default, rename = "moviebackground")]
    pub movie_backgrounds: Vec<FanartImage>,
    #[serde(default, rename = "hdmovielogo")]
    pub movie_logos: Vec<FanartImage>,
    #[serde(default, rename = "showbackground")]
    pub show_backgrounds: Vec<FanartImage>,
    #[serde(default, rename = "hdtvlogo")]
    pub tv_logos: Vec<FanartImage>,
    #[serde(default, rename = "hdclearlogo")]
    pub clear_logos: Vec<FanartImage>,
}

/// Fanart.tv reports numbers as strings; accept both.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Lenient {
    Number(u64),
    Text(String),
}

impl Lenient {
    fn as_u32(&self) -> u32 {
        match self {
            Lenient::Number(n) => u32::try_from(*n).unwrap_or(u32::MAX),
            Lenient::Text(s) => s.trim().parse().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FanartImage {
    pub id: String,
    pub url: String,
    /// Empty or absent means text-free
    #[serde(default)]
    pub lang: Option<String>,
    #[serde(default)]
    likes: Option<Lenient>,
    #[serde(default)]
    width: Option<Lenient>,
    #[serde(default)]
    height: Option<Lenient>,
}

impl FanartImage {
    fn to_candidate(&self) -> ImageCandidate {
        ImageCandidate {
            id: Some(self.id.clone()),
            url: self.url.clone(),
            language: self.lang.clone(),
            width: self.width.as_ref().map_or(0, Lenient::as_u32),
            height: self.height.as_ref().map_or(0, Lenient::as_u32),
            rating: None,
            votes: self.likes.as_ref().map(Lenient::as_u32),
        }
    }
}

fn candidates(images: &[FanartImage]) -> Vec<ImageCandidate> {
    images.iter().map(FanartImage::to_candidate).collect()
}

impl FanartClient {
    /// Create a new Fanart.tv client. Without an API key every lookup is empty.
    pub fn new(api_key: Option<String>, language: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            language: language.into(),
            base_url: FANART_API_BASE.to_string(),
            cache: ResponseCache::new("fanart"),
        }
    }

    /// Point the client at another API root
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn cache(&self) -> &ResponseCache<FanartResponse> {
        &self.cache
    }

    /// Fetch `/{section}/{id}`, from cache when possible
    async fn fetch(&self, section: &str, id: &str) -> Option<Arc<FanartResponse>> {
        let Some(api_key) = self.api_key.as_deref() else {
            tracing::debug!("Fanart.tv API key not configured, skipping");
            return None;
        };

        let key = self.cache.key(section, id);
        self.cache
            .get_or_fetch(&key, || self.request(api_key, section, id))
            .await
    }

    async fn request(&self, api_key: &str, section: &str, id: &str) -> Fetch<FanartResponse> {
        let url = format!(
            "{}/{}/{}?api_key={}",
            self.base_url,
            section,
            id,
            urlencoding::encode(api_key)
        );
        tracing::debug!("Fetching from Fanart.tv: /{}/{}", section, id);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Fanart.tv request for /{}/{} failed: {}", section, id, e);
                return Fetch::Unavailable;
            }
        };

        if !response.status().is_success() {
            tracing::warn!(
                "Fanart.tv returned {} for /{}/{}",
                response.status(),
                section,
                id
            );
            return Fetch::Missing;
        }

        match response.json::<FanartResponse>().await {
            Ok(parsed) => Fetch::Found(parsed),
            Err(e) => {
                tracing::warn!("Failed to parse Fanart.tv response for /{}/{}: {}", section, id, e);
                Fetch::Missing
            }
        }
    }

    async fn movie_images(&self, tmdb_id: &str, preferred_id: Option<&str>) -> ProviderImages {
        let Some(response) = self.fetch("movies", tmdb_id).await else {
            return ProviderImages::empty();
        };

        let backgrounds = candidates(&response.movie_backgrounds);
        let logos = candidates(&response.movie_logos);
        tracing::debug!(
            "Fanart.tv movie {}: {} backgrounds, {} logos",
            tmdb_id,
            backgrounds.len(),
            logos.len()
        );

        ProviderImages {
            backdrop: select_backdrop(&backgrounds, BACKDROP_POLICY, &self.language, preferred_id)
                .map(|c| c.url.clone()),
            logo: select_logo(&logos, LogoPolicy::WidthThenLikes, &self.language, None)
                .map(|c| c.url.clone()),
        }
    }

    async fn tv_images(&self, id: &str, preferred_id: Option<&str>) -> ProviderImages {
        let Some(response) = self.fetch("tv", id).await else {
            return ProviderImages::empty();
        };

        let backgrounds = candidates(&response.show_backgrounds);
        let tv_logos = candidates(&response.tv_logos);
        let clear_logos = candidates(&response.clear_logos);
        tracing::debug!(
            "Fanart.tv show {}: {} backgrounds, {} hdtvlogo, {} hdclearlogo",
            id,
            backgrounds.len(),
            tv_logos.len(),
            clear_logos.len()
        );

        let logo = select_logo(&tv_logos, LogoPolicy::WidthThenLikes, &self.language, None)
            .or_else(|| {
                select_logo(&clear_logos, LogoPolicy::WidthThenLikes, &self.language, None)
            })
            .map(|c| c.url.clone());

        ProviderImages {
            backdrop: select_backdrop(&backgrounds, BACKDROP_POLICY, &self.language, preferred_id)
                .map(|c| c.url.clone()),
            logo,
        }
    }
}

#[async_trait]
impl ArtworkProvider for FanartClient {
    fn source(&self) -> ArtworkSource {
        ArtworkSource::Fanart
    }

    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn lookup_images(&self, item: &MediaItem) -> ProviderImages {
        if !self.is_configured() {
            return ProviderImages::empty();
        }

        let guids = item.guids.as_str();
        let preferred = item.preferred_artwork_id.as_deref();

        match item.media_type() {
            MediaType::Movie => match extract_tmdb_id(guids) {
                Some(tmdb_id) => self.movie_images(tmdb_id, preferred).await,
                None => ProviderImages::empty(),
            },
            MediaType::Show | MediaType::Episode => {
                // TVDB is Fanart.tv's native key for shows
                if let Some(tvdb_id) = extract_tvdb_id(guids) {
                    let images = self.tv_images(tvdb_id, preferred).await;
                    if !images.is_empty() {
                        return images;
                    }
                }
                match extract_tmdb_id(guids) {
                    Some(tmdb_id) => {
                        tracing::debug!("Trying TMDB id {} for '{}'", tmdb_id, item.title);
                        self.tv_images(tmdb_id, preferred).await
                    }
                    None => ProviderImages::empty(),
                }
            }
            MediaType::Other => {
                if let Some(tmdb_id) = extract_tmdb_id(guids) {
                    let images = self.movie_images(tmdb_id, preferred).await;
                    if !images.is_empty() {
                        return images;
                    }
                }
                match extract_tvdb_id(guids) {
                    Some(tvdb_id) => self.tv_images(tvdb_id, preferred).await,
                    None => ProviderImages::empty(),
                }
            }
        }
    }
}
