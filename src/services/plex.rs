// Plex Media Server library client
// Server discovery goes through plex.tv, library browsing talks to the
// selected server directly. Both answer JSON when asked to.

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;

use super::library::{LibraryError, LibrarySource};
use crate::models::{LibrarySection, MediaItem, MediaType, PlexServer};

const PLEX_TV_BASE: &str = "https://plex.tv";

/// Plex API client authenticated with a user token
pub struct PlexClient {
    client: Client,
    token: String,
    client_identifier: String,
    plex_tv_base: String,
}

// === plex.tv resources ===

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resource {
    name: String,
    provides: Option<String>,
    #[serde(default)]
    owned: bool,
    access_token: Option<String>,
    client_identifier: Option<String>,
    #[serde(default)]
    connections: Vec<Connection>,
}

#[derive(Debug, Clone, Deserialize)]
struct Connection {
    protocol: String,
    uri: String,
    #[serde(default)]
    local: bool,
}

// === Media server containers ===

#[derive(Debug, Deserialize)]
struct ContainerResponse {
    #[serde(rename = "MediaContainer")]
    media_container: MediaContainer,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaContainer {
    size: Option<usize>,
    total_size: Option<usize>,
    #[serde(default, rename = "Directory")]
    directories: Vec<DirectoryEntry>,
    #[serde(default, rename = "Metadata")]
    metadata: Vec<MetadataEntry>,
}

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    key: Option<String>,
    title: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetadataEntry {
    #[serde(default)]
    title: String,
    #[serde(rename = "type")]
    kind: Option<String>,
    rating_key: Option<String>,
    guid: Option<String>,
    thumb: Option<String>,
    art: Option<String>,
    #[serde(default, rename = "Guid")]
    guids: Vec<GuidEntry>,
    #[serde(default, rename = "Image")]
    images: Vec<ImageEntry>,
}

#[derive(Debug, Deserialize)]
struct GuidEntry {
    id: String,
}

#[derive(Debug, Deserialize)]
struct ImageEntry {
    #[serde(rename = "type")]
    kind: String,
    url: String,
}

impl PlexClient {
    pub fn new(token: impl Into<String>, client_identifier: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token: token.into(),
            client_identifier: client_identifier.into(),
            plex_tv_base: PLEX_TV_BASE.to_string(),
        }
    }

    /// Point server discovery at another plex.tv root
    #[cfg(test)]
    pub fn with_plex_tv_base(mut self, base: impl Into<String>) -> Self {
        self.plex_tv_base = base.into();
        self
    }

    /// Discover owned media servers on the account.
    /// Local connections are preferred, then https.
    pub async fn discover_servers(&self) -> Result<Vec<PlexServer>> {
        let url = format!(
            "{}/api/v2/resources?includeHttps=1&includeRelay=0",
            self.plex_tv_base
        );

        let response = self
            .client
            .get(&url)
            .header("X-Plex-Token", &self.token)
            .header("X-Plex-Client-Identifier", &self.client_identifier)
            .header("Accept", "application/json")
            .send()
            .await
            .context("Failed to reach plex.tv")?;

        if !response.status().is_success() {
            anyhow::bail!("Failed to discover servers: {}", response.status());
        }

        let resources: Vec<Resource> = response
            .json()
            .await
            .context("Failed to parse plex.tv resources")?;

        let servers: Vec<PlexServer> = resources
            .into_iter()
            .filter(|r| r.owned && r.provides.as_deref().is_some_and(|p| p.contains("server")))
            .filter_map(|r| {
                let mut connections = r.connections.clone();
                connections.sort_by_key(|c| (!c.local, c.protocol != "https"));
                let connection = connections.into_iter().next()?;
                Some(PlexServer {
                    name: r.name,
                    client_identifier: r.client_identifier?,
                    uri: connection.uri,
                    access_token: r.access_token?,
                })
            })
            .collect();

        tracing::debug!("Discovered {} servers", servers.len());
        Ok(servers)
    }

    /// List the library sections of a server
    pub async fn get_library_sections(&self, server: &PlexServer) -> Result<Vec<LibrarySection>> {
        let url = format!("{}/library/sections", server.uri);
        let container = self.get_container(server, &url, &[]).await?;

        let sections: Vec<LibrarySection> = container
            .directories
            .into_iter()
            .filter_map(|d| {
                Some(LibrarySection {
                    id: d.key?,
                    title: d.title?,
                    section_type: d.kind?,
                })
            })
            .collect();

        tracing::debug!("Found {} library sections on {}", sections.len(), server.name);
        Ok(sections)
    }

    /// Fetch a batch of items from a section.
    ///
    /// Large libraries are sampled: a random window of `batch_size` items,
    /// itself randomly sorted, so each session sees different artwork.
    pub async fn get_artwork_from_section(
        &self,
        server: &PlexServer,
        section_id: &str,
        batch_size: usize,
    ) -> Result<Vec<MediaItem>> {
        let url = format!("{}/library/sections/{}/all", server.uri, section_id);

        let count = self
            .get_container(
                server,
                &url,
                &[("X-Plex-Container-Start", "0".into()), ("X-Plex-Container-Size", "1".into())],
            )
            .await?;
        let total = count.total_size.or(count.size).unwrap_or(batch_size);

        let offset = if total > batch_size {
            rand::thread_rng().gen_range(0..total - batch_size)
        } else {
            0
        };

        tracing::debug!(
            "Fetching {} of {} items from section {} (offset {})",
            batch_size,
            total,
            section_id,
            offset
        );

        let container = self
            .get_container(
                server,
                &url,
                &[
                    ("includeGuids", "1".into()),
                    ("includeImages", "1".into()),
                    ("sort", "random".into()),
                    ("X-Plex-Container-Start", offset.to_string()),
                    ("X-Plex-Container-Size", batch_size.to_string()),
                ],
            )
            .await?;

        let items: Vec<MediaItem> = container
            .metadata
            .into_iter()
            .filter_map(|entry| self.to_media_item(server, entry))
            .collect();

        tracing::info!(
            "Loaded {} artwork items from section {} ({} total)",
            items.len(),
            section_id,
            total
        );
        Ok(items)
    }

    async fn get_container(
        &self,
        server: &PlexServer,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<MediaContainer> {
        let response = self
            .client
            .get(url)
            .query(query)
            .header("X-Plex-Token", &server.access_token)
            .header("X-Plex-Client-Identifier", &self.client_identifier)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", server.name))?;

        if !response.status().is_success() {
            anyhow::bail!("{} returned {} for {}", server.name, response.status(), url);
        }

        let parsed: ContainerResponse = response
            .json()
            .await
            .context("Failed to parse Plex media container")?;
        Ok(parsed.media_container)
    }

    /// Items with neither thumb nor art are useless to a screensaver
    fn to_media_item(&self, server: &PlexServer, entry: MetadataEntry) -> Option<MediaItem> {
        let thumb_url = entry
            .thumb
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| image_url(server, p));
        let art_url = entry
            .art
            .as_deref()
            .filter(|p| !p.is_empty())
            .map(|p| image_url(server, p));

        if thumb_url.is_none() && art_url.is_none() {
            return None;
        }

        let logo_url = entry
            .images
            .iter()
            .find(|img| img.kind == "clearLogo" && !img.url.is_empty())
            .map(|img| image_url(server, &img.url));

        // Keep every cross-reference: Fanart.tv wants TVDB, TMDB wants TMDB
        let guids = if entry.guids.is_empty() {
            entry.guid.unwrap_or_default()
        } else {
            entry
                .guids
                .iter()
                .map(|g| g.id.as_str())
                .collect::<Vec<_>>()
                .join("|")
        };

        Some(MediaItem {
            title: entry.title,
            media_type: entry.kind.as_deref().map(MediaType::from_plex),
            rating_key: entry.rating_key,
            guids,
            thumb_url,
            art_url,
            logo_url,
            ..Default::default()
        })
    }
}

/// Absolute, token-carrying URL for a server-relative image path
fn image_url(server: &PlexServer, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    let separator = if path.contains('?') { '&' } else { '?' };
    format!(
        "{}{}{}X-Plex-Token={}",
        server.uri,
        path,
        separator,
        urlencoding::encode(&server.access_token)
    )
}

/// Loads the rotation's items from the configured server and libraries
pub struct PlexLibrary {
    client: Option<PlexClient>,
    server_id: Option<String>,
    libraries: Vec<String>,
    batch_size: usize,
}

impl PlexLibrary {
    pub fn new(
        client: Option<PlexClient>,
        server_id: Option<String>,
        libraries: Vec<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            client,
            server_id,
            libraries,
            batch_size,
        }
    }
}

#[async_trait]
impl LibrarySource for PlexLibrary {
    async fn load_items(&self) -> Result<Vec<MediaItem>, LibraryError> {
        let Some(client) = &self.client else {
            return Err(LibraryError::NotAuthenticated);
        };

        let servers = client.discover_servers().await?;
        let server = self
            .server_id
            .as_deref()
            .and_then(|id| servers.iter().find(|s| s.client_identifier == id))
            .or_else(|| servers.first())
            .ok_or(LibraryError::NoServers)?;
        tracing::info!("Using server: {}", server.name);

        let sections = client.get_library_sections(server).await?;
        let targets: Vec<&LibrarySection> = if self.libraries.is_empty() {
            sections
                .iter()
                .filter(|s| s.section_type == "movie" || s.section_type == "show")
                .collect()
        } else {
            sections
                .iter()
                .filter(|s| self.libraries.contains(&s.id))
                .collect()
        };

        if targets.is_empty() {
            return Err(LibraryError::NoSections(server.name.clone()));
        }

        tracing::debug!(
            "Target sections: {:?}",
            targets
                .iter()
                .map(|s| format!("{} ({})", s.title, s.id))
                .collect::<Vec<_>>()
        );

        let batches = futures::future::join_all(targets.iter().map(|section| async move {
            (
                *section,
                client
                    .get_artwork_from_section(server, &section.id, self.batch_size)
                    .await,
            )
        }))
        .await;

        let mut items = Vec::new();
        for (section, batch) in batches {
            match batch {
                Ok(batch) => items.extend(batch),
                Err(e) => {
                    tracing::error!("Failed to get artwork from section {}: {:#}", section.title, e)
                }
            }
        }

        if items.is_empty() {
            return Err(LibraryError::NoItems);
        }
        Ok(items)
    }
}
