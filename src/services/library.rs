use async_trait::async_trait;
use thiserror::Error;

use crate::models::MediaItem;

/// The one unrecoverable failure of a session: nothing to rotate through.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("not signed in to Plex")]
    NotAuthenticated,

    #[error("no Plex servers found")]
    NoServers,

    #[error("no matching library sections on {0}")]
    NoSections(String),

    #[error("library sections returned no artwork")]
    NoItems,

    #[error("Plex request failed: {0:#}")]
    Request(#[from] anyhow::Error),
}

/// Source of raw media items for the rotation
#[async_trait]
pub trait LibrarySource: Send + Sync {
    async fn load_items(&self) -> Result<Vec<MediaItem>, LibraryError>;
}
