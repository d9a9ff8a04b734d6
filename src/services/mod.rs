// Services module - library access and artwork lookup

pub mod cache;
pub mod guid;
pub mod library;
pub mod plex;
pub mod plex_link;
pub mod provider;
pub mod resolver;
pub mod selection;

// Artwork providers
pub mod fanart;
pub mod tmdb;
