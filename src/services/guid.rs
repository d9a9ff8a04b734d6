// Cross-reference ids embedded in Plex GUID strings
// Plex joins every provider GUID of an item with '|', e.g.
//   tmdb://456|tvdb://123|imdb://tt789
// Some agents also embed the media type: tmdb://movie/603, tmdb://tv/1399

use regex::Regex;
use std::sync::LazyLock;

use crate::models::MediaType;

static RE_TMDB: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"tmdb://(?:([^/|]+)/)?(\d+)").unwrap());

/// TMDB splits its catalogue into two id spaces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmdbKind {
    Movie,
    Tv,
}

impl TmdbKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TmdbKind::Movie => "movie",
            TmdbKind::Tv => "tv",
        }
    }

    fn from_segment(segment: &str) -> Option<Self> {
        match segment {
            "movie" => Some(TmdbKind::Movie),
            "tv" | "show" => Some(TmdbKind::Tv),
            _ => None,
        }
    }
}

/// Id for any `scheme://` entry in the GUID string, e.g. `imdb` gives `tt789`.
/// A leading type segment (`tmdb://movie/603`) is skipped.
pub fn extract_provider_id<'a>(guids: &'a str, scheme: &'a str) -> Option<&'a str> {
    provider_ids(guids, scheme).next()
}

fn provider_ids<'a>(guids: &'a str, scheme: &'a str) -> impl Iterator<Item = &'a str> {
    guids
        .split('|')
        .filter_map(move |guid| guid.trim().strip_prefix(scheme)?.strip_prefix("://"))
        .filter_map(|rest| rest.rsplit('/').next())
        .filter(|id| !id.is_empty())
}

/// First TMDB id in the GUID string (type segment skipped)
pub fn extract_tmdb_id(guids: &str) -> Option<&str> {
    RE_TMDB
        .captures(guids)
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str())
}

/// First TVDB id in the GUID string (type segment skipped)
pub fn extract_tvdb_id(guids: &str) -> Option<&str> {
    provider_ids(guids, "tvdb").find(|id| id.bytes().all(|b| b.is_ascii_digit()))
}

/// TMDB id together with the catalogue it lives in.
///
/// An embedded type segment wins; otherwise the kind is inferred from the
/// Plex item type (shows and episodes live under `tv`, everything else is
/// looked up as a movie).
pub fn extract_tmdb_ref(guids: &str, media_type: MediaType) -> Option<(TmdbKind, String)> {
    let caps = RE_TMDB.captures(guids)?;
    let id = caps.get(2)?.as_str().to_string();

    let kind = caps
        .get(1)
        .and_then(|segment| TmdbKind::from_segment(segment.as_str()))
        .unwrap_or(if media_type.is_tv() {
            TmdbKind::Tv
        } else {
            TmdbKind::Movie
        });

    Some((kind, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_provider_id() {
        let guids = "tmdb://456|tvdb://123|imdb://tt789";
        assert_eq!(extract_provider_id(guids, "imdb"), Some("tt789"));
        assert_eq!(extract_provider_id(guids, "tvdb"), Some("123"));
        assert_eq!(extract_provider_id("tmdb://movie/603", "tmdb"), Some("603"));
        assert_eq!(extract_provider_id("plex://movie/5d77", "tmdb"), None);
        assert_eq!(extract_provider_id("", "tmdb"), None);
    }

    #[test]
    fn test_multi_guid_extraction() {
        let guids = "tmdb://456|tvdb://123|imdb://tt789";
        assert_eq!(extract_tvdb_id(guids), Some("123"));
        assert_eq!(extract_tmdb_id(guids), Some("456"));
    }

    #[test]
    fn test_type_segment_is_skipped() {
        assert_eq!(extract_tmdb_id("tmdb://movie/603"), Some("603"));
        assert_eq!(extract_tvdb_id("tvdb://series/81189"), Some("81189"));
    }

    #[test]
    fn test_non_numeric_tvdb_entry_is_passed_over() {
        assert_eq!(extract_tvdb_id("tvdb://abc|tmdb://603|tvdb://81189"), Some("81189"));
        assert_eq!(extract_tvdb_id("tvdb://abc"), None);
    }

    #[test]
    fn test_missing_scheme_is_not_applicable() {
        assert_eq!(extract_tvdb_id("tmdb://603|imdb://tt0133093"), None);
        assert_eq!(extract_tmdb_id(""), None);
        assert_eq!(extract_tmdb_id("plex://movie/5d776825880197001ec967c1"), None);
    }

    #[test]
    fn test_tmdb_ref_kind() {
        assert_eq!(
            extract_tmdb_ref("tmdb://movie/603", MediaType::Show),
            Some((TmdbKind::Movie, "603".to_string()))
        );
        assert_eq!(
            extract_tmdb_ref("tmdb://tv/1399", MediaType::Movie),
            Some((TmdbKind::Tv, "1399".to_string()))
        );
        assert_eq!(
            extract_tmdb_ref("tmdb://1399|tvdb://121361", MediaType::Show),
            Some((TmdbKind::Tv, "1399".to_string()))
        );
        assert_eq!(
            extract_tmdb_ref("tmdb://603", MediaType::Other),
            Some((TmdbKind::Movie, "603".to_string()))
        );
        assert_eq!(extract_tmdb_ref("imdb://tt0133093", MediaType::Movie), None);
    }
}
