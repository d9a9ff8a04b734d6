use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

use crate::models::MediaItem;

/// Deduplicated, circular list of items for one session
#[derive(Debug, Default)]
pub struct Playlist {
    items: Vec<MediaItem>,
    cursor: usize,
}

impl Playlist {
    /// Build a playlist keeping the first item seen for each GUID (or title)
    pub fn new(items: Vec<MediaItem>) -> Self {
        let mut seen = HashSet::new();
        let items: Vec<MediaItem> = items
            .into_iter()
            .filter(|item| seen.insert(item.dedup_key().to_string()))
            .collect();

        Self { items, cursor: 0 }
    }

    pub fn shuffled<R: Rng + ?Sized>(items: Vec<MediaItem>, rng: &mut R) -> Self {
        let mut playlist = Self::new(items);
        playlist.items.shuffle(rng);
        playlist
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Take the index under the cursor and move the cursor on, wrapping
    /// at the end. The cursor moves before the caller does any work on
    /// the item, so a skipped item is never picked twice in a row.
    pub fn advance(&mut self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }
        let index = self.cursor;
        self.cursor = (index + 1) % self.items.len();
        Some(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut MediaItem> {
        self.items.get_mut(index)
    }

    pub fn titles(&self, n: usize) -> Vec<&str> {
        self.items.iter().take(n).map(|i| i.title.as_str()).collect()
    }
}
