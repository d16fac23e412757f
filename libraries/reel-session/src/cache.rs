/// Single-use cache of resolved, analyzed streams
use reel_core::{StreamDescriptor, TrimHints};
use std::collections::HashMap;
use tracing::debug;

/// A fully prepared stream: resolved URL(s) plus trim analysis.
///
/// This is the unit the preloader produces and the controller consumes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub descriptor: StreamDescriptor,
    pub trim: TrimHints,
}

impl ResolvedMedia {
    pub fn new(descriptor: StreamDescriptor, trim: TrimHints) -> Self {
        Self { descriptor, trim }
    }

    /// A descriptor with no trim hints
    pub fn untrimmed(descriptor: StreamDescriptor) -> Self {
        Self {
            descriptor,
            trim: TrimHints::NONE,
        }
    }
}

/// Cache of prepared streams for the current item's reachable neighbors.
///
/// Entries are single-use: a hit removes the entry, because resolved
/// URLs expire and a consumed entry must never be served twice. The
/// whole cache is invalidated on every track swap, so it only ever
/// holds entries produced relative to the current item.
#[derive(Debug, Default)]
pub struct TrackCache {
    entries: HashMap<String, ResolvedMedia>,
}

impl TrackCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the prepared stream for `identity`, removing it.
    pub fn try_take(&mut self, identity: &str) -> Option<ResolvedMedia> {
        let hit = self.entries.remove(identity);
        if hit.is_some() {
            debug!(identity, "track cache hit");
        }
        hit
    }

    /// Store a prepared stream. Replaces any previous entry for the key.
    pub fn insert(&mut self, identity: String, media: ResolvedMedia) {
        self.entries.insert(identity, media);
    }

    /// Whether an entry exists without consuming it (preload planning).
    pub fn contains(&self, identity: &str) -> bool {
        self.entries.contains_key(identity)
    }

    /// Drop every entry. Called on each transition: neighbor sets are
    /// only valid relative to the item they were computed against.
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            debug!(count = self.entries.len(), "invalidating track cache");
        }
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_core::StreamDescriptor;

    fn media(url: &str) -> ResolvedMedia {
        ResolvedMedia::untrimmed(StreamDescriptor {
            playback_url: url.to_string(),
            http_headers: HashMap::new(),
            duration: None,
            secondary_audio_url: None,
        })
    }

    #[test]
    fn entries_are_single_use() {
        let mut cache = TrackCache::new();
        cache.insert("a".to_string(), media("http://cdn/a"));

        assert!(cache.contains("a"));
        let first = cache.try_take("a");
        assert!(first.is_some());
        // consumed: a second take must miss
        assert!(cache.try_take("a").is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_clears_everything() {
        let mut cache = TrackCache::new();
        cache.insert("a".to_string(), media("http://cdn/a"));
        cache.insert("b".to_string(), media("http://cdn/b"));
        assert_eq!(cache.len(), 2);

        cache.invalidate();
        assert!(cache.is_empty());
        assert!(cache.try_take("a").is_none());
        assert!(cache.try_take("b").is_none());
    }

    #[test]
    fn insert_replaces_stale_entry() {
        let mut cache = TrackCache::new();
        cache.insert("a".to_string(), media("http://cdn/a-old"));
        cache.insert("a".to_string(), media("http://cdn/a-new"));

        let taken = cache.try_take("a").unwrap();
        assert_eq!(taken.descriptor.playback_url, "http://cdn/a-new");
    }
}
