//! Content-addressed outline cache
//!
//! Parsed [`FileOutline`]s keyed by the xxh3 hash of the file's locator and
//! bytes. The cache is shared across rayon workers through a `DashMap` and
//! persisted as JSON under `<output-dir>/cache/outlines.json`. It is purely
//! an optimisation: a missing, stale or corrupt cache file is ignored.

use crate::errors::{ModgraphError, ModgraphResult};
use crate::parsers::FileOutline;
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, warn};
use xxhash_rust::xxh3::Xxh3;

/// Bumped whenever the outline format changes
const CACHE_VERSION: u32 = 1;

/// Directory holding cache files inside the output directory.
pub fn cache_dir(output_dir: &Path) -> PathBuf {
    output_dir.join("cache")
}

pub fn outlines_path(output_dir: &Path) -> PathBuf {
    cache_dir(output_dir).join("outlines.json")
}

#[derive(Serialize, Deserialize)]
struct CacheFile {
    version: u32,
    /// Hex key -> outline, sorted so the file is stable
    entries: BTreeMap<String, FileOutline>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    pub entries: usize,
}

/// Thread-safe outline cache
#[derive(Default)]
pub struct OutlineCache {
    outlines: DashMap<u64, FileOutline>,
    /// Keys looked up or inserted during this run; only these are persisted
    used: DashSet<u64>,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl OutlineCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a persisted cache. Anything unreadable yields an empty cache.
    pub fn load(path: &Path) -> Self {
        let cache = Self::new();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No outline cache at {}", path.display());
                return cache;
            }
        };
        match serde_json::from_str::<CacheFile>(&content) {
            Ok(file) if file.version == CACHE_VERSION => {
                for (key, outline) in file.entries {
                    if let Ok(key) = u64::from_str_radix(&key, 16) {
                        cache.outlines.insert(key, outline);
                    }
                }
                debug!("Loaded {} cached outlines", cache.outlines.len());
            }
            Ok(file) => debug!("Ignoring outline cache version {}", file.version),
            Err(e) => warn!("Ignoring corrupt outline cache {}: {}", path.display(), e),
        }
        cache
    }

    /// Cache key for a file's locator and content.
    pub fn key(locator: &str, bytes: &[u8]) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(locator.as_bytes());
        hasher.update(&[0]);
        hasher.update(bytes);
        hasher.digest()
    }

    pub fn get(&self, key: u64) -> Option<FileOutline> {
        self.used.insert(key);
        match self.outlines.get(&key) {
            Some(outline) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(outline.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn insert(&self, key: u64, outline: FileOutline) {
        self.used.insert(key);
        self.outlines.insert(key, outline);
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.outlines.len(),
        }
    }

    /// Write the entries used in this run to `path`.
    pub fn save(&self, path: &Path) -> ModgraphResult<()> {
        let entries: BTreeMap<String, FileOutline> = self
            .outlines
            .iter()
            .filter(|e| self.used.contains(e.key()))
            .map(|e| (format!("{:016x}", e.key()), e.value().clone()))
            .collect();
        let file = CacheFile {
            version: CACHE_VERSION,
            entries,
        };

        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ModgraphError::Output {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string(&file)?;
        std::fs::write(path, json).map_err(|source| ModgraphError::Output {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Saved {} outlines to {}", file.entries.len(), path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsers::php::parse_source;
    use tempfile::tempdir;

    #[test]
    fn test_key_depends_on_locator_and_content() {
        let a = OutlineCache::key("a.php", b"<?php");
        assert_eq!(a, OutlineCache::key("a.php", b"<?php"));
        assert_ne!(a, OutlineCache::key("b.php", b"<?php"));
        assert_ne!(a, OutlineCache::key("a.php", b"<?php "));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = outlines_path(dir.path());
        let source = "<?php\nnamespace Acme\\Cart;\nclass Cart extends \\Acme\\Base {}\n";
        let outline = parse_source(source, "Cart.php").unwrap();
        let key = OutlineCache::key("Cart.php", source.as_bytes());

        let cache = OutlineCache::new();
        assert!(cache.get(key).is_none());
        cache.insert(key, outline.clone());
        cache.insert(7, FileOutline::new("unused.php"));
        cache.outlines.insert(8, FileOutline::new("stale.php"));
        cache.save(&path).unwrap();

        let loaded = OutlineCache::load(&path);
        assert_eq!(loaded.get(key), Some(outline));
        assert!(loaded.get(8).is_none());
        assert_eq!(loaded.stats().hits, 1);
    }

    #[test]
    fn test_corrupt_cache_is_ignored() {
        let dir = tempdir().unwrap();
        let path = outlines_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{not json").unwrap();
        assert_eq!(OutlineCache::load(&path).stats().entries, 0);
    }
}
