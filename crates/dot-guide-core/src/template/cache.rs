//! Parsed-template cache.
//!
//! Bounded LRU keyed by (absolute path, mtime), so an edited file is always
//! re-parsed. Purely an optimization: rendering is identical without it.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::parser::Template;
use crate::error::Result;

type CacheKey = (PathBuf, DateTime<Utc>);

#[derive(Debug, Default)]
struct CacheInner {
    entries: HashMap<CacheKey, Arc<Template>>,
    /// Least recently used at the front
    order: VecDeque<CacheKey>,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &CacheKey) {
        self.order.retain(|k| k != key);
        self.order.push_back(key.clone());
    }

    fn remove_path(&mut self, path: &Path) {
        self.entries.retain(|(p, _), _| p != path);
        self.order.retain(|(p, _)| p != path);
    }
}

/// Cache statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
pub struct TemplateCache {
    capacity: usize,
    inner: Mutex<CacheInner>,
}

impl TemplateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    /// Return the cached parse for (path, mtime), parsing on a miss.
    ///
    /// Parsing happens outside the lock; a concurrent miss on the same key
    /// simply parses twice.
    pub fn get_or_parse<F>(
        &self,
        path: &Path,
        mtime: DateTime<Utc>,
        parse: F,
    ) -> Result<Arc<Template>>
    where
        F: FnOnce() -> Result<Template>,
    {
        let key = (path.to_path_buf(), mtime);

        {
            let mut inner = self.lock();
            if let Some(template) = inner.entries.get(&key).cloned() {
                inner.hits += 1;
                inner.touch(&key);
                return Ok(template);
            }
            inner.misses += 1;
        }

        let template = Arc::new(parse()?);
        if self.capacity == 0 {
            return Ok(template);
        }

        let mut inner = self.lock();
        // Older mtimes for this path can never hit again.
        inner.remove_path(path);
        while inner.entries.len() >= self.capacity {
            match inner.order.pop_front() {
                Some(oldest) => {
                    debug!(path = %oldest.0.display(), "evicting parsed template");
                    inner.entries.remove(&oldest);
                }
                None => break,
            }
        }
        inner.entries.insert(key.clone(), Arc::clone(&template));
        inner.order.push_back(key);
        Ok(template)
    }

    pub fn invalidate(&self, path: &Path) {
        self.lock().remove_path(path);
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            entries: inner.entries.len(),
            hits: inner.hits,
            misses: inner.misses,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        // The cache holds no invariants a panicking holder could break.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::parser::parse;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn parsed(text: &str) -> Result<Template> {
        Ok(parse(text).unwrap())
    }

    #[test]
    fn test_hit_after_miss() {
        let cache = TemplateCache::new(4);
        let path = Path::new("/docs/a.md.mustache");

        cache.get_or_parse(path, at(1), || parsed("a")).unwrap();
        cache
            .get_or_parse(path, at(1), || panic!("should be cached"))
            .unwrap();

        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[test]
    fn test_changed_mtime_reparses_and_replaces() {
        let cache = TemplateCache::new(4);
        let path = Path::new("/docs/a.md.mustache");

        cache.get_or_parse(path, at(1), || parsed("old")).unwrap();
        let fresh = cache.get_or_parse(path, at(2), || parsed("new")).unwrap();

        assert_eq!(fresh.nodes, parse("new").unwrap().nodes);
        assert_eq!(cache.stats().entries, 1);
    }

    #[test]
    fn test_lru_eviction() {
        let cache = TemplateCache::new(2);
        let a = Path::new("/a");
        let b = Path::new("/b");
        let c = Path::new("/c");

        cache.get_or_parse(a, at(1), || parsed("a")).unwrap();
        cache.get_or_parse(b, at(1), || parsed("b")).unwrap();
        // Touch a so b becomes least recently used.
        cache.get_or_parse(a, at(1), || parsed("a")).unwrap();
        cache.get_or_parse(c, at(1), || parsed("c")).unwrap();

        let mut reparsed = false;
        cache
            .get_or_parse(b, at(1), || {
                reparsed = true;
                parsed("b")
            })
            .unwrap();
        assert!(reparsed);

        cache
            .get_or_parse(c, at(1), || panic!("c should still be cached"))
            .unwrap();
    }

    #[test]
    fn test_zero_capacity_never_stores() {
        let cache = TemplateCache::new(0);
        cache.get_or_parse(Path::new("/a"), at(1), || parsed("a")).unwrap();
        assert_eq!(cache.stats().entries, 0);
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = TemplateCache::new(4);
        cache.get_or_parse(Path::new("/a"), at(1), || parsed("a")).unwrap();
        cache.get_or_parse(Path::new("/b"), at(1), || parsed("b")).unwrap();

        cache.invalidate(Path::new("/a"));
        assert_eq!(cache.stats().entries, 1);

        cache.clear();
        assert_eq!(cache.stats().entries, 0);
    }
}
