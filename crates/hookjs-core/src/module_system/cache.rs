// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module cache for require()

use dashmap::DashMap;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Cached module entry
#[derive(Debug, Clone)]
pub struct ModuleRecord<E> {
    /// Absolute path of the module
    pub id: PathBuf,
    /// The module's exports
    pub exports: E,
    /// Modules required by this one, in first-require order
    pub children: Vec<PathBuf>,
    /// Module that first required this one
    pub parent: Option<PathBuf>,
    /// Whether the module body has finished running
    pub loaded: bool,
}

impl<E> ModuleRecord<E> {
    /// Create a record whose body has not run yet
    pub fn new(id: PathBuf, exports: E, parent: Option<PathBuf>) -> Self {
        Self {
            id,
            exports,
            children: Vec::new(),
            parent,
            loaded: false,
        }
    }
}

/// Registry of loaded dependency modules keyed by absolute path.
///
/// Guards are never held across calls, so loaders may re-enter the cache
/// while a module body is running.
pub struct ModuleCache<E> {
    cache: DashMap<PathBuf, ModuleRecord<E>>,
}

impl<E: Clone> ModuleCache<E> {
    /// Create a new empty cache
    pub fn new() -> Self {
        Self {
            cache: DashMap::new(),
        }
    }

    /// Get a cached module by path
    pub fn get(&self, path: &Path) -> Option<ModuleRecord<E>> {
        self.cache.get(path).map(|entry| entry.clone())
    }

    /// Get only the exports of a cached module
    pub fn exports(&self, path: &Path) -> Option<E> {
        self.cache.get(path).map(|entry| entry.exports.clone())
    }

    /// Check if a module is cached
    pub fn has(&self, path: &Path) -> bool {
        self.cache.contains_key(path)
    }

    /// Add a module to the cache, replacing any previous record
    pub fn set(&self, record: ModuleRecord<E>) {
        self.cache.insert(record.id.clone(), record);
    }

    /// Replace the exports of a cached module and mark it loaded
    pub fn finish(&self, path: &Path, exports: E) -> bool {
        match self.cache.get_mut(path) {
            Some(mut entry) => {
                entry.exports = exports;
                entry.loaded = true;
                true
            }
            None => false,
        }
    }

    /// Record that `parent` required `child`
    pub fn add_child(&self, parent: &Path, child: &Path) {
        if let Some(mut entry) = self.cache.get_mut(parent) {
            if !entry.children.iter().any(|c| c == child) {
                entry.children.push(child.to_path_buf());
            }
        }
    }

    /// Remove a single module from the cache
    pub fn delete(&self, path: &Path) -> Option<ModuleRecord<E>> {
        self.cache.remove(path).map(|(_, record)| record)
    }

    /// Remove a module and every module it transitively required.
    ///
    /// Returns the ids that were purged, in visiting order. Each record leaves
    /// the cache before its children are visited and no id is visited twice,
    /// so circular graphs terminate.
    pub fn invalidate(&self, path: &Path) -> Vec<PathBuf> {
        let mut seen = HashSet::new();
        let mut purged = Vec::new();
        self.purge(path, &mut seen, &mut purged);
        purged
    }

    fn purge(&self, path: &Path, seen: &mut HashSet<PathBuf>, purged: &mut Vec<PathBuf>) {
        let Some(record) = self.delete(path) else {
            return;
        };
        trace!("Purged {} from module cache", path.display());
        seen.insert(record.id.clone());
        purged.push(record.id);

        for child in &record.children {
            if !seen.contains(child) {
                self.purge(child, seen, purged);
            }
        }
    }

    /// Clear the entire cache
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Get all cached module paths
    pub fn keys(&self) -> Vec<PathBuf> {
        self.cache.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get the number of cached modules
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

impl<E: Clone> Default for ModuleCache<E> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, children: &[&str]) -> ModuleRecord<u32> {
        let mut record = ModuleRecord::new(PathBuf::from(id), 0, None);
        record.children = children.iter().map(PathBuf::from).collect();
        record
    }

    #[test]
    fn test_set_get_finish() {
        let cache = ModuleCache::new();
        cache.set(record("/m/a.js", &[]));

        assert!(cache.has(Path::new("/m/a.js")));
        assert!(!cache.get(Path::new("/m/a.js")).unwrap().loaded);

        assert!(cache.finish(Path::new("/m/a.js"), 7));
        let loaded = cache.get(Path::new("/m/a.js")).unwrap();
        assert!(loaded.loaded);
        assert_eq!(loaded.exports, 7);

        assert!(!cache.finish(Path::new("/m/missing.js"), 1));
    }

    #[test]
    fn test_add_child_is_a_set() {
        let cache = ModuleCache::new();
        cache.set(record("/m/a.js", &[]));
        cache.add_child(Path::new("/m/a.js"), Path::new("/m/b.js"));
        cache.add_child(Path::new("/m/a.js"), Path::new("/m/b.js"));
        cache.add_child(Path::new("/m/a.js"), Path::new("/m/c.js"));

        let children = cache.get(Path::new("/m/a.js")).unwrap().children;
        assert_eq!(children, vec![PathBuf::from("/m/b.js"), PathBuf::from("/m/c.js")]);
    }

    #[test]
    fn test_invalidate_cycle_terminates() {
        let cache = ModuleCache::new();
        cache.set(record("/m/a.js", &["/m/b.js"]));
        cache.set(record("/m/b.js", &["/m/c.js"]));
        cache.set(record("/m/c.js", &["/m/a.js"]));
        cache.set(record("/m/unrelated.js", &[]));

        let purged = cache.invalidate(Path::new("/m/a.js"));

        assert_eq!(
            purged,
            vec![
                PathBuf::from("/m/a.js"),
                PathBuf::from("/m/b.js"),
                PathBuf::from("/m/c.js")
            ]
        );
        assert_eq!(cache.keys(), vec![PathBuf::from("/m/unrelated.js")]);
    }

    #[test]
    fn test_invalidate_self_reference_and_diamond() {
        let cache = ModuleCache::new();
        cache.set(record("/m/root.js", &["/m/root.js", "/m/left.js", "/m/right.js"]));
        cache.set(record("/m/left.js", &["/m/shared.js"]));
        cache.set(record("/m/right.js", &["/m/shared.js"]));
        cache.set(record("/m/shared.js", &[]));

        let purged = cache.invalidate(Path::new("/m/root.js"));
        assert_eq!(purged.len(), 4);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_invalidate_skips_uncached_children() {
        let cache = ModuleCache::new();
        cache.set(record("/m/a.js", &["/m/gone.js", "/m/b.js"]));
        cache.set(record("/m/b.js", &[]));

        let purged = cache.invalidate(Path::new("/m/a.js"));
        assert_eq!(purged, vec![PathBuf::from("/m/a.js"), PathBuf::from("/m/b.js")]);
    }

    #[test]
    fn test_invalidate_missing_is_noop() {
        let cache = ModuleCache::new();
        cache.set(record("/m/a.js", &[]));

        assert!(cache.invalidate(Path::new("/m/other.js")).is_empty());
        assert_eq!(cache.len(), 1);
    }
}
