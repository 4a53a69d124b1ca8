// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Name resolution cache
//!
//! Caches name -> candidate-header lists so repeated lookups skip the
//! multi-qualifier store search. Plain object names and operator names live
//! in separate bounded caches. Invalidation is coarse: any catalog-object or
//! operator create/drop clears everything, which is acceptable because a
//! miss is cheap relative to mutation frequency.
//!
//! The cache carries its own lock. Lookups never block on the catalog-wide
//! lock; a narrow staleness window before a pending clear completes is
//! tolerated because resolution re-validates against the cache/store.

use parking_lot::Mutex;

use super::adaptive::BoundedCache;
use super::config::CacheSettings;
use super::CacheError;
use crate::catalog::object::ObjectHeader;

/// Counters for both name caches
#[derive(Debug, Default, Clone, Copy)]
pub struct NameResolutionCacheStats {
    pub name_hits: u64,
    pub name_misses: u64,
    pub operator_hits: u64,
    pub operator_misses: u64,
    pub clears: u64,
}

struct Inner {
    names: BoundedCache<String, Vec<ObjectHeader>>,
    operators: BoundedCache<String, Vec<ObjectHeader>>,
    settings: CacheSettings,
    clears: u64,
}

/// Catalog-specific cache of name lookups
pub struct NameResolutionCache {
    inner: Mutex<Inner>,
}

impl NameResolutionCache {
    pub fn new(settings: CacheSettings) -> Result<Self, CacheError> {
        settings.validate()?;
        Ok(Self {
            inner: Mutex::new(Inner {
                names: Self::build(&settings, settings.name_cache_size)?,
                operators: Self::build(&settings, settings.operator_name_cache_size)?,
                settings,
                clears: 0,
            }),
        })
    }

    fn build(
        settings: &CacheSettings,
        capacity: usize,
    ) -> Result<BoundedCache<String, Vec<ObjectHeader>>, CacheError> {
        BoundedCache::with_settings(
            capacity,
            settings.cutoff_fraction,
            settings.correlated_reference_period,
        )
    }

    /// Cached candidates for a plain object name
    pub fn lookup_name(&self, name: &str) -> Option<Vec<ObjectHeader>> {
        self.inner.lock().names.try_get(&name.to_string())
    }

    /// Record the result of an object-name store search
    pub fn populate_name(&self, name: &str, candidates: Vec<ObjectHeader>) {
        self.inner.lock().names.reference(name.to_string(), candidates);
    }

    /// Cached candidates for an operator name
    pub fn lookup_operator(&self, name: &str) -> Option<Vec<ObjectHeader>> {
        self.inner.lock().operators.try_get(&name.to_string())
    }

    /// Record the result of an operator-name store search
    pub fn populate_operator(&self, name: &str, candidates: Vec<ObjectHeader>) {
        self.inner
            .lock()
            .operators
            .reference(name.to_string(), candidates);
    }

    /// Coarse invalidation: discard every cached lookup
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.names.clear();
        inner.operators.clear();
        inner.clears += 1;
        log::debug!("Name resolution cache cleared");
    }

    /// Apply new settings, discarding both caches
    pub fn resize(&self, settings: CacheSettings) -> Result<(), CacheError> {
        settings.validate()?;
        let names = Self::build(&settings, settings.name_cache_size)?;
        let operators = Self::build(&settings, settings.operator_name_cache_size)?;

        let mut inner = self.inner.lock();
        inner.names = names;
        inner.operators = operators;
        inner.settings = settings;
        log::info!(
            "Name resolution cache resized: names={}, operators={}",
            inner.settings.name_cache_size,
            inner.settings.operator_name_cache_size
        );
        Ok(())
    }

    /// Current settings
    pub fn settings(&self) -> CacheSettings {
        self.inner.lock().settings.clone()
    }

    pub fn stats(&self) -> NameResolutionCacheStats {
        let inner = self.inner.lock();
        let names = inner.names.stats();
        let operators = inner.operators.stats();
        NameResolutionCacheStats {
            name_hits: names.hits,
            name_misses: names.misses,
            operator_hits: operators.hits,
            operator_misses: operators.misses,
            clears: inner.clears,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::object::ObjectHeader;

    fn header(id: i32, name: &str) -> ObjectHeader {
        ObjectHeader {
            id,
            name: name.to_string(),
            library: None,
            owner: None,
        }
    }

    #[test]
    fn test_miss_then_populate_then_hit() {
        let cache = NameResolutionCache::new(CacheSettings::default()).unwrap();
        assert!(cache.lookup_name("Customer").is_none());

        cache.populate_name("Customer", vec![header(1, "Main.Customer")]);
        let hit = cache.lookup_name("Customer").unwrap();
        assert_eq!(hit.len(), 1);
        assert_eq!(hit[0].id, 1);
    }

    #[test]
    fn test_clear_drops_both_caches() {
        let cache = NameResolutionCache::new(CacheSettings::default()).unwrap();
        cache.populate_name("Customer", vec![header(1, "Main.Customer")]);
        cache.populate_operator("Upper", vec![header(2, "System.Upper")]);

        cache.clear();
        assert!(cache.lookup_name("Customer").is_none());
        assert!(cache.lookup_operator("Upper").is_none());
        assert_eq!(cache.stats().clears, 1);
    }

    #[test]
    fn test_resize_discards_entries() {
        let cache = NameResolutionCache::new(CacheSettings::default()).unwrap();
        cache.populate_name("Customer", vec![header(1, "Main.Customer")]);

        let settings = CacheSettings {
            name_cache_size: 8,
            operator_name_cache_size: 8,
            ..CacheSettings::default()
        };
        cache.resize(settings).unwrap();
        assert!(cache.lookup_name("Customer").is_none());
        assert_eq!(cache.settings().name_cache_size, 8);
    }

    #[test]
    fn test_resize_rejects_undersized() {
        let cache = NameResolutionCache::new(CacheSettings::default()).unwrap();
        let settings = CacheSettings {
            name_cache_size: 0,
            ..CacheSettings::default()
        };
        assert!(cache.resize(settings).is_err());
    }
}
