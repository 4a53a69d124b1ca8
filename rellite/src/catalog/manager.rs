// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog context and sessions
//!
//! `Catalog` is the single external interface to the catalog subsystem.
//! One instance owns the in-memory registry, the name resolution cache, the
//! persistent store, and the ID generator; multiple independent catalogs
//! can coexist in one process.
//!
//! All mutation and on-demand-load operations serialize on one coarse lock
//! over the registry. On-demand deserialization deliberately runs under the
//! same lock, trading load-time parallelism for the guarantee that one
//! object is never deserialized twice concurrently. The name resolution
//! cache carries its own lock so lookups never block on catalog-wide
//! mutation.

use std::collections::HashSet;

use parking_lot::Mutex;

use crate::cache::{CacheSettings, NameResolutionCache, NameResolutionCacheStats};
use crate::store::{CatalogStore, PooledConnection, StoreConnection, StoreStats};

use super::ddl::{DdlInstruction, DdlTransactionLog, DeferredAction};
use super::error::{CatalogError, CatalogResult};
use super::object::{DeviceState, IdGenerator, ObjectHeader, ObjectId, SchemaObject};
use super::registry::CatalogState;

/// Point-in-time counters for one catalog instance
#[derive(Debug, Clone)]
pub struct CatalogStats {
    pub resident_objects: usize,
    pub name_cache: NameResolutionCacheStats,
    pub store: StoreStats,
    pub connections_in_use: usize,
    pub connections_idle: usize,
}

/// One catalog instance: registry, caches, store, and identity
pub struct Catalog {
    state: Mutex<CatalogState>,
    /// Object IDs currently being loaded; re-entrant loads fail fast
    loading: Mutex<HashSet<ObjectId>>,
    store: CatalogStore,
    names: NameResolutionCache,
    ids: IdGenerator,
}

impl Catalog {
    /// Open a catalog over an existing store
    ///
    /// Seeds the ID generator above the greatest persisted object ID so
    /// fresh IDs never collide with stored ones.
    pub fn with_store(store: CatalogStore, settings: CacheSettings) -> CatalogResult<Self> {
        let names = NameResolutionCache::new(settings)?;
        let ids = IdGenerator::new();
        {
            let mut conn = store.connection()?;
            if let Some(max) = store.max_object_id(&mut conn)? {
                ids.raise_floor(max);
            }
        }
        log::info!("Catalog opened over {} backend", store.backend_kind());
        Ok(Self {
            state: Mutex::new(CatalogState::new()),
            loading: Mutex::new(HashSet::new()),
            store,
            names,
            ids,
        })
    }

    /// Open a catalog over a fresh in-memory store
    pub fn in_memory() -> CatalogResult<Self> {
        Self::with_store(CatalogStore::in_memory(), CacheSettings::default())
    }

    /// Open a catalog over a durable store at the given path
    #[cfg(feature = "sled-backend")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> CatalogResult<Self> {
        Self::with_store(CatalogStore::open(path)?, CacheSettings::default())
    }

    pub fn store(&self) -> &CatalogStore {
        &self.store
    }

    pub fn name_cache(&self) -> &NameResolutionCache {
        &self.names
    }

    /// Issue a fresh object ID
    pub fn next_object_id(&self) -> ObjectId {
        self.ids.next_id()
    }

    /// Start a session against this catalog
    pub fn session(&self) -> CatalogSession<'_> {
        CatalogSession {
            catalog: self,
            log: DdlTransactionLog::new(),
            deferred: Vec::new(),
            loading: false,
            connection: None,
        }
    }

    pub(super) fn lock_state(&self) -> parking_lot::MutexGuard<'_, CatalogState> {
        self.state.lock()
    }

    pub(super) fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub(super) fn names(&self) -> &NameResolutionCache {
        &self.names
    }

    /// Cache-only lookup by ID
    ///
    /// # Arguments
    /// * `must_resolve` - Fail with `ObjectIdNotFound` instead of returning
    ///   `None` on a miss
    pub fn resolve_cached_by_id(
        &self,
        id: ObjectId,
        must_resolve: bool,
    ) -> CatalogResult<Option<SchemaObject>> {
        let state = self.state.lock();
        match state.get(id) {
            Some(object) => Ok(Some(object.clone())),
            None if must_resolve => Err(CatalogError::ObjectIdNotFound(id)),
            None => Ok(None),
        }
    }

    /// Cache-only lookup by rooted name
    pub fn resolve_cached_by_name(
        &self,
        rooted_name: &str,
        must_resolve: bool,
    ) -> CatalogResult<Option<SchemaObject>> {
        let state = self.state.lock();
        match state.get_by_name(rooted_name) {
            Some(object) => Ok(Some(object.clone())),
            None if must_resolve => Err(CatalogError::ObjectNotFound(rooted_name.to_string())),
            None => Ok(None),
        }
    }

    /// Load-or-return by ID
    ///
    /// Returns the resident object if cached; otherwise loads its whole
    /// non-resident dependency closure from the store, dependencies first,
    /// caching every object on the way. A re-entrant load of an ID already
    /// in flight fails immediately with `ConcurrentLoad` rather than
    /// blocking: dependency cycles are catalog corruption, not contention.
    pub fn resolve_by_id(&self, id: ObjectId) -> CatalogResult<SchemaObject> {
        {
            let state = self.state.lock();
            if let Some(object) = state.get(id) {
                return Ok(object.clone());
            }
        }
        {
            let mut loading = self.loading.lock();
            if !loading.insert(id) {
                return Err(CatalogError::ConcurrentLoad(id));
            }
        }
        let result = self.load_closure(id);
        self.loading.lock().remove(&id);
        result
    }

    fn load_closure(&self, id: ObjectId) -> CatalogResult<SchemaObject> {
        let mut state = self.state.lock();
        // Resolved by someone else while we were acquiring the lock.
        if let Some(object) = state.get(id) {
            return Ok(object.clone());
        }
        let mut conn = self.store.connection()?;
        let order = self
            .store
            .load_order(&mut conn, id, &mut |oid| state.contains(oid))?;
        log::debug!("Loading object #{} with a closure of {} objects", id, order.len());
        for oid in order {
            let object = self
                .store
                .load_object(&mut conn, oid)?
                .ok_or(CatalogError::ObjectIdNotFound(oid))?;
            self.ids.raise_floor(object.id);
            state.cache_object(object)?;
        }
        state
            .get(id)
            .cloned()
            .ok_or(CatalogError::ObjectIdNotFound(id))
    }

    /// Resolve a possibly-partial object name to candidate headers
    ///
    /// Consults the name resolution cache first; on a miss runs the
    /// qualifier-depth store search and populates the cache. Candidates are
    /// ordered most-qualified rooted name first. Case-insensitive probes
    /// bypass the cache, which only holds case-sensitive results.
    pub fn resolve_name(
        &self,
        probe: &str,
        case_sensitive: bool,
    ) -> CatalogResult<Vec<ObjectHeader>> {
        if case_sensitive {
            if let Some(candidates) = self.names.lookup_name(probe) {
                return Ok(candidates);
            }
        }
        let candidates = self.search_name(probe, case_sensitive, false)?;
        if case_sensitive {
            self.names.populate_name(probe, candidates.clone());
        }
        Ok(candidates)
    }

    /// Resolve an operator or conversion name to candidate headers
    pub fn resolve_operator_name(
        &self,
        probe: &str,
        case_sensitive: bool,
    ) -> CatalogResult<Vec<ObjectHeader>> {
        if case_sensitive {
            if let Some(candidates) = self.names.lookup_operator(probe) {
                return Ok(candidates);
            }
        }
        let candidates = self.search_name(probe, case_sensitive, true)?;
        if case_sensitive {
            self.names.populate_operator(probe, candidates.clone());
        }
        Ok(candidates)
    }

    fn search_name(
        &self,
        probe: &str,
        case_sensitive: bool,
        operators_only: bool,
    ) -> CatalogResult<Vec<ObjectHeader>> {
        let mut conn = self.store.connection()?;
        let rows = self.store.resolve_name(&mut conn, probe, case_sensitive)?;
        let state = self.state.lock();
        let mut candidates = Vec::with_capacity(rows.len());
        for row in rows {
            if operators_only && !row.kind.is_operator_kind() {
                continue;
            }
            if let Some(resident) = state.get(row.id) {
                candidates.push(resident.header());
            } else if let Some(object) = self.store.load_object(&mut conn, row.id)? {
                candidates.push(object.header());
            }
        }
        Ok(candidates)
    }

    /// Number of objects resident in memory
    pub fn resident_count(&self) -> usize {
        self.state.lock().len()
    }

    /// Point-in-time copy of the in-memory state, for diagnostics and for
    /// asserting that a rollback restored it exactly
    pub fn snapshot(&self) -> CatalogState {
        self.state.lock().clone()
    }

    /// Current run state of a device, if registered
    pub fn device_state(&self, id: ObjectId) -> Option<DeviceState> {
        self.state.lock().device_state(id)
    }

    /// Apply new name-cache settings, discarding cached lookups
    pub fn configure_name_cache(&self, settings: CacheSettings) -> CatalogResult<()> {
        self.names.resize(settings)?;
        Ok(())
    }

    /// Counters across the registry, caches, store, and pool
    pub fn stats(&self) -> CatalogResult<CatalogStats> {
        let mut conn = self.store.connection()?;
        let store = self.store.stats(&mut conn)?;
        Ok(CatalogStats {
            resident_objects: self.resident_count(),
            name_cache: self.names.stats(),
            store,
            connections_in_use: self.store.pool().in_use(),
            connections_idle: self.store.pool().idle(),
        })
    }
}

/// One unit of catalog work with its own DDL transaction log
///
/// A session holds its pooled store connection for as long as a transaction
/// is open, so catalog and store transaction scopes stay aligned.
pub struct CatalogSession<'a> {
    catalog: &'a Catalog,
    log: DdlTransactionLog,
    deferred: Vec<DeferredAction>,
    loading: bool,
    connection: Option<PooledConnection>,
}

impl<'a> CatalogSession<'a> {
    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    /// Transaction nesting depth
    pub fn depth(&self) -> usize {
        self.log.depth()
    }

    pub fn in_transaction(&self) -> bool {
        self.log.in_transaction()
    }

    /// Whether the session is rehydrating objects from the store
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Enter the loading context: mutations are neither logged for rollback
    /// nor written back to the store
    pub fn begin_loading(&mut self) {
        self.loading = true;
    }

    pub fn end_loading(&mut self) {
        self.loading = false;
    }

    pub(super) fn recording(&self) -> bool {
        self.log.in_transaction() && !self.loading
    }

    pub(super) fn record(&mut self, instruction: DdlInstruction) {
        if self.recording() {
            self.log.record(instruction);
        }
    }

    /// Entries currently in the DDL log, markers included
    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    /// Actions queued for the next successful outermost commit
    pub fn deferred_len(&self) -> usize {
        self.deferred.len()
    }

    pub(super) fn defer(&mut self, action: DeferredAction) {
        self.deferred.push(action);
    }

    /// Open a transaction level; the first level checks a store connection
    /// out and begins the store transaction alongside the DDL log
    pub fn begin(&mut self) -> CatalogResult<()> {
        if self.connection.is_none() {
            self.connection = Some(self.catalog.store.connection()?);
        }
        if let Some(conn) = self.connection.as_mut() {
            conn.begin()?;
        }
        self.log.begin();
        Ok(())
    }

    /// Commit the innermost level; the outermost commit releases the store
    /// connection and runs any deferred actions
    pub fn commit(&mut self) -> CatalogResult<()> {
        if !self.log.in_transaction() {
            return Err(CatalogError::NoActiveTransaction);
        }
        if let Some(conn) = self.connection.as_mut() {
            conn.commit()?;
        }
        self.log
            .commit()
            .map_err(|_| CatalogError::NoActiveTransaction)?;
        if !self.log.in_transaction() {
            self.connection = None;
            self.run_deferred();
        }
        Ok(())
    }

    /// Roll the innermost level back
    ///
    /// The store transaction rolls back first, then the DDL log undoes the
    /// in-memory mutations in strict reverse order. Individual undo
    /// failures are logged and skipped; if any occurred the call reports
    /// `RollbackPartialFailure` after the sweep completes.
    pub fn rollback(&mut self) -> CatalogResult<()> {
        if !self.log.in_transaction() {
            return Err(CatalogError::NoActiveTransaction);
        }
        if let Some(conn) = self.connection.as_mut() {
            conn.rollback()?;
        }
        let outcome = {
            let mut state = self.catalog.lock_state();
            self.log
                .rollback(&mut state)
                .map_err(|_| CatalogError::NoActiveTransaction)?
        };
        self.catalog.names.clear();
        if !self.log.in_transaction() {
            self.connection = None;
            self.deferred.clear();
        }
        if outcome.failed > 0 {
            return Err(CatalogError::RollbackPartialFailure {
                failed: outcome.failed,
                total: outcome.total(),
            });
        }
        Ok(())
    }

    fn run_deferred(&mut self) {
        let actions = std::mem::take(&mut self.deferred);
        for action in actions {
            match action {
                DeferredAction::StopDevice(id) => {
                    let mut state = self.catalog.lock_state();
                    if state.device_state(id).is_some() {
                        state.set_device_state(id, DeviceState::Stopped);
                        log::info!("Device #{} stopped after commit", id);
                    } else {
                        log::warn!("Deferred stop for unknown device #{}", id);
                    }
                }
            }
        }
    }

    /// Run store work on the session's connection, or on a short-lived
    /// transactional connection when no session transaction is open
    pub(super) fn with_store<R>(
        &mut self,
        f: impl FnOnce(&CatalogStore, &mut StoreConnection) -> CatalogResult<R>,
    ) -> CatalogResult<R> {
        let store = &self.catalog.store;
        match self.connection.as_mut() {
            Some(conn) => f(store, conn),
            None => {
                let mut conn = store.connection()?;
                conn.begin()?;
                match f(store, &mut conn) {
                    Ok(value) => {
                        conn.commit()?;
                        Ok(value)
                    }
                    Err(e) => {
                        if let Err(rollback_err) = conn.rollback() {
                            log::warn!("Store rollback failed: {}", rollback_err);
                        }
                        Err(e)
                    }
                }
            }
        }
    }
}
