// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store connections and the connection pool
//!
//! A `StoreConnection` wraps one backend session and tracks transaction
//! nesting: the outermost level maps onto the backend's native transaction,
//! deeper levels run through the compensating-statement log. While a
//! transaction is open the connection optionally caches one cursor per
//! index tree; the cache is flushed whenever the outermost level starts or
//! ends.
//!
//! Connections are checked out of a small LIFO pool with a hard cap;
//! exceeding the cap fails immediately rather than queueing.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::txn::OperationLog;

use super::cursor::{BackendSession, StoreBackend, TableCursor};
use super::nested::CompensatingStatement;
use super::tables::StoreTable;
use super::types::{StoreError, StoreResult};

/// Default hard cap on concurrently checked-out connections
pub const DEFAULT_MAX_CONNECTIONS: usize = 8;

/// One backend session with nested-transaction bookkeeping
pub struct StoreConnection {
    session: Box<dyn BackendSession>,
    emulation: OperationLog<CompensatingStatement>,
    depth: usize,
    cache_cursors: bool,
    cursors: HashMap<String, Box<dyn TableCursor>>,
}

impl StoreConnection {
    pub fn new(session: Box<dyn BackendSession>, cache_cursors: bool) -> Self {
        Self {
            session,
            emulation: OperationLog::new(),
            depth: 0,
            cache_cursors,
            cursors: HashMap::new(),
        }
    }

    /// Current transaction nesting depth; 0 means no transaction open
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn in_transaction(&self) -> bool {
        self.depth > 0
    }

    /// Open a transaction level
    ///
    /// The first level begins the native backend transaction; deeper levels
    /// only open a compensation scope.
    pub fn begin(&mut self) -> StoreResult<()> {
        if self.depth == 0 {
            self.cursors.clear();
            self.session.begin()?;
        } else {
            self.emulation.begin();
        }
        self.depth += 1;
        Ok(())
    }

    /// Commit the innermost open level
    pub fn commit(&mut self) -> StoreResult<()> {
        match self.depth {
            0 => Err(StoreError::NoTransaction),
            1 => {
                self.session.commit()?;
                self.cursors.clear();
                self.depth = 0;
                Ok(())
            }
            _ => {
                self.emulation
                    .commit()
                    .map_err(|_| StoreError::NoTransaction)?;
                self.depth -= 1;
                Ok(())
            }
        }
    }

    /// Roll back the innermost open level
    ///
    /// The outermost level uses the backend's native rollback; emulated
    /// levels replay their compensating statements in reverse.
    pub fn rollback(&mut self) -> StoreResult<()> {
        match self.depth {
            0 => Err(StoreError::NoTransaction),
            1 => {
                self.session.rollback()?;
                self.cursors.clear();
                self.depth = 0;
                Ok(())
            }
            _ => {
                self.cursors.clear();
                let outcome = self
                    .emulation
                    .rollback(&mut self.session)
                    .map_err(|_| StoreError::NoTransaction)?;
                if outcome.failed > 0 {
                    log::warn!(
                        "Emulated rollback completed with {} of {} compensations failed",
                        outcome.failed,
                        outcome.total()
                    );
                }
                self.depth -= 1;
                Ok(())
            }
        }
    }

    fn with_cursor<R>(
        &mut self,
        table: StoreTable,
        index: &'static str,
        f: impl FnOnce(&mut dyn TableCursor) -> StoreResult<R>,
    ) -> StoreResult<R> {
        if self.cache_cursors && self.depth > 0 {
            let name = table.tree_name(index);
            let cursor = match self.cursors.entry(name) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(v) => v.insert(self.session.cursor(table, index)?),
            };
            f(cursor.as_mut())
        } else {
            let mut cursor = self.session.cursor(table, index)?;
            f(cursor.as_mut())
        }
    }

    pub fn get(
        &mut self,
        table: StoreTable,
        index: &'static str,
        key: &[u8],
    ) -> StoreResult<Option<Vec<u8>>> {
        self.with_cursor(table, index, |cur| cur.get(key))
    }

    pub fn contains(
        &mut self,
        table: StoreTable,
        index: &'static str,
        key: &[u8],
    ) -> StoreResult<bool> {
        self.with_cursor(table, index, |cur| cur.seek(key))
    }

    pub fn insert(
        &mut self,
        table: StoreTable,
        index: &'static str,
        key: &[u8],
        value: &[u8],
    ) -> StoreResult<()> {
        self.with_cursor(table, index, |cur| cur.insert(key, value))?;
        if self.depth > 1 {
            self.emulation.record(CompensatingStatement::Remove {
                table,
                index,
                key: key.to_vec(),
            });
        }
        Ok(())
    }

    pub fn update(
        &mut self,
        table: StoreTable,
        index: &'static str,
        key: &[u8],
        value: &[u8],
    ) -> StoreResult<()> {
        let prior = if self.depth > 1 {
            self.get(table, index, key)?
        } else {
            None
        };
        self.with_cursor(table, index, |cur| cur.update(key, value))?;
        if let Some(prior) = prior {
            self.emulation.record(CompensatingStatement::Restore {
                table,
                index,
                key: key.to_vec(),
                value: prior,
            });
        }
        Ok(())
    }

    pub fn delete(
        &mut self,
        table: StoreTable,
        index: &'static str,
        key: &[u8],
    ) -> StoreResult<()> {
        let prior = if self.depth > 1 {
            self.get(table, index, key)?
        } else {
            None
        };
        self.with_cursor(table, index, |cur| cur.delete(key))?;
        if let Some(prior) = prior {
            self.emulation.record(CompensatingStatement::Reinsert {
                table,
                index,
                key: key.to_vec(),
                value: prior,
            });
        }
        Ok(())
    }

    /// Insert if absent, update otherwise
    pub fn put(
        &mut self,
        table: StoreTable,
        index: &'static str,
        key: &[u8],
        value: &[u8],
    ) -> StoreResult<()> {
        if self.get(table, index, key)?.is_some() {
            self.update(table, index, key, value)
        } else {
            self.insert(table, index, key, value)
        }
    }

    /// All rows whose key starts with `prefix`, in key order
    pub fn scan_prefix(
        &mut self,
        table: StoreTable,
        index: &'static str,
        prefix: &[u8],
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.with_cursor(table, index, |cur| {
            let mut rows = Vec::new();
            cur.seek_range(prefix)?;
            while let Some((key, value)) = cur.next()? {
                if !key.starts_with(prefix) {
                    break;
                }
                rows.push((key, value));
            }
            Ok(rows)
        })
    }

    /// The greatest key in the index, if any
    pub fn last_row(
        &mut self,
        table: StoreTable,
        index: &'static str,
    ) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        self.with_cursor(table, index, |cur| {
            cur.seek_end()?;
            cur.prev()
        })
    }
}

struct PoolState {
    idle: Vec<StoreConnection>,
    checked_out: usize,
}

/// LIFO connection pool with a fail-fast cap
pub struct ConnectionPool {
    backend: Arc<dyn StoreBackend>,
    state: Mutex<PoolState>,
    max_connections: usize,
}

impl ConnectionPool {
    pub fn new(backend: Arc<dyn StoreBackend>, max_connections: usize) -> Self {
        Self {
            backend,
            state: Mutex::new(PoolState {
                idle: Vec::new(),
                checked_out: 0,
            }),
            max_connections,
        }
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Connections currently checked out
    pub fn in_use(&self) -> usize {
        self.state.lock().checked_out
    }

    /// Idle connections available for reuse
    pub fn idle(&self) -> usize {
        self.state.lock().idle.len()
    }

    /// Check a connection out, reusing the most recently returned one
    ///
    /// Fails immediately with `ConnectionLimit` when the cap is reached;
    /// requests never queue.
    pub fn acquire(self: &Arc<Self>) -> StoreResult<PooledConnection> {
        let mut state = self.state.lock();
        if let Some(connection) = state.idle.pop() {
            state.checked_out += 1;
            return Ok(PooledConnection {
                connection: Some(connection),
                pool: Arc::clone(self),
            });
        }
        if state.checked_out >= self.max_connections {
            return Err(StoreError::ConnectionLimit(self.max_connections));
        }
        state.checked_out += 1;
        drop(state);

        let session = match self.backend.session() {
            Ok(session) => session,
            Err(e) => {
                self.state.lock().checked_out -= 1;
                return Err(e);
            }
        };
        let cache_cursors = self.backend.supports_concurrent_cursors();
        Ok(PooledConnection {
            connection: Some(StoreConnection::new(session, cache_cursors)),
            pool: Arc::clone(self),
        })
    }

    fn release(&self, mut connection: StoreConnection) {
        let mut state = self.state.lock();
        state.checked_out = state.checked_out.saturating_sub(1);

        // A connection returned mid-transaction is unwound before reuse;
        // if unwinding fails the connection is discarded.
        while connection.in_transaction() {
            if let Err(e) = connection.rollback() {
                log::warn!("Discarding pooled connection after failed rollback: {}", e);
                return;
            }
        }
        state.idle.push(connection);
    }
}

/// Checked-out connection; returns itself to the pool on drop
pub struct PooledConnection {
    connection: Option<StoreConnection>,
    pool: Arc<ConnectionPool>,
}

impl Deref for PooledConnection {
    type Target = StoreConnection;

    fn deref(&self) -> &StoreConnection {
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut StoreConnection {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.release(connection);
        }
    }
}
