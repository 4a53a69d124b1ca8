// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Backend contract: sessions and table cursors
//!
//! Any storage backend plugs into the catalog store by implementing these
//! traits. The required capability set is narrow: table-direct cursors
//! addressable by named index, exact and range key seek, forward and
//! backward traversal, single-row insert/update/delete, and at least one
//! transaction level. Savepoints are optional; deeper nesting is emulated
//! above this layer.

use super::tables::StoreTable;
use super::types::StoreResult;

/// Which bundled backend a store was opened with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Memory,
    #[cfg(feature = "sled-backend")]
    Sled,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BackendKind::Memory => "memory",
            #[cfg(feature = "sled-backend")]
            BackendKind::Sled => "sled",
        };
        write!(f, "{}", name)
    }
}

/// A positioned cursor over one named index of one logical table
///
/// Traversal semantics: `seek_range(start)` positions before the first key
/// `>= start`, so the following `next()` returns it. `seek(key)` reports
/// whether the exact key exists and positions the same way. `next`/`prev`
/// move the position past the returned entry. Row mutations do not move the
/// position.
pub trait TableCursor: Send {
    fn seek(&mut self, key: &[u8]) -> StoreResult<bool>;

    fn seek_range(&mut self, start: &[u8]) -> StoreResult<()>;

    /// Position past the end, so `prev()` returns the last entry
    fn seek_end(&mut self) -> StoreResult<()>;

    fn next(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;

    fn prev(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>>;

    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    /// Insert a row; fails with `DuplicateKey` if the key exists
    fn insert(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Replace a row; fails with `RowNotFound` if the key is absent
    fn update(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()>;

    /// Remove a row; fails with `RowNotFound` if the key is absent
    fn delete(&mut self, key: &[u8]) -> StoreResult<()>;
}

/// One backend session: a unit of work with one native transaction level
///
/// Sessions are never shared across threads; each checked-out connection
/// owns one.
pub trait BackendSession: Send {
    /// Open the native transaction level
    fn begin(&mut self) -> StoreResult<()>;

    fn commit(&mut self) -> StoreResult<()>;

    fn rollback(&mut self) -> StoreResult<()>;

    fn in_transaction(&self) -> bool;

    /// Open a cursor addressed by table and index name
    fn cursor(&mut self, table: StoreTable, index: &str) -> StoreResult<Box<dyn TableCursor>>;
}

/// Position bookkeeping shared by the bundled backends
///
/// The cursor always sits between entries, keyed off the last key it
/// returned or was seeked to.
pub(crate) enum CursorPosition {
    /// Before the first entry
    Start,
    /// Just before this key: `next()` returns the first key `>=` it
    Before(Vec<u8>),
    /// Just after this key: `next()` returns the first key `>` it
    After(Vec<u8>),
    /// Past the last entry
    End,
}

/// A storage backend able to hand out sessions
pub trait StoreBackend: Send + Sync {
    fn session(&self) -> StoreResult<Box<dyn BackendSession>>;

    /// Whether the backend supports more than one native transaction level
    fn supports_nested_transactions(&self) -> bool {
        false
    }

    /// Whether cursors stay valid while other cursors mutate; enables the
    /// per-transaction cursor cache
    fn supports_concurrent_cursors(&self) -> bool;

    fn kind(&self) -> BackendKind;
}
