// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory storage backend
//!
//! Keeps every index tree as an ordered map. Transactions are implemented
//! with a before-image log: each mutation inside a transaction records the
//! prior value of the touched key, and rollback restores those images in
//! reverse. Exactly one native transaction level is supported; deeper
//! nesting is emulated by the connection layer.
//!
//! Primarily used by tests and by the `memory` feature, but fully
//! functional as a non-durable catalog store.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::cursor::{BackendKind, BackendSession, CursorPosition, StoreBackend, TableCursor};
use super::tables::StoreTable;
use super::types::{StoreError, StoreResult};

type Tree = Arc<RwLock<BTreeMap<Vec<u8>, Vec<u8>>>>;

/// Prior value of one key, captured before a mutation inside a transaction
struct BeforeImage {
    tree: Tree,
    key: Vec<u8>,
    prior: Option<Vec<u8>>,
}

/// Shared between a session and the cursors it handed out, so cursor
/// mutations land in the session's undo log
struct TxnState {
    active: bool,
    images: Vec<BeforeImage>,
}

/// Non-durable ordered-map backend
pub struct MemoryBackend {
    trees: Arc<RwLock<HashMap<String, Tree>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            trees: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreBackend for MemoryBackend {
    fn session(&self) -> StoreResult<Box<dyn BackendSession>> {
        Ok(Box::new(MemorySession {
            trees: Arc::clone(&self.trees),
            txn: Arc::new(Mutex::new(TxnState {
                active: false,
                images: Vec::new(),
            })),
        }))
    }

    fn supports_concurrent_cursors(&self) -> bool {
        true
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Memory
    }
}

pub struct MemorySession {
    trees: Arc<RwLock<HashMap<String, Tree>>>,
    txn: Arc<Mutex<TxnState>>,
}

impl MemorySession {
    fn tree(&self, name: &str) -> Tree {
        if let Some(tree) = self.trees.read().get(name) {
            return Arc::clone(tree);
        }
        let mut trees = self.trees.write();
        Arc::clone(
            trees
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(BTreeMap::new()))),
        )
    }
}

impl BackendSession for MemorySession {
    fn begin(&mut self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if txn.active {
            return Err(StoreError::Backend(
                "memory session already has a transaction open".to_string(),
            ));
        }
        txn.active = true;
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if !txn.active {
            return Err(StoreError::NoTransaction);
        }
        txn.images.clear();
        txn.active = false;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if !txn.active {
            return Err(StoreError::NoTransaction);
        }
        while let Some(image) = txn.images.pop() {
            let mut tree = image.tree.write();
            match image.prior {
                Some(value) => {
                    tree.insert(image.key, value);
                }
                None => {
                    tree.remove(&image.key);
                }
            }
        }
        txn.active = false;
        Ok(())
    }

    fn in_transaction(&self) -> bool {
        self.txn.lock().active
    }

    fn cursor(&mut self, table: StoreTable, index: &str) -> StoreResult<Box<dyn TableCursor>> {
        let header = table.header();
        if header.index(index).is_none() {
            return Err(StoreError::Backend(format!(
                "No index {} on table {}",
                index, header.name
            )));
        }
        Ok(Box::new(MemoryCursor {
            table,
            tree: self.tree(&table.tree_name(index)),
            txn: Arc::clone(&self.txn),
            position: CursorPosition::Start,
        }))
    }
}

pub struct MemoryCursor {
    table: StoreTable,
    tree: Tree,
    txn: Arc<Mutex<TxnState>>,
    position: CursorPosition,
}

impl MemoryCursor {
    fn record_image(&self, key: &[u8], prior: Option<Vec<u8>>) {
        let mut txn = self.txn.lock();
        if txn.active {
            txn.images.push(BeforeImage {
                tree: Arc::clone(&self.tree),
                key: key.to_vec(),
                prior,
            });
        }
    }
}

impl TableCursor for MemoryCursor {
    fn seek(&mut self, key: &[u8]) -> StoreResult<bool> {
        let exists = self.tree.read().contains_key(key);
        self.position = CursorPosition::Before(key.to_vec());
        Ok(exists)
    }

    fn seek_range(&mut self, start: &[u8]) -> StoreResult<()> {
        self.position = CursorPosition::Before(start.to_vec());
        Ok(())
    }

    fn seek_end(&mut self) -> StoreResult<()> {
        self.position = CursorPosition::End;
        Ok(())
    }

    fn next(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let tree = self.tree.read();
        let entry = match &self.position {
            CursorPosition::Start => tree.iter().next(),
            CursorPosition::Before(k) => tree.range(k.clone()..).next(),
            CursorPosition::After(k) => tree
                .range((Bound::Excluded(k.clone()), Bound::Unbounded))
                .next(),
            CursorPosition::End => None,
        };
        let entry = entry.map(|(k, v)| (k.clone(), v.clone()));
        drop(tree);
        match &entry {
            Some((k, _)) => self.position = CursorPosition::After(k.clone()),
            None => self.position = CursorPosition::End,
        }
        Ok(entry)
    }

    fn prev(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let tree = self.tree.read();
        let entry = match &self.position {
            CursorPosition::Start => None,
            CursorPosition::Before(k) => tree.range(..k.clone()).next_back(),
            CursorPosition::After(k) => tree.range(..=k.clone()).next_back(),
            CursorPosition::End => tree.iter().next_back(),
        };
        let entry = entry.map(|(k, v)| (k.clone(), v.clone()));
        drop(tree);
        match &entry {
            Some((k, _)) => self.position = CursorPosition::Before(k.clone()),
            None => self.position = CursorPosition::Start,
        }
        Ok(entry)
    }

    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.read().get(key).cloned())
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let mut tree = self.tree.write();
        if tree.contains_key(key) {
            return Err(StoreError::DuplicateKey {
                table: self.table.header().name,
            });
        }
        drop(tree);
        self.record_image(key, None);
        self.tree.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        let prior = self.tree.read().get(key).cloned();
        match prior {
            Some(old) => {
                self.record_image(key, Some(old));
                self.tree.write().insert(key.to_vec(), value.to_vec());
                Ok(())
            }
            None => Err(StoreError::RowNotFound {
                table: self.table.header().name,
            }),
        }
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        let prior = self.tree.read().get(key).cloned();
        match prior {
            Some(old) => {
                self.record_image(key, Some(old));
                self.tree.write().remove(key);
                Ok(())
            }
            None => Err(StoreError::RowNotFound {
                table: self.table.header().name,
            }),
        }
    }
}
