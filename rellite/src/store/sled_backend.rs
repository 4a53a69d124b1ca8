// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sled storage backend
//!
//! Persists each index tree as a named sled tree. Like the memory backend,
//! the one native transaction level is implemented with a before-image log
//! rather than sled's closure-based transaction API, which cannot span a
//! begin/commit session. Commit flushes the database so a clean process
//! exit leaves the catalog durable.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::cursor::{BackendKind, BackendSession, CursorPosition, StoreBackend, TableCursor};
use super::tables::StoreTable;
use super::types::{StoreError, StoreResult};

struct BeforeImage {
    tree: sled::Tree,
    key: Vec<u8>,
    prior: Option<Vec<u8>>,
}

struct TxnState {
    active: bool,
    images: Vec<BeforeImage>,
}

/// Durable sled-backed store
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Open (or create) a catalog database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// Open a throwaway database that never touches disk after close
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }
}

impl StoreBackend for SledBackend {
    fn session(&self) -> StoreResult<Box<dyn BackendSession>> {
        Ok(Box::new(SledSession {
            db: self.db.clone(),
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
        BackendKind::Sled
    }
}

pub struct SledSession {
    db: sled::Db,
    txn: Arc<Mutex<TxnState>>,
}

impl BackendSession for SledSession {
    fn begin(&mut self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if txn.active {
            return Err(StoreError::Backend(
                "sled session already has a transaction open".to_string(),
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
        drop(txn);
        self.db.flush()?;
        Ok(())
    }

    fn rollback(&mut self) -> StoreResult<()> {
        let mut txn = self.txn.lock();
        if !txn.active {
            return Err(StoreError::NoTransaction);
        }
        while let Some(image) = txn.images.pop() {
            match image.prior {
                Some(value) => {
                    image.tree.insert(image.key, value)?;
                }
                None => {
                    image.tree.remove(image.key)?;
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
        let tree = self.db.open_tree(table.tree_name(index))?;
        Ok(Box::new(SledCursor {
            table,
            tree,
            txn: Arc::clone(&self.txn),
            position: CursorPosition::Start,
        }))
    }
}

pub struct SledCursor {
    table: StoreTable,
    tree: sled::Tree,
    txn: Arc<Mutex<TxnState>>,
    position: CursorPosition,
}

impl SledCursor {
    fn record_image(&self, key: &[u8], prior: Option<Vec<u8>>) {
        let mut txn = self.txn.lock();
        if txn.active {
            txn.images.push(BeforeImage {
                tree: self.tree.clone(),
                key: key.to_vec(),
                prior,
            });
        }
    }

    fn entry_to_pair(
        entry: Option<Result<(sled::IVec, sled::IVec), sled::Error>>,
    ) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        match entry {
            Some(Ok((k, v))) => Ok(Some((k.to_vec(), v.to_vec()))),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

impl TableCursor for SledCursor {
    fn seek(&mut self, key: &[u8]) -> StoreResult<bool> {
        let exists = self.tree.contains_key(key)?;
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
        let entry = match &self.position {
            CursorPosition::Start => Self::entry_to_pair(self.tree.iter().next())?,
            CursorPosition::Before(k) => Self::entry_to_pair(self.tree.range(k.clone()..).next())?,
            CursorPosition::After(k) => {
                let mut range = self.tree.range(k.clone()..);
                let mut found = Self::entry_to_pair(range.next())?;
                // The range is inclusive at the anchor; skip it if present.
                if matches!(&found, Some((key, _)) if key == k) {
                    found = Self::entry_to_pair(range.next())?;
                }
                found
            }
            CursorPosition::End => None,
        };
        match &entry {
            Some((k, _)) => self.position = CursorPosition::After(k.clone()),
            None => self.position = CursorPosition::End,
        }
        Ok(entry)
    }

    fn prev(&mut self) -> StoreResult<Option<(Vec<u8>, Vec<u8>)>> {
        let entry = match &self.position {
            CursorPosition::Start => None,
            CursorPosition::Before(k) => {
                Self::entry_to_pair(self.tree.range(..k.clone()).next_back())?
            }
            CursorPosition::After(k) => {
                Self::entry_to_pair(self.tree.range(..=k.clone()).next_back())?
            }
            CursorPosition::End => Self::entry_to_pair(self.tree.iter().next_back())?,
        };
        match &entry {
            Some((k, _)) => self.position = CursorPosition::Before(k.clone()),
            None => self.position = CursorPosition::Start,
        }
        Ok(entry)
    }

    fn get(&mut self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|v| v.to_vec()))
    }

    fn insert(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        if self.tree.contains_key(key)? {
            return Err(StoreError::DuplicateKey {
                table: self.table.header().name,
            });
        }
        self.record_image(key, None);
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> StoreResult<()> {
        match self.tree.get(key)? {
            Some(old) => {
                self.record_image(key, Some(old.to_vec()));
                self.tree.insert(key, value)?;
                Ok(())
            }
            None => Err(StoreError::RowNotFound {
                table: self.table.header().name,
            }),
        }
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<()> {
        match self.tree.get(key)? {
            Some(old) => {
                self.record_image(key, Some(old.to_vec()));
                self.tree.remove(key)?;
                Ok(())
            }
            None => Err(StoreError::RowNotFound {
                table: self.table.header().name,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rollback_restores_rows() {
        let backend = SledBackend::temporary().unwrap();
        let mut session = backend.session().unwrap();
        {
            let mut cur = session.cursor(StoreTable::Rights, "pk_rights").unwrap();
            cur.insert(b"keep\0", b"original").unwrap();
        }

        session.begin().unwrap();
        {
            let mut cur = session.cursor(StoreTable::Rights, "pk_rights").unwrap();
            cur.insert(b"added\0", b"v").unwrap();
            cur.update(b"keep\0", b"changed").unwrap();
        }
        session.rollback().unwrap();

        let mut cur = session.cursor(StoreTable::Rights, "pk_rights").unwrap();
        assert_eq!(cur.get(b"keep\0").unwrap(), Some(b"original".to_vec()));
        assert_eq!(cur.get(b"added\0").unwrap(), None);
    }

    #[test]
    fn test_reopen_preserves_committed_rows() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = SledBackend::open(dir.path()).unwrap();
            let mut session = backend.session().unwrap();
            session.begin().unwrap();
            {
                let mut cur = session.cursor(StoreTable::Rights, "pk_rights").unwrap();
                cur.insert(b"durable\0", b"v").unwrap();
            }
            session.commit().unwrap();
        }

        let backend = SledBackend::open(dir.path()).unwrap();
        let mut session = backend.session().unwrap();
        let mut cur = session.cursor(StoreTable::Rights, "pk_rights").unwrap();
        assert_eq!(cur.get(b"durable\0").unwrap(), Some(b"v".to_vec()));
    }

    #[test]
    fn test_traversal_after_anchor() {
        let backend = SledBackend::temporary().unwrap();
        let mut session = backend.session().unwrap();
        let mut cur = session.cursor(StoreTable::Rights, "pk_rights").unwrap();
        for key in ["a", "b", "c"] {
            cur.insert(key.as_bytes(), b"v").unwrap();
        }

        assert!(cur.seek(b"a").unwrap());
        assert_eq!(cur.next().unwrap().unwrap().0, b"a".to_vec());
        assert_eq!(cur.next().unwrap().unwrap().0, b"b".to_vec());
        assert_eq!(cur.prev().unwrap().unwrap().0, b"b".to_vec());
        assert_eq!(cur.prev().unwrap().unwrap().0, b"a".to_vec());
    }
}
