// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Nested store-transaction emulation
//!
//! The bundled backends expose one native transaction level. Levels beyond
//! the first are simulated: every row mutation performed at depth > 1
//! records the compensating inverse statement, and rolling back a
//! non-outermost level replays those compensations in reverse. Committing a
//! non-outermost level discards them; the native transaction still covers
//! everything if the outermost level rolls back.

use crate::txn::ReversibleInstruction;

use super::cursor::BackendSession;
use super::tables::StoreTable;
use super::types::{StoreError, StoreResult};

/// Inverse of one row mutation, replayed on emulated rollback
#[derive(Debug)]
pub enum CompensatingStatement {
    /// Undo of an insert
    Remove {
        table: StoreTable,
        index: &'static str,
        key: Vec<u8>,
    },
    /// Undo of an update: restore the prior value
    Restore {
        table: StoreTable,
        index: &'static str,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Undo of a delete: put the row back
    Reinsert {
        table: StoreTable,
        index: &'static str,
        key: Vec<u8>,
        value: Vec<u8>,
    },
}

impl CompensatingStatement {
    fn apply(&self, session: &mut Box<dyn BackendSession>) -> StoreResult<()> {
        match self {
            CompensatingStatement::Remove { table, index, key } => {
                let mut cursor = session.cursor(*table, index)?;
                cursor.delete(key)
            }
            CompensatingStatement::Restore {
                table,
                index,
                key,
                value,
            } => {
                let mut cursor = session.cursor(*table, index)?;
                cursor.update(key, value)
            }
            CompensatingStatement::Reinsert {
                table,
                index,
                key,
                value,
            } => {
                let mut cursor = session.cursor(*table, index)?;
                cursor.insert(key, value)
            }
        }
    }
}

impl ReversibleInstruction for CompensatingStatement {
    type Context = Box<dyn BackendSession>;
    type Error = StoreError;

    fn undo(&self, session: &mut Self::Context) -> Result<(), Self::Error> {
        self.apply(session)
    }

    fn describe(&self) -> String {
        match self {
            CompensatingStatement::Remove { table, index, .. } => {
                format!("remove from {}.{}", table.header().name, index)
            }
            CompensatingStatement::Restore { table, index, .. } => {
                format!("restore in {}.{}", table.header().name, index)
            }
            CompensatingStatement::Reinsert { table, index, .. } => {
                format!("reinsert into {}.{}", table.header().name, index)
            }
        }
    }
}
