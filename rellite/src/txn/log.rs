// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Generic reversible operation log
//!
//! Records "command + inverse" instructions between nestable begin markers.
//! Commit discards the innermost level without undoing anything; rollback
//! replays the innermost level's instructions in strict reverse order of
//! original application.

use thiserror::Error;

/// An instruction that captures exactly the state needed to undo one
/// mutation
pub trait ReversibleInstruction {
    /// State the undo applies to
    type Context;
    /// Undo failure type; failures are logged, not fatal to the sweep
    type Error: std::fmt::Display;

    fn undo(&self, ctx: &mut Self::Context) -> Result<(), Self::Error>;

    /// Short description for undo-failure logging
    fn describe(&self) -> String;
}

/// Errors from log-level bookkeeping (not from individual undos)
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TxnLogError {
    #[error("No transaction is open on this log")]
    NoOpenTransaction,
}

/// One log entry: a transaction-level delimiter or a recorded instruction
#[derive(Debug, Clone)]
pub enum LogEntry<I> {
    /// Delimits one transaction level
    BeginMarker,
    Instruction(I),
}

/// Result of a rollback sweep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollbackOutcome {
    /// Instructions undone successfully
    pub undone: usize,
    /// Instructions whose undo raised; logged and skipped
    pub failed: usize,
}

impl RollbackOutcome {
    pub fn total(&self) -> usize {
        self.undone + self.failed
    }
}

/// Reversible operation log with nestable transaction levels
#[derive(Debug)]
pub struct OperationLog<I> {
    entries: Vec<LogEntry<I>>,
    open_markers: usize,
}

impl<I> Default for OperationLog<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> OperationLog<I> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            open_markers: 0,
        }
    }

    /// Total entry count, markers included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of open transaction levels
    pub fn depth(&self) -> usize {
        self.open_markers
    }

    pub fn in_transaction(&self) -> bool {
        self.open_markers > 0
    }

    /// Open a transaction level
    pub fn begin(&mut self) {
        self.entries.push(LogEntry::BeginMarker);
        self.open_markers += 1;
    }

    /// Record an instruction under the current level
    ///
    /// Callers decide whether recording applies (e.g. the DDL layer skips
    /// recording in a loading context); the log itself does not filter.
    pub fn record(&mut self, instruction: I) {
        self.entries.push(LogEntry::Instruction(instruction));
    }
}

impl<I: ReversibleInstruction> OperationLog<I> {
    /// Close the innermost level, discarding its entries without undo
    pub fn commit(&mut self) -> Result<(), TxnLogError> {
        if self.open_markers == 0 {
            return Err(TxnLogError::NoOpenTransaction);
        }
        while let Some(entry) = self.entries.pop() {
            if matches!(entry, LogEntry::BeginMarker) {
                self.open_markers -= 1;
                return Ok(());
            }
        }
        // The marker count said a level was open; the entries must contain it.
        unreachable!("open marker count out of sync with log entries");
    }

    /// Close the innermost level, undoing its instructions in strict reverse
    /// order of original application
    ///
    /// Undo failures are logged individually and the remaining sweep still
    /// runs: a correlated store-level rollback may already have reverted a
    /// row, making a redundant undo failure unsurprising and non-fatal.
    pub fn rollback(&mut self, ctx: &mut I::Context) -> Result<RollbackOutcome, TxnLogError> {
        if self.open_markers == 0 {
            return Err(TxnLogError::NoOpenTransaction);
        }
        let mut outcome = RollbackOutcome {
            undone: 0,
            failed: 0,
        };
        while let Some(entry) = self.entries.pop() {
            match entry {
                LogEntry::BeginMarker => {
                    self.open_markers -= 1;
                    return Ok(outcome);
                }
                LogEntry::Instruction(instruction) => match instruction.undo(ctx) {
                    Ok(()) => outcome.undone += 1,
                    Err(e) => {
                        outcome.failed += 1;
                        log::warn!("Undo failed for {}: {}", instruction.describe(), e);
                    }
                },
            }
        }
        unreachable!("open marker count out of sync with log entries");
    }
}
