// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Reversible operation logging
//!
//! One abstraction, used twice: the DDL transaction log undoes in-memory
//! catalog mutations, and the store's nested-transaction emulator undoes row
//! mutations on backends without native savepoints.

pub mod log;

pub use log::{LogEntry, OperationLog, ReversibleInstruction, RollbackOutcome, TxnLogError};
