// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Store error handling
//!
//! Error type shared by every backend and by the connection layer. Designed
//! to be easily converted from underlying storage engine errors.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    /// Row addressed by key does not exist
    #[error("Row not found in {table}")]
    RowNotFound { table: &'static str },

    /// Unique key collision on insert
    #[error("Duplicate key in {table}")]
    DuplicateKey { table: &'static str },

    /// Hard cap on concurrent connections reached; never queues
    #[error("Connection limit of {0} exceeded")]
    ConnectionLimit(usize),

    /// Commit/rollback without a matching begin
    #[error("No store transaction is active")]
    NoTransaction,

    /// Row payload encode/decode failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Driver-specific failure (sled, I/O, ...)
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for StoreError {
    fn from(err: sled::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
