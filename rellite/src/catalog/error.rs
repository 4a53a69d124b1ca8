// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the catalog subsystem
//!
//! Every failure carries a stable numeric code and a severity in addition to
//! its formatted message, so callers up the stack can report errors without
//! knowing the variant.

use thiserror::Error;

use super::object::ObjectId;
use crate::cache::{CacheError, MIN_CACHE_SIZE};
use crate::store::types::StoreError;

/// Who is expected to act on an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Caused by user input (missing object, duplicate name)
    User,
    /// Caused by incorrect use of the catalog API
    Application,
    /// Internal invariant violation or corruption
    System,
    /// Resource exhaustion or unavailable infrastructure
    Environment,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Object not found: {0}")]
    ObjectNotFound(String),

    #[error("Object not found: #{0}")]
    ObjectIdNotFound(ObjectId),

    #[error("Right not found: {0}")]
    RightNotFound(String),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Device not found: #{0}")]
    DeviceNotFound(ObjectId),

    #[error("No header for store table: {0}")]
    HeaderNotFound(String),

    #[error("Duplicate object name: {0}")]
    DuplicateObjectName(String),

    #[error("Duplicate object id: #{0}")]
    DuplicateObjectId(ObjectId),

    #[error("Cache capacity {0} is below the minimum of {MIN_CACHE_SIZE}")]
    CacheCapacity(usize),

    #[error("Invalid cache settings: {0}")]
    InvalidCacheSettings(String),

    #[error("Object #{0} is already being loaded; dependency cycle suspected")]
    ConcurrentLoad(ObjectId),

    #[error("Store connection limit of {0} exceeded")]
    ConnectionLimit(usize),

    #[error("Catalog store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("{failed} of {total} undo instructions failed during rollback")]
    RollbackPartialFailure { failed: usize, total: usize },

    #[error("No transaction is active")]
    NoActiveTransaction,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    /// Stable numeric error code
    pub fn code(&self) -> u32 {
        match self {
            CatalogError::ObjectNotFound(_) => 115100,
            CatalogError::ObjectIdNotFound(_) => 115101,
            CatalogError::RightNotFound(_) => 115102,
            CatalogError::UserNotFound(_) => 115103,
            CatalogError::DeviceNotFound(_) => 115104,
            CatalogError::HeaderNotFound(_) => 115105,
            CatalogError::DuplicateObjectName(_) => 115110,
            CatalogError::DuplicateObjectId(_) => 115111,
            CatalogError::CacheCapacity(_) => 115120,
            CatalogError::InvalidCacheSettings(_) => 115121,
            CatalogError::ConcurrentLoad(_) => 115130,
            CatalogError::ConnectionLimit(_) => 115140,
            CatalogError::StoreUnavailable(_) => 115141,
            CatalogError::RollbackPartialFailure { .. } => 115150,
            CatalogError::NoActiveTransaction => 115151,
            CatalogError::Serialization(_) => 115160,
            CatalogError::Storage(_) => 115161,
        }
    }

    /// Severity classification
    pub fn severity(&self) -> Severity {
        match self {
            CatalogError::ObjectNotFound(_)
            | CatalogError::ObjectIdNotFound(_)
            | CatalogError::RightNotFound(_)
            | CatalogError::UserNotFound(_)
            | CatalogError::DeviceNotFound(_)
            | CatalogError::DuplicateObjectName(_)
            | CatalogError::DuplicateObjectId(_) => Severity::User,
            CatalogError::CacheCapacity(_)
            | CatalogError::InvalidCacheSettings(_)
            | CatalogError::NoActiveTransaction => Severity::Application,
            CatalogError::HeaderNotFound(_)
            | CatalogError::ConcurrentLoad(_)
            | CatalogError::RollbackPartialFailure { .. }
            | CatalogError::Serialization(_)
            | CatalogError::Storage(_) => Severity::System,
            CatalogError::ConnectionLimit(_) | CatalogError::StoreUnavailable(_) => {
                Severity::Environment
            }
        }
    }
}

impl From<CacheError> for CatalogError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::CapacityTooSmall(size) => CatalogError::CacheCapacity(size),
            CacheError::InvalidCutoffFraction(f) => {
                CatalogError::InvalidCacheSettings(format!("cutoff fraction {}", f))
            }
        }
    }
}

impl From<StoreError> for CatalogError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConnectionLimit(limit) => CatalogError::ConnectionLimit(limit),
            StoreError::Serialization(msg) => CatalogError::Serialization(msg),
            other => CatalogError::Storage(other.to_string()),
        }
    }
}

impl From<bincode::Error> for CatalogError {
    fn from(err: bincode::Error) -> Self {
        CatalogError::Serialization(err.to_string())
    }
}

pub type CatalogResult<T> = Result<T, CatalogError>;
