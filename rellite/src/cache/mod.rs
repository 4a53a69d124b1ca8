// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog caching layer
//!
//! Two caches live here: the generic bounded adaptive cache and the name
//! resolution cache built on top of it. Both use a lock independent of the
//! catalog-wide lock, so lookups never block on catalog mutation.

pub mod adaptive;
pub mod config;
pub mod name_cache;

pub use adaptive::{
    BoundedCache, BoundedCacheStats, DEFAULT_CORRELATED_REFERENCE_PERIOD, DEFAULT_CUTOFF_FRACTION,
    MIN_CACHE_SIZE,
};
pub use config::CacheSettings;
pub use name_cache::{NameResolutionCache, NameResolutionCacheStats};

use thiserror::Error;

/// Errors raised by the caching layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error("Cache capacity {0} is below the minimum of {MIN_CACHE_SIZE}")]
    CapacityTooSmall(usize),

    #[error("Cutoff fraction {0} is outside the range 0.0..=1.0")]
    InvalidCutoffFraction(f64),
}
