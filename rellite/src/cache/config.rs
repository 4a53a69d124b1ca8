// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cache configuration

use serde::{Deserialize, Serialize};

use super::adaptive::{
    DEFAULT_CORRELATED_REFERENCE_PERIOD, DEFAULT_CUTOFF_FRACTION, MIN_CACHE_SIZE,
};
use super::CacheError;

/// Default capacity for the object-name resolution cache
pub const DEFAULT_NAME_CACHE_SIZE: usize = 1000;

/// Default capacity for the operator-name resolution cache
pub const DEFAULT_OPERATOR_NAME_CACHE_SIZE: usize = 1000;

/// Settings for the name resolution caches
///
/// Capacities are settable at runtime; applying a new capacity discards the
/// affected cache rather than migrating entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// Capacity of the plain object-name cache
    pub name_cache_size: usize,

    /// Capacity of the operator-name cache
    pub operator_name_cache_size: usize,

    /// Fraction of each cache kept in the protected region
    pub cutoff_fraction: f64,

    /// Correlated-reference period in logical ticks
    pub correlated_reference_period: u64,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            name_cache_size: DEFAULT_NAME_CACHE_SIZE,
            operator_name_cache_size: DEFAULT_OPERATOR_NAME_CACHE_SIZE,
            cutoff_fraction: DEFAULT_CUTOFF_FRACTION,
            correlated_reference_period: DEFAULT_CORRELATED_REFERENCE_PERIOD,
        }
    }
}

impl CacheSettings {
    /// Validate the settings against the cache minimums
    pub fn validate(&self) -> Result<(), CacheError> {
        if self.name_cache_size < MIN_CACHE_SIZE {
            return Err(CacheError::CapacityTooSmall(self.name_cache_size));
        }
        if self.operator_name_cache_size < MIN_CACHE_SIZE {
            return Err(CacheError::CapacityTooSmall(self.operator_name_cache_size));
        }
        if !(0.0..=1.0).contains(&self.cutoff_fraction) {
            return Err(CacheError::InvalidCutoffFraction(self.cutoff_fraction));
        }
        Ok(())
    }
}
