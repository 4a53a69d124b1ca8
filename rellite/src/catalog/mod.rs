// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog subsystem
//!
//! The authoritative registry of every schema object the engine knows
//! about: tables, views, types, operators, constraints, references,
//! devices, users, roles, and rights. The catalog keeps a mutable
//! in-memory object graph consistent with the persistent store across
//! nested transactions, serves name lookups through bounded caches, and
//! loads dependency closures on demand.
//!
//! [`manager::Catalog`] is the single external interface; everything else
//! supports it.

pub mod ddl;
pub mod error;
pub mod manager;
pub mod name;
pub mod object;
pub mod operations;
pub mod registry;

pub use ddl::{DdlInstruction, DdlTransactionLog, DeferredAction};
pub use error::{CatalogError, CatalogResult, Severity};
pub use manager::{Catalog, CatalogSession, CatalogStats};
pub use object::{
    DeviceState, IdGenerator, ObjectFlags, ObjectHeader, ObjectId, ObjectKind, Right, SchemaObject,
};
pub use registry::{CatalogIndex, CatalogState};
