// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! RelLite - A lightweight embedded relational database catalog
//!
//! RelLite provides the metadata catalog subsystem of a relational engine:
//! the authoritative, cached, and durably persisted registry of every
//! schema object the engine knows about.
//!
//! # Features
//!
//! - **Catalog Registry**: In-memory object graph with a bijective
//!   ID/rooted-name index
//! - **Adaptive Caching**: Bounded LRU name-resolution caches with
//!   correlated-reference suppression
//! - **Nested Transactions**: DDL rollback via a reversible operation log,
//!   with store-level nesting emulated on single-level backends
//! - **Durable Store**: Qualifier-depth name index, dependency-ordered
//!   loading, and pooled connections over Sled or an in-memory backend
//!
//! # Usage
//!
//! ```no_run
//! use rellite::catalog::{Catalog, ObjectKind, SchemaObject};
//!
//! let catalog = Catalog::in_memory()?;
//! let mut session = catalog.session();
//!
//! session.begin()?;
//! let id = session.create_object(
//!     SchemaObject::new(0, "Main.Customer", ObjectKind::BaseTable).persistent(),
//! )?;
//! session.commit()?;
//!
//! let object = catalog.resolve_by_id(id)?;
//! assert_eq!(object.name, "Main.Customer");
//! # Ok::<(), rellite::catalog::CatalogError>(())
//! ```

// Public modules - the catalog is the external interface, the supporting
// layers stay reachable for embedders and tests
pub mod cache;
pub mod catalog;
pub mod store;
pub mod txn;

// Re-export the primary API surface
pub use catalog::{
    Catalog, CatalogError, CatalogResult, CatalogSession, CatalogStats, ObjectHeader, ObjectId,
    ObjectKind, SchemaObject, Severity,
};

/// RelLite version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// RelLite crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
