// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persistent catalog store
//!
//! Cursor-based persistence for the catalog over a fixed set of logical
//! tables. The facade owns a backend and a connection pool; every operation
//! runs against an explicit connection so the caller controls transaction
//! scope and nesting.
//!
//! Saving an object also maintains its derived rows: the qualifier-depth
//! name index (one row per suffix of the rooted name), the ordered
//! dependency rows, the generator secondary index, and the catalog-object
//! header row for top-level objects.

pub mod connection;
pub mod cursor;
pub mod loader;
pub mod memory;
pub mod nested;
pub mod rows;
#[cfg(feature = "sled-backend")]
pub mod sled_backend;
pub mod tables;
pub mod types;

use std::sync::Arc;

use crate::catalog::name;
use crate::catalog::object::{ObjectId, Right, SchemaObject};

pub use connection::{ConnectionPool, PooledConnection, StoreConnection, DEFAULT_MAX_CONNECTIONS};
pub use cursor::{BackendKind, BackendSession, StoreBackend, TableCursor};
pub use tables::{decode_id, encode_id, KeyBuilder, StoreTable, IDX_OBJECTS_GENERATOR};
pub use types::{StoreError, StoreResult};

use memory::MemoryBackend;
use rows::{
    decode, encode, ApplicationTransactionRow, CatalogObjectRow, DependencyRow, DeviceObjectRow,
    DeviceRow, ObjectNameRow, ObjectRow, RightRow, RoleRightAssignmentRow, UserRightAssignmentRow,
};

const PK_OBJECTS: &str = "pk_objects";
const PK_CATALOG_OBJECTS: &str = "pk_catalog_objects";
const PK_OBJECT_NAMES: &str = "pk_object_names";
const PK_DEPENDENCIES: &str = "pk_dependencies";
const PK_RIGHTS: &str = "pk_rights";
const PK_ROLE_RIGHT_ASSIGNMENTS: &str = "pk_role_right_assignments";
const PK_USER_RIGHT_ASSIGNMENTS: &str = "pk_user_right_assignments";
const PK_DEVICES: &str = "pk_devices";
const PK_DEVICE_OBJECTS: &str = "pk_device_objects";
const PK_APPLICATION_TRANSACTIONS: &str = "pk_application_transactions";

/// Per-table row counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    pub rows: Vec<(&'static str, usize)>,
}

impl StoreStats {
    pub fn total_rows(&self) -> usize {
        self.rows.iter().map(|(_, n)| n).sum()
    }
}

/// Catalog persistence facade
pub struct CatalogStore {
    backend: Arc<dyn StoreBackend>,
    pool: Arc<ConnectionPool>,
}

impl CatalogStore {
    /// Open a store over an arbitrary backend
    pub fn with_backend(backend: Arc<dyn StoreBackend>, max_connections: usize) -> Self {
        let pool = Arc::new(ConnectionPool::new(Arc::clone(&backend), max_connections));
        Self { backend, pool }
    }

    /// Open a non-durable in-memory store
    pub fn in_memory() -> Self {
        Self::with_backend(Arc::new(MemoryBackend::new()), DEFAULT_MAX_CONNECTIONS)
    }

    /// Open (or create) a durable store at the given path
    #[cfg(feature = "sled-backend")]
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> StoreResult<Self> {
        let backend = sled_backend::SledBackend::open(path)?;
        Ok(Self::with_backend(
            Arc::new(backend),
            DEFAULT_MAX_CONNECTIONS,
        ))
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    /// Check a pooled connection out
    pub fn connection(&self) -> StoreResult<PooledConnection> {
        self.pool.acquire()
    }

    // ---- object rows ----

    fn object_key(id: ObjectId) -> Vec<u8> {
        KeyBuilder::new().push_id(id).build()
    }

    fn name_key(depth: u32, suffix: &str, id: ObjectId) -> Vec<u8> {
        KeyBuilder::new()
            .push_u32(depth)
            .push_str_ci(suffix)
            .push_id(id)
            .build()
    }

    fn dependency_key(object_id: ObjectId, ordinal: u32) -> Vec<u8> {
        KeyBuilder::new().push_id(object_id).push_u32(ordinal).build()
    }

    fn generator_key(generator_id: ObjectId, id: ObjectId) -> Vec<u8> {
        KeyBuilder::new().push_id(generator_id).push_id(id).build()
    }

    fn write_derived_rows(conn: &mut StoreConnection, object: &SchemaObject) -> StoreResult<()> {
        for suffix in name::suffixes(&object.name) {
            let depth = name::depth(suffix) as u32;
            let row = ObjectNameRow {
                depth,
                name: object.name.clone(),
                id: object.id,
                kind: object.kind,
            };
            conn.insert(
                StoreTable::ObjectNames,
                PK_OBJECT_NAMES,
                &Self::name_key(depth, suffix, object.id),
                &encode(&row)?,
            )?;
        }
        for (ordinal, dependency_id) in object.dependencies.iter().enumerate() {
            let row = DependencyRow {
                object_id: object.id,
                ordinal: ordinal as u32,
                dependency_id: *dependency_id,
            };
            conn.insert(
                StoreTable::Dependencies,
                PK_DEPENDENCIES,
                &Self::dependency_key(object.id, ordinal as u32),
                &encode(&row)?,
            )?;
        }
        if let Some(generator_id) = object.generator_id {
            conn.insert(
                StoreTable::Objects,
                IDX_OBJECTS_GENERATOR,
                &Self::generator_key(generator_id, object.id),
                &[],
            )?;
        }
        if object.is_catalog_object() {
            let row = CatalogObjectRow {
                id: object.id,
                name: object.name.clone(),
                library: object.library.clone(),
                owner: object.owner.clone(),
            };
            conn.insert(
                StoreTable::CatalogObjects,
                PK_CATALOG_OBJECTS,
                &Self::object_key(object.id),
                &encode(&row)?,
            )?;
        }
        Ok(())
    }

    fn remove_derived_rows(conn: &mut StoreConnection, object: &SchemaObject) -> StoreResult<()> {
        for suffix in name::suffixes(&object.name) {
            let depth = name::depth(suffix) as u32;
            conn.delete(
                StoreTable::ObjectNames,
                PK_OBJECT_NAMES,
                &Self::name_key(depth, suffix, object.id),
            )?;
        }
        for ordinal in 0..object.dependencies.len() {
            conn.delete(
                StoreTable::Dependencies,
                PK_DEPENDENCIES,
                &Self::dependency_key(object.id, ordinal as u32),
            )?;
        }
        if let Some(generator_id) = object.generator_id {
            conn.delete(
                StoreTable::Objects,
                IDX_OBJECTS_GENERATOR,
                &Self::generator_key(generator_id, object.id),
            )?;
        }
        if object.is_catalog_object() {
            conn.delete(
                StoreTable::CatalogObjects,
                PK_CATALOG_OBJECTS,
                &Self::object_key(object.id),
            )?;
        }
        Ok(())
    }

    /// Persist a new object with all its derived rows
    pub fn insert_object(
        &self,
        conn: &mut StoreConnection,
        object: &SchemaObject,
    ) -> StoreResult<()> {
        let row = ObjectRow::from_object(object);
        conn.insert(
            StoreTable::Objects,
            PK_OBJECTS,
            &Self::object_key(object.id),
            &encode(&row)?,
        )?;
        Self::write_derived_rows(conn, object)
    }

    /// Rewrite a persisted object, refreshing every derived row
    pub fn update_object(
        &self,
        conn: &mut StoreConnection,
        object: &SchemaObject,
    ) -> StoreResult<()> {
        let prior = self
            .load_object(conn, object.id)?
            .ok_or(StoreError::RowNotFound {
                table: StoreTable::Objects.header().name,
            })?;
        Self::remove_derived_rows(conn, &prior)?;
        let row = ObjectRow::from_object(object);
        conn.update(
            StoreTable::Objects,
            PK_OBJECTS,
            &Self::object_key(object.id),
            &encode(&row)?,
        )?;
        Self::write_derived_rows(conn, object)
    }

    /// Remove a persisted object and all its derived rows
    pub fn delete_object(&self, conn: &mut StoreConnection, id: ObjectId) -> StoreResult<()> {
        let object = self.load_object(conn, id)?.ok_or(StoreError::RowNotFound {
            table: StoreTable::Objects.header().name,
        })?;
        Self::remove_derived_rows(conn, &object)?;
        conn.delete(StoreTable::Objects, PK_OBJECTS, &Self::object_key(id))
    }

    /// Load one object with its ordered dependency list
    pub fn load_object(
        &self,
        conn: &mut StoreConnection,
        id: ObjectId,
    ) -> StoreResult<Option<SchemaObject>> {
        let bytes = match conn.get(StoreTable::Objects, PK_OBJECTS, &Self::object_key(id))? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let row: ObjectRow = decode(&bytes)?;

        let prefix = KeyBuilder::new().push_id(id).build();
        let mut dependencies = Vec::new();
        for (_, value) in conn.scan_prefix(StoreTable::Dependencies, PK_DEPENDENCIES, &prefix)? {
            let dep: DependencyRow = decode(&value)?;
            dependencies.push(dep.dependency_id);
        }
        Ok(Some(row.into_object(dependencies)))
    }

    pub fn object_exists(&self, conn: &mut StoreConnection, id: ObjectId) -> StoreResult<bool> {
        conn.contains(StoreTable::Objects, PK_OBJECTS, &Self::object_key(id))
    }

    /// Greatest object ID currently persisted; used to seed the ID generator
    pub fn max_object_id(&self, conn: &mut StoreConnection) -> StoreResult<Option<ObjectId>> {
        let last = conn.last_row(StoreTable::Objects, PK_OBJECTS)?;
        Ok(last.and_then(|(key, _)| decode_id(&key)))
    }

    /// Objects implicitly produced by `generator_id`, in ID order
    pub fn generated_objects(
        &self,
        conn: &mut StoreConnection,
        generator_id: ObjectId,
    ) -> StoreResult<Vec<ObjectId>> {
        let prefix = KeyBuilder::new().push_id(generator_id).build();
        let rows = conn.scan_prefix(StoreTable::Objects, IDX_OBJECTS_GENERATOR, &prefix)?;
        Ok(rows
            .into_iter()
            .filter_map(|(key, _)| decode_id(&key[prefix.len()..]))
            .collect())
    }

    /// Resolve a possibly-partial name against the qualifier-depth index
    ///
    /// The probe is one indexed scan at the probe's own depth. The index
    /// collation is case-insensitive, so candidates are re-validated against
    /// the probe's case afterwards when a case-sensitive match is requested.
    /// Results are ordered most-qualified rooted name first.
    pub fn resolve_name(
        &self,
        conn: &mut StoreConnection,
        probe: &str,
        case_sensitive: bool,
    ) -> StoreResult<Vec<ObjectNameRow>> {
        let depth = name::depth(probe) as u32;
        let prefix = KeyBuilder::new().push_u32(depth).push_str_ci(probe).build();
        let mut matches = Vec::new();
        for (_, value) in conn.scan_prefix(StoreTable::ObjectNames, PK_OBJECT_NAMES, &prefix)? {
            let row: ObjectNameRow = decode(&value)?;
            if name::matches_suffix(&row.name, probe, case_sensitive) {
                matches.push(row);
            }
        }
        matches.sort_by(|a, b| {
            name::depth(&b.name)
                .cmp(&name::depth(&a.name))
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(matches)
    }

    // ---- rights ----

    fn right_key(name: &str) -> Vec<u8> {
        KeyBuilder::new().push_str(name).build()
    }

    /// Persist a right and rewrite all its assignment rows
    pub fn save_right(&self, conn: &mut StoreConnection, right: &Right) -> StoreResult<()> {
        self.delete_right_assignments(conn, &right.name)?;
        let row = RightRow {
            name: right.name.clone(),
            owner_id: right.owner_id,
        };
        conn.put(
            StoreTable::Rights,
            PK_RIGHTS,
            &Self::right_key(&right.name),
            &encode(&row)?,
        )?;
        for (role_id, granted) in &right.role_grants {
            let row = RoleRightAssignmentRow {
                right_name: right.name.clone(),
                role_id: *role_id,
                granted: *granted,
            };
            let key = KeyBuilder::new()
                .push_str(&right.name)
                .push_id(*role_id)
                .build();
            conn.insert(
                StoreTable::RoleRightAssignments,
                PK_ROLE_RIGHT_ASSIGNMENTS,
                &key,
                &encode(&row)?,
            )?;
        }
        for (user_id, granted) in &right.user_grants {
            let row = UserRightAssignmentRow {
                right_name: right.name.clone(),
                user_id: user_id.clone(),
                granted: *granted,
            };
            let key = KeyBuilder::new()
                .push_str(&right.name)
                .push_str(user_id)
                .build();
            conn.insert(
                StoreTable::UserRightAssignments,
                PK_USER_RIGHT_ASSIGNMENTS,
                &key,
                &encode(&row)?,
            )?;
        }
        Ok(())
    }

    fn delete_right_assignments(
        &self,
        conn: &mut StoreConnection,
        right_name: &str,
    ) -> StoreResult<()> {
        let prefix = Self::right_key(right_name);
        for (key, _) in conn.scan_prefix(
            StoreTable::RoleRightAssignments,
            PK_ROLE_RIGHT_ASSIGNMENTS,
            &prefix,
        )? {
            conn.delete(
                StoreTable::RoleRightAssignments,
                PK_ROLE_RIGHT_ASSIGNMENTS,
                &key,
            )?;
        }
        for (key, _) in conn.scan_prefix(
            StoreTable::UserRightAssignments,
            PK_USER_RIGHT_ASSIGNMENTS,
            &prefix,
        )? {
            conn.delete(
                StoreTable::UserRightAssignments,
                PK_USER_RIGHT_ASSIGNMENTS,
                &key,
            )?;
        }
        Ok(())
    }

    /// Load a right with its assignments assembled
    pub fn load_right(
        &self,
        conn: &mut StoreConnection,
        right_name: &str,
    ) -> StoreResult<Option<Right>> {
        let key = Self::right_key(right_name);
        let bytes = match conn.get(StoreTable::Rights, PK_RIGHTS, &key)? {
            Some(bytes) => bytes,
            None => return Ok(None),
        };
        let row: RightRow = decode(&bytes)?;
        let mut right = Right::new(row.name, row.owner_id);
        for (_, value) in conn.scan_prefix(
            StoreTable::RoleRightAssignments,
            PK_ROLE_RIGHT_ASSIGNMENTS,
            &key,
        )? {
            let assignment: RoleRightAssignmentRow = decode(&value)?;
            right
                .role_grants
                .insert(assignment.role_id, assignment.granted);
        }
        for (_, value) in conn.scan_prefix(
            StoreTable::UserRightAssignments,
            PK_USER_RIGHT_ASSIGNMENTS,
            &key,
        )? {
            let assignment: UserRightAssignmentRow = decode(&value)?;
            right
                .user_grants
                .insert(assignment.user_id, assignment.granted);
        }
        Ok(Some(right))
    }

    /// Remove a right and all its assignments
    pub fn delete_right(&self, conn: &mut StoreConnection, right_name: &str) -> StoreResult<()> {
        self.delete_right_assignments(conn, right_name)?;
        conn.delete(StoreTable::Rights, PK_RIGHTS, &Self::right_key(right_name))
    }

    pub fn list_right_names(&self, conn: &mut StoreConnection) -> StoreResult<Vec<String>> {
        let mut names = Vec::new();
        for (_, value) in conn.scan_prefix(StoreTable::Rights, PK_RIGHTS, &[])? {
            let row: RightRow = decode(&value)?;
            names.push(row.name);
        }
        Ok(names)
    }

    // ---- devices ----

    pub fn save_device(&self, conn: &mut StoreConnection, device: &DeviceRow) -> StoreResult<()> {
        conn.put(
            StoreTable::Devices,
            PK_DEVICES,
            &Self::object_key(device.id),
            &encode(device)?,
        )
    }

    pub fn load_device(
        &self,
        conn: &mut StoreConnection,
        id: ObjectId,
    ) -> StoreResult<Option<DeviceRow>> {
        match conn.get(StoreTable::Devices, PK_DEVICES, &Self::object_key(id))? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove a device row along with its object mappings
    pub fn delete_device(&self, conn: &mut StoreConnection, id: ObjectId) -> StoreResult<()> {
        let prefix = KeyBuilder::new().push_id(id).build();
        for (key, _) in conn.scan_prefix(StoreTable::DeviceObjects, PK_DEVICE_OBJECTS, &prefix)? {
            conn.delete(StoreTable::DeviceObjects, PK_DEVICE_OBJECTS, &key)?;
        }
        conn.delete(StoreTable::Devices, PK_DEVICES, &Self::object_key(id))
    }

    pub fn list_devices(&self, conn: &mut StoreConnection) -> StoreResult<Vec<DeviceRow>> {
        let mut devices = Vec::new();
        for (_, value) in conn.scan_prefix(StoreTable::Devices, PK_DEVICES, &[])? {
            devices.push(decode(&value)?);
        }
        Ok(devices)
    }

    pub fn map_device_object(
        &self,
        conn: &mut StoreConnection,
        mapping: &DeviceObjectRow,
    ) -> StoreResult<()> {
        let key = KeyBuilder::new()
            .push_id(mapping.device_id)
            .push_id(mapping.object_id)
            .build();
        conn.put(
            StoreTable::DeviceObjects,
            PK_DEVICE_OBJECTS,
            &key,
            &encode(mapping)?,
        )
    }

    pub fn unmap_device_object(
        &self,
        conn: &mut StoreConnection,
        device_id: ObjectId,
        object_id: ObjectId,
    ) -> StoreResult<()> {
        let key = KeyBuilder::new().push_id(device_id).push_id(object_id).build();
        conn.delete(StoreTable::DeviceObjects, PK_DEVICE_OBJECTS, &key)
    }

    pub fn device_objects(
        &self,
        conn: &mut StoreConnection,
        device_id: ObjectId,
    ) -> StoreResult<Vec<DeviceObjectRow>> {
        let prefix = KeyBuilder::new().push_id(device_id).build();
        let mut mappings = Vec::new();
        for (_, value) in conn.scan_prefix(StoreTable::DeviceObjects, PK_DEVICE_OBJECTS, &prefix)? {
            mappings.push(decode(&value)?);
        }
        Ok(mappings)
    }

    // ---- application transactions ----

    pub fn save_application_transaction(
        &self,
        conn: &mut StoreConnection,
        row: &ApplicationTransactionRow,
    ) -> StoreResult<()> {
        let key = KeyBuilder::new().push_str(&row.id).build();
        conn.put(
            StoreTable::ApplicationTransactions,
            PK_APPLICATION_TRANSACTIONS,
            &key,
            &encode(row)?,
        )
    }

    pub fn load_application_transaction(
        &self,
        conn: &mut StoreConnection,
        id: &str,
    ) -> StoreResult<Option<ApplicationTransactionRow>> {
        let key = KeyBuilder::new().push_str(id).build();
        match conn.get(
            StoreTable::ApplicationTransactions,
            PK_APPLICATION_TRANSACTIONS,
            &key,
        )? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn delete_application_transaction(
        &self,
        conn: &mut StoreConnection,
        id: &str,
    ) -> StoreResult<()> {
        let key = KeyBuilder::new().push_str(id).build();
        conn.delete(
            StoreTable::ApplicationTransactions,
            PK_APPLICATION_TRANSACTIONS,
            &key,
        )
    }

    pub fn list_application_transactions(
        &self,
        conn: &mut StoreConnection,
    ) -> StoreResult<Vec<ApplicationTransactionRow>> {
        let mut rows = Vec::new();
        for (_, value) in conn.scan_prefix(
            StoreTable::ApplicationTransactions,
            PK_APPLICATION_TRANSACTIONS,
            &[],
        )? {
            rows.push(decode(&value)?);
        }
        Ok(rows)
    }

    // ---- stats ----

    /// Per-table row counts over every primary index
    pub fn stats(&self, conn: &mut StoreConnection) -> StoreResult<StoreStats> {
        let mut rows = Vec::with_capacity(StoreTable::ALL.len());
        for table in StoreTable::ALL {
            let count = conn
                .scan_prefix(table, table.header().primary.name, &[])?
                .len();
            rows.push((table.header().name, count));
        }
        Ok(StoreStats { rows })
    }
}
