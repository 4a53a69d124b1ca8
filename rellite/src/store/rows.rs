// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Row payloads for the logical catalog tables
//!
//! Rows are bincode-encoded. The object row carries everything on the
//! `SchemaObject` except its dependency list, which lives in the
//! Dependencies table keyed by (object, ordinal) to preserve order.

use serde::{Deserialize, Serialize};

use crate::catalog::object::{ObjectFlags, ObjectId, ObjectKind, SchemaObject};

use super::types::{StoreError, StoreResult};

/// Row in the Objects table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRow {
    pub id: ObjectId,
    pub name: String,
    pub kind: ObjectKind,
    pub library: Option<String>,
    pub owner: Option<String>,
    pub flags: ObjectFlags,
    pub parent_id: Option<ObjectId>,
    pub catalog_id: Option<ObjectId>,
    pub generator_id: Option<ObjectId>,
    pub script: String,
}

impl ObjectRow {
    pub fn from_object(object: &SchemaObject) -> Self {
        Self {
            id: object.id,
            name: object.name.clone(),
            kind: object.kind,
            library: object.library.clone(),
            owner: object.owner.clone(),
            flags: object.flags,
            parent_id: object.parent_id,
            catalog_id: object.catalog_id,
            generator_id: object.generator_id,
            script: object.script.clone(),
        }
    }

    /// Rebuild the schema object; dependencies are re-attached by the caller
    pub fn into_object(self, dependencies: Vec<ObjectId>) -> SchemaObject {
        SchemaObject {
            id: self.id,
            name: self.name,
            kind: self.kind,
            library: self.library,
            owner: self.owner,
            flags: self.flags,
            parent_id: self.parent_id,
            catalog_id: self.catalog_id,
            generator_id: self.generator_id,
            dependencies,
            script: self.script,
        }
    }
}

/// Row in the CatalogObjects table: the top-level header only
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogObjectRow {
    pub id: ObjectId,
    pub name: String,
    pub library: Option<String>,
    pub owner: Option<String>,
}

/// Row in the qualifier-depth ObjectNames index
///
/// `name` keeps the original case; the key segment is lowercased.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectNameRow {
    pub depth: u32,
    pub name: String,
    pub id: ObjectId,
    pub kind: ObjectKind,
}

/// Row in the Dependencies table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRow {
    pub object_id: ObjectId,
    pub ordinal: u32,
    pub dependency_id: ObjectId,
}

/// Row in the Rights table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RightRow {
    pub name: String,
    pub owner_id: Option<ObjectId>,
}

/// Row in the RoleRightAssignments table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleRightAssignmentRow {
    pub right_name: String,
    pub role_id: ObjectId,
    pub granted: bool,
}

/// Row in the UserRightAssignments table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRightAssignmentRow {
    pub right_name: String,
    pub user_id: String,
    pub granted: bool,
}

/// Row in the Devices table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceRow {
    pub id: ObjectId,
    pub reconciliation_mode: String,
}

/// Row in the DeviceObjects table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceObjectRow {
    pub device_id: ObjectId,
    pub object_id: ObjectId,
    pub mapped_name: String,
}

/// Row in the ApplicationTransactions table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationTransactionRow {
    pub id: String,
    pub object_id: ObjectId,
    /// JSON-encoded participation parameters
    pub params: String,
}

/// Encode a row payload
pub fn encode<T: Serialize>(row: &T) -> StoreResult<Vec<u8>> {
    bincode::serialize(row).map_err(|e| StoreError::Serialization(e.to_string()))
}

/// Decode a row payload
pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> StoreResult<T> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
