// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Schema object data model
//!
//! The catalog tracks every named definition the engine knows about as a
//! `SchemaObject`. Objects reference each other by integer ID only (owner,
//! parent, catalog ancestor, generator, dependencies), never by direct
//! reference, which keeps the graph serializable and sidesteps cyclic
//! ownership during persistence.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicI32, Ordering};

/// Process-unique, positive, monotonically issued object identifier
pub type ObjectId = i32;

/// Issues positive, monotonically increasing object IDs
///
/// One generator lives on each catalog context. Loading persisted objects
/// raises the floor so freshly issued IDs never collide with stored ones.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicI32,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self {
            next: AtomicI32::new(1),
        }
    }

    /// Issue the next ID
    pub fn next_id(&self) -> ObjectId {
        self.next.fetch_add(1, Ordering::SeqCst)
    }

    /// Ensure future IDs are issued above `floor`
    pub fn raise_floor(&self, floor: ObjectId) {
        self.next.fetch_max(floor + 1, Ordering::SeqCst);
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Kind of schema object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    BaseTable,
    View,
    ScalarType,
    Operator,
    Constraint,
    Reference,
    Device,
    EventHandler,
    Conversion,
    User,
    Role,
}

impl ObjectKind {
    /// Whether objects of this kind are independently nameable at the top
    /// level (catalog objects)
    pub fn is_catalog_kind(&self) -> bool {
        !matches!(self, ObjectKind::Constraint | ObjectKind::EventHandler)
    }

    /// Whether create/drop of this kind invalidates operator-name lookups
    pub fn is_operator_kind(&self) -> bool {
        matches!(self, ObjectKind::Operator | ObjectKind::Conversion)
    }
}

/// Object state flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectFlags {
    /// Part of the system catalog, created at engine startup
    pub system: bool,
    /// Implicitly produced by the creation of another object
    pub generated: bool,
    /// Participates in an application transaction
    pub at_object: bool,
    /// Scoped to a session, never persisted
    pub session_object: bool,
    /// Written through to the persistent store
    pub persistent: bool,
}

/// One schema object resident in the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaObject {
    pub id: ObjectId,
    /// Rooted name, `.`-qualified from the top level
    pub name: String,
    pub kind: ObjectKind,
    pub library: Option<String>,
    pub owner: Option<String>,
    pub flags: ObjectFlags,
    /// Structural parent (e.g. column -> table)
    pub parent_id: Option<ObjectId>,
    /// Nearest top-level ancestor; equals `id` for catalog objects
    pub catalog_id: Option<ObjectId>,
    /// Object whose creation implicitly produced this one
    pub generator_id: Option<ObjectId>,
    /// Ordered dependency IDs
    pub dependencies: Vec<ObjectId>,
    /// Serialized definition text used for persistence
    pub script: String,
}

impl SchemaObject {
    pub fn new(id: ObjectId, name: impl Into<String>, kind: ObjectKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            library: None,
            owner: None,
            flags: ObjectFlags::default(),
            parent_id: None,
            catalog_id: None,
            generator_id: None,
            dependencies: Vec::new(),
            script: String::new(),
        }
    }

    pub fn with_library(mut self, library: impl Into<String>) -> Self {
        self.library = Some(library.into());
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn with_script(mut self, script: impl Into<String>) -> Self {
        self.script = script.into();
        self
    }

    pub fn persistent(mut self) -> Self {
        self.flags.persistent = true;
        self
    }

    pub fn generated_by(mut self, generator: ObjectId) -> Self {
        self.generator_id = Some(generator);
        self.flags.generated = true;
        self
    }

    /// Whether this object is independently nameable at the top level
    pub fn is_catalog_object(&self) -> bool {
        self.parent_id.is_none() && self.kind.is_catalog_kind()
    }

    /// Candidate header for name resolution
    pub fn header(&self) -> ObjectHeader {
        ObjectHeader {
            id: self.id,
            name: self.name.clone(),
            library: self.library.clone(),
            owner: self.owner.clone(),
        }
    }
}

/// Lightweight candidate description returned by name resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectHeader {
    pub id: ObjectId,
    pub name: String,
    pub library: Option<String>,
    pub owner: Option<String>,
}

/// A named right with its role and user grant state
///
/// Assignments carry an explicit granted/denied flag; absence means the
/// right is neither granted nor denied to that grantee.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Right {
    pub name: String,
    pub owner_id: Option<ObjectId>,
    pub role_grants: std::collections::BTreeMap<ObjectId, bool>,
    pub user_grants: std::collections::BTreeMap<String, bool>,
}

impl Right {
    pub fn new(name: impl Into<String>, owner_id: Option<ObjectId>) -> Self {
        Self {
            name: name.into(),
            owner_id,
            role_grants: Default::default(),
            user_grants: Default::default(),
        }
    }
}

/// Runtime state of a registered device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    Registered,
    Started,
    Stopped,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_generator_monotonic() {
        let ids = IdGenerator::new();
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(a > 0);
        assert!(b > a);

        ids.raise_floor(100);
        assert!(ids.next_id() > 100);
    }

    #[test]
    fn test_catalog_object_classification() {
        let table = SchemaObject::new(1, "Main.Customer", ObjectKind::BaseTable);
        assert!(table.is_catalog_object());

        let mut constraint = SchemaObject::new(2, "Main.Customer.PK", ObjectKind::Constraint);
        constraint.parent_id = Some(1);
        assert!(!constraint.is_catalog_object());
    }
}
