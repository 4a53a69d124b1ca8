// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Logical store tables and their memoized headers
//!
//! The catalog persists into a fixed set of logical tables. Each table is
//! described once by an immutable `StoreTableHeader` (columns, indexes, key
//! shape); headers are built lazily and shared for the life of the process.
//!
//! Keys are order-preserving byte strings: IDs encode as offset big-endian
//! so signed order survives a bytewise comparison, strings append a NUL
//! terminator so composite keys sort on segment boundaries. Name-index keys
//! are lowercased; the index collation is case-insensitive and candidates
//! are re-validated against the probe case after the seek.

use once_cell::sync::Lazy;

use crate::catalog::object::ObjectId;

/// One logical catalog table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreTable {
    Objects,
    CatalogObjects,
    ObjectNames,
    Dependencies,
    Rights,
    RoleRightAssignments,
    UserRightAssignments,
    Devices,
    DeviceObjects,
    ApplicationTransactions,
}

impl StoreTable {
    pub const ALL: [StoreTable; 10] = [
        StoreTable::Objects,
        StoreTable::CatalogObjects,
        StoreTable::ObjectNames,
        StoreTable::Dependencies,
        StoreTable::Rights,
        StoreTable::RoleRightAssignments,
        StoreTable::UserRightAssignments,
        StoreTable::Devices,
        StoreTable::DeviceObjects,
        StoreTable::ApplicationTransactions,
    ];

    fn ordinal(&self) -> usize {
        Self::ALL.iter().position(|t| t == self).unwrap_or(0)
    }

    /// Memoized structural description of this table
    pub fn header(&self) -> &'static StoreTableHeader {
        &HEADERS[self.ordinal()]
    }

    /// Look a table up by its header name
    pub fn by_name(name: &str) -> Option<StoreTable> {
        Self::ALL.iter().copied().find(|t| t.header().name == name)
    }

    /// Backend tree name for one of this table's indexes
    pub fn tree_name(&self, index: &str) -> String {
        format!("{}.{}", self.header().name, index)
    }
}

/// Immutable description of one index over a logical table
#[derive(Debug, Clone)]
pub struct StoreIndexHeader {
    pub name: &'static str,
    pub key_columns: &'static [&'static str],
    pub unique: bool,
}

/// Immutable description of one logical table
#[derive(Debug, Clone)]
pub struct StoreTableHeader {
    pub name: &'static str,
    pub columns: &'static [&'static str],
    pub primary: StoreIndexHeader,
    pub secondary: &'static [StoreIndexHeader],
}

impl StoreTableHeader {
    /// All indexes, primary first
    pub fn indexes(&self) -> impl Iterator<Item = &StoreIndexHeader> {
        std::iter::once(&self.primary).chain(self.secondary.iter())
    }

    /// Find an index by name
    pub fn index(&self, name: &str) -> Option<&StoreIndexHeader> {
        self.indexes().find(|i| i.name == name)
    }
}

/// Secondary index on Objects mapping generator id to generated object id;
/// the dependency loader walks it to rematerialize side objects with their
/// generator.
pub const IDX_OBJECTS_GENERATOR: &str = "idx_objects_generator";

static OBJECTS_SECONDARY: &[StoreIndexHeader] = &[StoreIndexHeader {
    name: IDX_OBJECTS_GENERATOR,
    key_columns: &["generator_id", "id"],
    unique: true,
}];

static HEADERS: Lazy<Vec<StoreTableHeader>> = Lazy::new(|| {
    vec![
        StoreTableHeader {
            name: "Objects",
            columns: &[
                "id",
                "name",
                "kind",
                "library",
                "owner",
                "flags",
                "parent_id",
                "catalog_id",
                "generator_id",
                "script",
            ],
            primary: StoreIndexHeader {
                name: "pk_objects",
                key_columns: &["id"],
                unique: true,
            },
            secondary: OBJECTS_SECONDARY,
        },
        StoreTableHeader {
            name: "CatalogObjects",
            columns: &["id", "name", "library", "owner"],
            primary: StoreIndexHeader {
                name: "pk_catalog_objects",
                key_columns: &["id"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "ObjectNames",
            columns: &["depth", "name", "id", "kind"],
            primary: StoreIndexHeader {
                name: "pk_object_names",
                key_columns: &["depth", "name", "id"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "Dependencies",
            columns: &["object_id", "ordinal", "dependency_id"],
            primary: StoreIndexHeader {
                name: "pk_dependencies",
                key_columns: &["object_id", "ordinal"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "Rights",
            columns: &["name", "owner_id"],
            primary: StoreIndexHeader {
                name: "pk_rights",
                key_columns: &["name"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "RoleRightAssignments",
            columns: &["right_name", "role_id", "granted"],
            primary: StoreIndexHeader {
                name: "pk_role_right_assignments",
                key_columns: &["right_name", "role_id"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "UserRightAssignments",
            columns: &["right_name", "user_id", "granted"],
            primary: StoreIndexHeader {
                name: "pk_user_right_assignments",
                key_columns: &["right_name", "user_id"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "Devices",
            columns: &["id", "reconciliation_mode"],
            primary: StoreIndexHeader {
                name: "pk_devices",
                key_columns: &["id"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "DeviceObjects",
            columns: &["device_id", "object_id", "mapped_name"],
            primary: StoreIndexHeader {
                name: "pk_device_objects",
                key_columns: &["device_id", "object_id"],
                unique: true,
            },
            secondary: &[],
        },
        StoreTableHeader {
            name: "ApplicationTransactions",
            columns: &["id", "object_id", "params"],
            primary: StoreIndexHeader {
                name: "pk_application_transactions",
                key_columns: &["id"],
                unique: true,
            },
            secondary: &[],
        },
    ]
});

/// Order-preserving encoding of an object ID
pub fn encode_id(id: ObjectId) -> [u8; 4] {
    ((id as u32) ^ 0x8000_0000).to_be_bytes()
}

/// Inverse of [`encode_id`]; `bytes` must be exactly four bytes
pub fn decode_id(bytes: &[u8]) -> Option<ObjectId> {
    let arr: [u8; 4] = bytes.try_into().ok()?;
    Some((u32::from_be_bytes(arr) ^ 0x8000_0000) as ObjectId)
}

/// Composite key builder
///
/// Segments concatenate in declaration order; strings are NUL-terminated so
/// a shorter segment sorts before any extension of it.
#[derive(Debug, Default)]
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_id(mut self, id: ObjectId) -> Self {
        self.buf.extend_from_slice(&encode_id(id));
        self
    }

    pub fn push_u32(mut self, value: u32) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn push_str(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self.buf.push(0);
        self
    }

    /// Lowercased string segment for case-insensitive index collation
    pub fn push_str_ci(self, value: &str) -> Self {
        let lowered = value.to_lowercase();
        self.push_str(&lowered)
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_resolve_by_table_and_name() {
        for table in StoreTable::ALL {
            let header = table.header();
            assert_eq!(StoreTable::by_name(header.name), Some(table));
            assert!(header.primary.unique);
        }
        assert_eq!(StoreTable::by_name("NoSuchTable"), None);
    }

    #[test]
    fn test_generator_index_present() {
        let header = StoreTable::Objects.header();
        assert!(header.index(IDX_OBJECTS_GENERATOR).is_some());
        assert!(header.index("pk_objects").is_some());
    }

    #[test]
    fn test_id_encoding_preserves_order() {
        let ids = [1, 2, 10, 255, 256, 70000, i32::MAX];
        for window in ids.windows(2) {
            assert!(encode_id(window[0]) < encode_id(window[1]));
        }
    }

    #[test]
    fn test_composite_string_keys_sort_on_boundaries() {
        // "B.C" at depth 2 must not interleave with "B.CD" probes.
        let a = KeyBuilder::new().push_u32(2).push_str_ci("B.C").build();
        let b = KeyBuilder::new().push_u32(2).push_str_ci("B.CD").build();
        assert!(a < b);
        assert!(!b.starts_with(&a));
    }
}
