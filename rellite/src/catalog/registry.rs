// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory catalog registry
//!
//! Holds every schema object currently resident in memory, together with
//! the bijective ID/rooted-name index, the loaded rights, and device run
//! states. This is the state the DDL transaction log mutates and undoes
//! over, so the whole structure is comparable: a rollback must restore it
//! exactly.

use std::collections::{BTreeMap, HashMap};

use super::error::{CatalogError, CatalogResult};
use super::object::{DeviceState, ObjectId, Right, SchemaObject};

/// Bijective map between object IDs and rooted names
///
/// Invariant: every resident object has exactly one entry in each
/// direction.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CatalogIndex {
    by_id: HashMap<ObjectId, String>,
    by_name: HashMap<String, ObjectId>,
}

impl CatalogIndex {
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn name_for_id(&self, id: ObjectId) -> Option<&str> {
        self.by_id.get(&id).map(String::as_str)
    }

    pub fn id_for_name(&self, name: &str) -> Option<ObjectId> {
        self.by_name.get(name).copied()
    }

    fn insert(&mut self, id: ObjectId, name: &str) {
        self.by_id.insert(id, name.to_string());
        self.by_name.insert(name.to_string(), id);
    }

    fn remove(&mut self, id: ObjectId) -> Option<String> {
        let name = self.by_id.remove(&id)?;
        self.by_name.remove(&name);
        Some(name)
    }
}

/// Complete mutable in-memory catalog state
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CatalogState {
    objects: HashMap<ObjectId, SchemaObject>,
    index: CatalogIndex,
    rights: BTreeMap<String, Right>,
    device_states: BTreeMap<ObjectId, DeviceState>,
}

impl CatalogState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of resident objects
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(&id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SchemaObject> {
        self.objects.get(&id)
    }

    pub fn get_by_name(&self, rooted_name: &str) -> Option<&SchemaObject> {
        let id = self.index.id_for_name(rooted_name)?;
        self.objects.get(&id)
    }

    pub fn index(&self) -> &CatalogIndex {
        &self.index
    }

    pub fn iter(&self) -> impl Iterator<Item = &SchemaObject> {
        self.objects.values()
    }

    /// Add an object to the cache and the index atomically
    ///
    /// Fails without modifying anything if the ID or rooted name is already
    /// resident.
    pub fn cache_object(&mut self, object: SchemaObject) -> CatalogResult<()> {
        if self.objects.contains_key(&object.id) {
            return Err(CatalogError::DuplicateObjectId(object.id));
        }
        if self.index.id_for_name(&object.name).is_some() {
            return Err(CatalogError::DuplicateObjectName(object.name));
        }
        self.index.insert(object.id, &object.name);
        self.objects.insert(object.id, object);
        Ok(())
    }

    /// Remove an object from the cache and the index atomically
    pub fn remove_object(&mut self, id: ObjectId) -> CatalogResult<SchemaObject> {
        let object = self
            .objects
            .remove(&id)
            .ok_or(CatalogError::ObjectIdNotFound(id))?;
        self.index.remove(id);
        Ok(object)
    }

    /// Replace a resident object, reindexing if the name changed
    pub fn replace_object(&mut self, object: SchemaObject) -> CatalogResult<SchemaObject> {
        if !self.objects.contains_key(&object.id) {
            return Err(CatalogError::ObjectIdNotFound(object.id));
        }
        if let Some(existing) = self.index.id_for_name(&object.name) {
            if existing != object.id {
                return Err(CatalogError::DuplicateObjectName(object.name));
            }
        }
        let before = self.remove_object(object.id)?;
        self.index.insert(object.id, &object.name);
        self.objects.insert(object.id, object);
        Ok(before)
    }

    /// Resident objects generated by `generator_id`
    pub fn generated_by(&self, generator_id: ObjectId) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self
            .objects
            .values()
            .filter(|o| o.generator_id == Some(generator_id))
            .map(|o| o.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    // ---- rights ----

    pub fn right(&self, name: &str) -> Option<&Right> {
        self.rights.get(name)
    }

    pub fn right_mut(&mut self, name: &str) -> Option<&mut Right> {
        self.rights.get_mut(name)
    }

    pub fn insert_right(&mut self, right: Right) -> Option<Right> {
        self.rights.insert(right.name.clone(), right)
    }

    pub fn remove_right(&mut self, name: &str) -> Option<Right> {
        self.rights.remove(name)
    }

    pub fn rights(&self) -> impl Iterator<Item = &Right> {
        self.rights.values()
    }

    // ---- devices ----

    pub fn device_state(&self, id: ObjectId) -> Option<DeviceState> {
        self.device_states.get(&id).copied()
    }

    pub fn set_device_state(&mut self, id: ObjectId, state: DeviceState) -> Option<DeviceState> {
        self.device_states.insert(id, state)
    }

    pub fn remove_device_state(&mut self, id: ObjectId) -> Option<DeviceState> {
        self.device_states.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::object::ObjectKind;

    fn object(id: ObjectId, name: &str) -> SchemaObject {
        SchemaObject::new(id, name, ObjectKind::BaseTable)
    }

    #[test]
    fn test_cache_and_index_stay_bijective() {
        let mut state = CatalogState::new();
        state.cache_object(object(1, "Main.A")).unwrap();
        state.cache_object(object(2, "Main.B")).unwrap();
        assert_eq!(state.len(), 2);
        assert_eq!(state.index().len(), 2);

        state.remove_object(1).unwrap();
        assert_eq!(state.len(), 1);
        assert_eq!(state.index().len(), 1);
        assert!(state.index().id_for_name("Main.A").is_none());
    }

    #[test]
    fn test_duplicate_rejected_without_side_effects() {
        let mut state = CatalogState::new();
        state.cache_object(object(1, "Main.A")).unwrap();

        let err = state.cache_object(object(1, "Main.Other")).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateObjectId(1)));
        let err = state.cache_object(object(9, "Main.A")).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateObjectName(_)));

        assert_eq!(state.len(), 1);
        assert_eq!(state.index().len(), 1);
    }

    #[test]
    fn test_replace_reindexes_on_rename() {
        let mut state = CatalogState::new();
        state.cache_object(object(1, "Main.Old")).unwrap();

        let before = state.replace_object(object(1, "Main.New")).unwrap();
        assert_eq!(before.name, "Main.Old");
        assert!(state.get_by_name("Main.New").is_some());
        assert!(state.get_by_name("Main.Old").is_none());
        assert_eq!(state.index().name_for_id(1), Some("Main.New"));
    }

    #[test]
    fn test_replace_rejects_name_collision() {
        let mut state = CatalogState::new();
        state.cache_object(object(1, "Main.A")).unwrap();
        state.cache_object(object(2, "Main.B")).unwrap();

        let err = state.replace_object(object(2, "Main.A")).unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateObjectName(_)));
        assert!(state.get_by_name("Main.B").is_some());
    }

    #[test]
    fn test_generated_by_lists_resident_side_objects() {
        let mut state = CatalogState::new();
        state.cache_object(object(1, "Main.T")).unwrap();
        state
            .cache_object(
                SchemaObject::new(2, "Main.T.PK", ObjectKind::Constraint).generated_by(1),
            )
            .unwrap();
        assert_eq!(state.generated_by(1), vec![2]);
        assert!(state.generated_by(2).is_empty());
    }
}
