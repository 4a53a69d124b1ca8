// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Dependency-ordered load planning
//!
//! Loading an object from the store must materialize its non-resident
//! dependencies first. The planner walks the persisted dependency graph
//! depth-first, pruning objects the caller reports as already resident, and
//! yields IDs in the order they must be materialized. Objects produced by a
//! generator (constraints, implicit conversions, generated side-objects)
//! are walked as dependents of their generator so they surface together
//! with what produced them.

use std::collections::HashMap;

use crate::catalog::error::{CatalogError, CatalogResult};
use crate::catalog::object::ObjectId;

use super::connection::StoreConnection;
use super::CatalogStore;

#[derive(Clone, Copy, PartialEq)]
enum Visit {
    InProgress,
    Done,
}

impl CatalogStore {
    /// Compute the materialization order for `root` and everything it needs
    ///
    /// `is_resident` prunes the walk; resident objects never appear in the
    /// returned order. A cycle among non-resident objects indicates a
    /// corrupt dependency graph and fails immediately instead of looping.
    pub fn load_order(
        &self,
        conn: &mut StoreConnection,
        root: ObjectId,
        is_resident: &mut dyn FnMut(ObjectId) -> bool,
    ) -> CatalogResult<Vec<ObjectId>> {
        let mut state: HashMap<ObjectId, Visit> = HashMap::new();
        let mut order = Vec::new();
        self.visit(conn, root, is_resident, &mut state, &mut order)?;
        Ok(order)
    }

    fn visit(
        &self,
        conn: &mut StoreConnection,
        id: ObjectId,
        is_resident: &mut dyn FnMut(ObjectId) -> bool,
        state: &mut HashMap<ObjectId, Visit>,
        order: &mut Vec<ObjectId>,
    ) -> CatalogResult<()> {
        match state.get(&id) {
            Some(Visit::Done) => return Ok(()),
            Some(Visit::InProgress) => return Err(CatalogError::ConcurrentLoad(id)),
            None => {}
        }
        if is_resident(id) {
            state.insert(id, Visit::Done);
            return Ok(());
        }
        state.insert(id, Visit::InProgress);

        let object = self
            .load_object(conn, id)?
            .ok_or(CatalogError::ObjectIdNotFound(id))?;
        for dependency in &object.dependencies {
            self.visit(conn, *dependency, is_resident, state, order)?;
        }

        state.insert(id, Visit::Done);
        order.push(id);

        // Side-objects rematerialize together with their generator.
        for generated in self.generated_objects(conn, id)? {
            self.visit(conn, generated, is_resident, state, order)?;
        }
        Ok(())
    }
}
