// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Catalog mutation surface
//!
//! The DDL operations the compiler and executor drive: create/alter/drop
//! for schema objects, users, roles, and rights, device registration and
//! run-state control, device-object attachment, and application-transaction
//! bookkeeping. Every operation applies to the in-memory registry first,
//! writes through to the store when the object is persistent and the
//! session is not rehydrating, and records its undo instruction while a
//! transaction is open.

use crate::store::rows::{ApplicationTransactionRow, DeviceObjectRow, DeviceRow};

use super::ddl::{DdlInstruction, DeferredAction};
use super::error::{CatalogError, CatalogResult};
use super::manager::CatalogSession;
use super::object::{DeviceState, ObjectId, ObjectKind, Right, SchemaObject};
use super::registry::CatalogState;

fn cascade_order(state: &CatalogState, root: ObjectId, order: &mut Vec<ObjectId>) {
    for generated in state.generated_by(root) {
        cascade_order(state, generated, order);
    }
    order.push(root);
}

impl<'a> CatalogSession<'a> {
    fn persistable(&self, object: &SchemaObject) -> bool {
        object.flags.persistent && !object.flags.session_object && !self.is_loading()
    }

    fn invalidate_names(&self, kind: ObjectKind) {
        if kind.is_catalog_kind() || kind.is_operator_kind() {
            self.catalog().names().clear();
        }
    }

    /// Register a new object in the catalog
    ///
    /// An ID of 0 means "assign one". Top-level objects become their own
    /// catalog ancestor.
    ///
    /// # Returns
    /// * The object's ID
    pub fn create_object(&mut self, mut object: SchemaObject) -> CatalogResult<ObjectId> {
        if object.id == 0 {
            object.id = self.catalog().next_object_id();
        } else {
            self.catalog().ids().raise_floor(object.id);
        }
        if object.catalog_id.is_none() && object.is_catalog_object() {
            object.catalog_id = Some(object.id);
        }
        let id = object.id;
        let name = object.name.clone();
        let kind = object.kind;

        self.catalog().lock_state().cache_object(object.clone())?;

        if self.persistable(&object) {
            if let Err(e) =
                self.with_store(|store, conn| Ok(store.insert_object(conn, &object)?))
            {
                let _ = self.catalog().lock_state().remove_object(id);
                return Err(e);
            }
        }

        self.record(DdlInstruction::CreatedObject {
            id,
            name: name.clone(),
        });
        self.invalidate_names(kind);
        log::debug!("Created object {} (#{})", name, id);
        Ok(id)
    }

    /// Drop an object, cascading over everything it generated
    pub fn drop_object(&mut self, id: ObjectId) -> CatalogResult<()> {
        let catalog = self.catalog();
        let dropped = {
            let mut state = catalog.lock_state();
            if !state.contains(id) {
                return Err(CatalogError::ObjectIdNotFound(id));
            }
            let mut order = Vec::new();
            cascade_order(&state, id, &mut order);
            let mut dropped = Vec::with_capacity(order.len());
            for oid in order {
                dropped.push(state.remove_object(oid)?);
            }
            dropped
        };

        let mut persist_err = None;
        for object in &dropped {
            if self.persistable(object) {
                let result = self.with_store(|store, conn| {
                    store.delete_object(conn, object.id)?;
                    if object.kind == ObjectKind::Device {
                        store.delete_device(conn, object.id)?;
                    }
                    Ok(())
                });
                if let Err(e) = result {
                    persist_err = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = persist_err {
            let mut state = catalog.lock_state();
            for object in dropped {
                let _ = state.cache_object(object);
            }
            return Err(e);
        }

        for object in dropped {
            if object.kind == ObjectKind::Device {
                if let Some(before) = catalog.lock_state().remove_device_state(object.id) {
                    self.record(DdlInstruction::RemovedDevice {
                        id: object.id,
                        before,
                    });
                }
            }
            let kind = object.kind;
            log::debug!("Dropped object {} (#{})", object.name, object.id);
            self.record(DdlInstruction::DroppedObject { object });
            self.invalidate_names(kind);
        }
        Ok(())
    }

    /// Replace an object's definition, reindexing if it was renamed
    pub fn alter_object(&mut self, object: SchemaObject) -> CatalogResult<()> {
        let catalog = self.catalog();
        let before = catalog.lock_state().replace_object(object.clone())?;

        if self.persistable(&object) {
            if let Err(e) = self.with_store(|store, conn| Ok(store.update_object(conn, &object)?))
            {
                let _ = catalog.lock_state().replace_object(before);
                return Err(e);
            }
        }

        self.invalidate_names(object.kind);
        self.record(DdlInstruction::AlteredObject { before });
        Ok(())
    }

    /// Give an object a new rooted name
    pub fn rename_object(&mut self, id: ObjectId, new_name: &str) -> CatalogResult<()> {
        let mut object = self
            .catalog()
            .resolve_cached_by_id(id, true)?
            .ok_or(CatalogError::ObjectIdNotFound(id))?;
        object.name = new_name.to_string();
        self.alter_object(object)
    }

    // ---- users and roles ----

    /// Create a user object
    pub fn create_user(&mut self, name: &str) -> CatalogResult<ObjectId> {
        self.create_object(SchemaObject::new(0, name, ObjectKind::User).persistent())
    }

    /// Create a role object
    pub fn create_role(&mut self, name: &str) -> CatalogResult<ObjectId> {
        self.create_object(SchemaObject::new(0, name, ObjectKind::Role).persistent())
    }

    // ---- rights ----

    /// Create a named right with no grants
    pub fn create_right(&mut self, name: &str, owner_id: Option<ObjectId>) -> CatalogResult<()> {
        let catalog = self.catalog();
        {
            let mut state = catalog.lock_state();
            if state.right(name).is_some() {
                return Err(CatalogError::DuplicateObjectName(name.to_string()));
            }
            state.insert_right(Right::new(name, owner_id));
        }
        if !self.is_loading() {
            let right = Right::new(name, owner_id);
            if let Err(e) = self.with_store(|store, conn| Ok(store.save_right(conn, &right)?)) {
                catalog.lock_state().remove_right(name);
                return Err(e);
            }
        }
        self.record(DdlInstruction::CreatedRight {
            name: name.to_string(),
        });
        Ok(())
    }

    /// Remove a right and every grant on it
    pub fn drop_right(&mut self, name: &str) -> CatalogResult<()> {
        let catalog = self.catalog();
        let right = catalog
            .lock_state()
            .remove_right(name)
            .ok_or_else(|| CatalogError::RightNotFound(name.to_string()))?;
        if !self.is_loading() {
            if let Err(e) = self.with_store(|store, conn| Ok(store.delete_right(conn, name)?)) {
                catalog.lock_state().insert_right(right);
                return Err(e);
            }
        }
        self.record(DdlInstruction::DroppedRight { right });
        Ok(())
    }

    fn alter_right(
        &mut self,
        name: &str,
        mutate: impl FnOnce(&mut Right),
    ) -> CatalogResult<()> {
        let catalog = self.catalog();
        let (before, after) = {
            let mut state = catalog.lock_state();
            let right = state
                .right_mut(name)
                .ok_or_else(|| CatalogError::RightNotFound(name.to_string()))?;
            let before = right.clone();
            mutate(right);
            (before, right.clone())
        };
        if !self.is_loading() {
            if let Err(e) = self.with_store(|store, conn| Ok(store.save_right(conn, &after)?)) {
                catalog.lock_state().insert_right(before);
                return Err(e);
            }
        }
        self.record(DdlInstruction::AlteredRight { before });
        Ok(())
    }

    /// Grant (or explicitly deny) a right to a role
    pub fn grant_right_to_role(
        &mut self,
        right: &str,
        role_id: ObjectId,
        granted: bool,
    ) -> CatalogResult<()> {
        self.alter_right(right, |r| {
            r.role_grants.insert(role_id, granted);
        })
    }

    pub fn revoke_right_from_role(&mut self, right: &str, role_id: ObjectId) -> CatalogResult<()> {
        self.alter_right(right, |r| {
            r.role_grants.remove(&role_id);
        })
    }

    /// Grant (or explicitly deny) a right to a user
    pub fn grant_right_to_user(
        &mut self,
        right: &str,
        user: &str,
        granted: bool,
    ) -> CatalogResult<()> {
        let user = user.to_string();
        self.alter_right(right, move |r| {
            r.user_grants.insert(user, granted);
        })
    }

    pub fn revoke_right_from_user(&mut self, right: &str, user: &str) -> CatalogResult<()> {
        self.alter_right(right, |r| {
            r.user_grants.remove(user);
        })
    }

    // ---- devices ----

    /// Register a device: creates the device object, persists its row, and
    /// starts tracking its run state
    pub fn register_device(
        &mut self,
        object: SchemaObject,
        reconciliation_mode: &str,
    ) -> CatalogResult<ObjectId> {
        let id = self.create_object(object)?;
        self.catalog()
            .lock_state()
            .set_device_state(id, DeviceState::Registered);
        if !self.is_loading() {
            let row = DeviceRow {
                id,
                reconciliation_mode: reconciliation_mode.to_string(),
            };
            self.with_store(|store, conn| Ok(store.save_device(conn, &row)?))?;
        }
        self.record(DdlInstruction::RegisteredDevice { id });
        log::info!("Registered device #{} ({})", id, reconciliation_mode);
        Ok(id)
    }

    pub fn start_device(&mut self, id: ObjectId) -> CatalogResult<()> {
        let before = {
            let mut state = self.catalog().lock_state();
            let before = state
                .device_state(id)
                .ok_or(CatalogError::DeviceNotFound(id))?;
            state.set_device_state(id, DeviceState::Started);
            before
        };
        self.record(DdlInstruction::DeviceStateChanged { id, before });
        Ok(())
    }

    /// Stop a device
    ///
    /// Stopping is expensive and unsafe to undo, so inside a transaction
    /// the stop is queued and only executes after the outermost commit; a
    /// rollback discards it. Outside a transaction it applies immediately.
    pub fn stop_device(&mut self, id: ObjectId) -> CatalogResult<()> {
        {
            let state = self.catalog().lock_state();
            if state.device_state(id).is_none() {
                return Err(CatalogError::DeviceNotFound(id));
            }
        }
        if self.in_transaction() {
            self.defer(DeferredAction::StopDevice(id));
        } else {
            self.catalog()
                .lock_state()
                .set_device_state(id, DeviceState::Stopped);
            log::info!("Device #{} stopped", id);
        }
        Ok(())
    }

    /// Map a schema object onto a device under an external name
    pub fn attach_device_object(
        &mut self,
        device_id: ObjectId,
        object_id: ObjectId,
        mapped_name: &str,
    ) -> CatalogResult<()> {
        if self.catalog().device_state(device_id).is_none() {
            return Err(CatalogError::DeviceNotFound(device_id));
        }
        let row = DeviceObjectRow {
            device_id,
            object_id,
            mapped_name: mapped_name.to_string(),
        };
        self.with_store(|store, conn| Ok(store.map_device_object(conn, &row)?))
    }

    pub fn detach_device_object(
        &mut self,
        device_id: ObjectId,
        object_id: ObjectId,
    ) -> CatalogResult<()> {
        self.with_store(|store, conn| Ok(store.unmap_device_object(conn, device_id, object_id)?))
    }

    /// Grant a user use of a device
    ///
    /// Modeled as a user grant on the device's `<name>.Usage` right, which
    /// is created on first use.
    pub fn grant_device_usage(&mut self, device_id: ObjectId, user: &str) -> CatalogResult<()> {
        let device = self
            .catalog()
            .resolve_cached_by_id(device_id, true)?
            .ok_or(CatalogError::ObjectIdNotFound(device_id))?;
        let right_name = format!("{}.Usage", device.name);
        if self.catalog().lock_state().right(&right_name).is_none() {
            self.create_right(&right_name, Some(device_id))?;
        }
        self.grant_right_to_user(&right_name, user, true)
    }

    pub fn revoke_device_usage(&mut self, device_id: ObjectId, user: &str) -> CatalogResult<()> {
        let device = self
            .catalog()
            .resolve_cached_by_id(device_id, true)?
            .ok_or(CatalogError::ObjectIdNotFound(device_id))?;
        let right_name = format!("{}.Usage", device.name);
        self.revoke_right_from_user(&right_name, user)
    }

    // ---- application transactions ----

    /// Record an object's participation in an application transaction
    pub fn register_application_transaction(
        &mut self,
        at_id: &str,
        object_id: ObjectId,
        params: serde_json::Value,
    ) -> CatalogResult<()> {
        let row = ApplicationTransactionRow {
            id: at_id.to_string(),
            object_id,
            params: params.to_string(),
        };
        self.with_store(|store, conn| Ok(store.save_application_transaction(conn, &row)?))
    }

    pub fn deregister_application_transaction(&mut self, at_id: &str) -> CatalogResult<()> {
        self.with_store(|store, conn| Ok(store.delete_application_transaction(conn, at_id)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::manager::Catalog;

    fn table(name: &str) -> SchemaObject {
        SchemaObject::new(0, name, ObjectKind::BaseTable).persistent()
    }

    #[test]
    fn test_rollback_restores_registry_bit_for_bit() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let keep = session.create_object(table("Main.Keep")).unwrap();
        let snapshot = catalog.lock_state().clone();

        session.begin().unwrap();
        session.create_object(table("Main.New")).unwrap();
        session.rename_object(keep, "Main.Renamed").unwrap();
        session.create_right("Main.Keep.Select", Some(keep)).unwrap();
        assert_ne!(*catalog.lock_state(), snapshot);

        session.rollback().unwrap();
        assert_eq!(*catalog.lock_state(), snapshot);
        // The store rolled back with it.
        let mut conn = catalog.store().connection().unwrap();
        assert!(catalog
            .store()
            .resolve_name(&mut conn, "New", true)
            .unwrap()
            .is_empty());
        assert!(catalog
            .store()
            .load_right(&mut conn, "Main.Keep.Select")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_commit_keeps_state_and_shrinks_log() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let log_before = session.log_len();

        session.begin().unwrap();
        session.create_object(table("Main.T")).unwrap();
        assert!(session.log_len() > log_before);
        session.commit().unwrap();

        assert_eq!(session.log_len(), log_before);
        assert!(catalog.resolve_cached_by_name("Main.T", false).unwrap().is_some());
    }

    #[test]
    fn test_drop_cascades_over_generated_objects() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let t = session.create_object(table("Main.T")).unwrap();
        session
            .create_object(
                SchemaObject::new(0, "Main.T.PK", ObjectKind::Constraint)
                    .persistent()
                    .generated_by(t),
            )
            .unwrap();
        assert_eq!(catalog.resident_count(), 2);

        session.drop_object(t).unwrap();
        assert_eq!(catalog.resident_count(), 0);
        let mut conn = catalog.store().connection().unwrap();
        assert!(catalog.store().load_object(&mut conn, t).unwrap().is_none());
    }

    #[test]
    fn test_create_invalidates_name_cache() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        session.create_object(table("Main.Customer")).unwrap();

        let candidates = catalog.resolve_name("Customer", true).unwrap();
        assert_eq!(candidates.len(), 1);
        let clears_before = catalog.name_cache().stats().clears;

        session.create_object(table("Other.Customer")).unwrap();
        assert!(catalog.name_cache().stats().clears > clears_before);
        let candidates = catalog.resolve_name("Customer", true).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_grant_and_revoke_round_trip() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let role = session.create_role("Admins").unwrap();
        session.create_user("alice").unwrap();
        session.create_right("Main.T.Select", None).unwrap();

        session.grant_right_to_role("Main.T.Select", role, true).unwrap();
        session
            .grant_right_to_user("Main.T.Select", "alice", false)
            .unwrap();

        let mut conn = catalog.store().connection().unwrap();
        let stored = catalog
            .store()
            .load_right(&mut conn, "Main.T.Select")
            .unwrap()
            .unwrap();
        assert_eq!(stored.role_grants.get(&role), Some(&true));
        assert_eq!(stored.user_grants.get("alice"), Some(&false));

        session.revoke_right_from_user("Main.T.Select", "alice").unwrap();
        let stored = catalog
            .store()
            .load_right(&mut conn, "Main.T.Select")
            .unwrap()
            .unwrap();
        assert!(stored.user_grants.is_empty());
    }

    #[test]
    fn test_unknown_right_rejected() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        assert!(matches!(
            session.grant_right_to_user("NoSuch", "alice", true),
            Err(CatalogError::RightNotFound(_))
        ));
    }

    #[test]
    fn test_device_stop_deferred_until_commit() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let id = session
            .register_device(
                SchemaObject::new(0, "Disk1", ObjectKind::Device).persistent(),
                "strict",
            )
            .unwrap();
        session.start_device(id).unwrap();

        session.begin().unwrap();
        session.stop_device(id).unwrap();
        // Still running until the outermost commit.
        assert_eq!(catalog.device_state(id), Some(DeviceState::Started));
        assert_eq!(session.deferred_len(), 1);
        session.commit().unwrap();
        assert_eq!(catalog.device_state(id), Some(DeviceState::Stopped));
        assert_eq!(session.deferred_len(), 0);
    }

    #[test]
    fn test_device_stop_discarded_on_rollback() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let id = session
            .register_device(
                SchemaObject::new(0, "Disk1", ObjectKind::Device).persistent(),
                "strict",
            )
            .unwrap();
        session.start_device(id).unwrap();

        session.begin().unwrap();
        session.stop_device(id).unwrap();
        session.rollback().unwrap();
        assert_eq!(catalog.device_state(id), Some(DeviceState::Started));
        assert_eq!(session.deferred_len(), 0);
    }

    #[test]
    fn test_device_usage_grant_creates_right() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let id = session
            .register_device(
                SchemaObject::new(0, "Disk1", ObjectKind::Device).persistent(),
                "relaxed",
            )
            .unwrap();

        session.grant_device_usage(id, "alice").unwrap();
        let state = catalog.lock_state();
        let right = state.right("Disk1.Usage").unwrap();
        assert_eq!(right.owner_id, Some(id));
        assert_eq!(right.user_grants.get("alice"), Some(&true));
    }

    #[test]
    fn test_application_transaction_round_trip() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        let t = session.create_object(table("Main.T")).unwrap();

        session
            .register_application_transaction(
                "at-42",
                t,
                serde_json::json!({ "mode": "merge" }),
            )
            .unwrap();

        let mut conn = catalog.store().connection().unwrap();
        let row = catalog
            .store()
            .load_application_transaction(&mut conn, "at-42")
            .unwrap()
            .unwrap();
        assert_eq!(row.object_id, t);
        let params: serde_json::Value = serde_json::from_str(&row.params).unwrap();
        assert_eq!(params["mode"], "merge");

        session.deregister_application_transaction("at-42").unwrap();
        assert!(catalog
            .store()
            .load_application_transaction(&mut conn, "at-42")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_loading_context_skips_log_and_store() {
        let catalog = Catalog::in_memory().unwrap();
        let mut session = catalog.session();
        session.begin().unwrap();
        let log_len = session.log_len();

        session.begin_loading();
        session.create_object(table("Main.Rehydrated")).unwrap();
        session.end_loading();

        assert_eq!(session.log_len(), log_len);
        session.commit().unwrap();
        // Never written through while loading.
        let mut conn = catalog.store().connection().unwrap();
        assert!(catalog
            .store()
            .resolve_name(&mut conn, "Rehydrated", true)
            .unwrap()
            .is_empty());
    }
}
