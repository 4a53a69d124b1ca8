// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! DDL transaction log instructions
//!
//! Every catalog mutation applies its effect to the registry immediately
//! and, when a transaction is open and the session is not rehydrating from
//! the store, records the instruction that undoes it. Each variant captures
//! the pre-mutation state it needs, nothing more.

use crate::txn::{OperationLog, ReversibleInstruction};

use super::error::{CatalogError, CatalogResult};
use super::object::{DeviceState, ObjectId, Right, SchemaObject};
use super::registry::CatalogState;

/// Per-session DDL rollback log
pub type DdlTransactionLog = OperationLog<DdlInstruction>;

/// Undoable record of one in-memory catalog mutation
#[derive(Debug, Clone)]
pub enum DdlInstruction {
    /// An object was cached; undone by removing it
    CreatedObject { id: ObjectId, name: String },
    /// An object was removed; undone by caching it again
    DroppedObject { object: SchemaObject },
    /// An object was replaced; undone by restoring the prior definition
    AlteredObject { before: SchemaObject },
    /// A right was created; undone by removing it
    CreatedRight { name: String },
    /// A right was removed; undone by reinserting it
    DroppedRight { right: Right },
    /// A right's grants changed; undone by restoring the prior grants
    AlteredRight { before: Right },
    /// A device gained a run state; undone by forgetting it
    RegisteredDevice { id: ObjectId },
    /// A device's run state changed; undone by restoring the prior state
    DeviceStateChanged { id: ObjectId, before: DeviceState },
    /// A device's run state was dropped; undone by reinserting it
    RemovedDevice { id: ObjectId, before: DeviceState },
}

impl ReversibleInstruction for DdlInstruction {
    type Context = CatalogState;
    type Error = CatalogError;

    fn undo(&self, state: &mut CatalogState) -> CatalogResult<()> {
        match self {
            DdlInstruction::CreatedObject { id, .. } => {
                state.remove_object(*id)?;
            }
            DdlInstruction::DroppedObject { object } => {
                state.cache_object(object.clone())?;
            }
            DdlInstruction::AlteredObject { before } => {
                state.replace_object(before.clone())?;
            }
            DdlInstruction::CreatedRight { name } => {
                state
                    .remove_right(name)
                    .ok_or_else(|| CatalogError::RightNotFound(name.clone()))?;
            }
            DdlInstruction::DroppedRight { right } => {
                state.insert_right(right.clone());
            }
            DdlInstruction::AlteredRight { before } => {
                state.insert_right(before.clone());
            }
            DdlInstruction::RegisteredDevice { id } => {
                state
                    .remove_device_state(*id)
                    .ok_or(CatalogError::DeviceNotFound(*id))?;
            }
            DdlInstruction::DeviceStateChanged { id, before }
            | DdlInstruction::RemovedDevice { id, before } => {
                state.set_device_state(*id, *before);
            }
        }
        Ok(())
    }

    fn describe(&self) -> String {
        match self {
            DdlInstruction::CreatedObject { id, name } => {
                format!("create of object {} (#{})", name, id)
            }
            DdlInstruction::DroppedObject { object } => {
                format!("drop of object {} (#{})", object.name, object.id)
            }
            DdlInstruction::AlteredObject { before } => {
                format!("alter of object {} (#{})", before.name, before.id)
            }
            DdlInstruction::CreatedRight { name } => format!("create of right {}", name),
            DdlInstruction::DroppedRight { right } => format!("drop of right {}", right.name),
            DdlInstruction::AlteredRight { before } => format!("alter of right {}", before.name),
            DdlInstruction::RegisteredDevice { id } => format!("register of device #{}", id),
            DdlInstruction::DeviceStateChanged { id, .. } => {
                format!("state change of device #{}", id)
            }
            DdlInstruction::RemovedDevice { id, .. } => format!("removal of device #{}", id),
        }
    }
}

/// Side effect queued until the outermost commit succeeds
///
/// Stopping a device is expensive and unsafe to undo, so it never runs
/// inside an open transaction; a rollback simply discards the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    StopDevice(ObjectId),
}
