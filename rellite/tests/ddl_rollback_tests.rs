//! DDL transaction rollback and commit semantics
//!
//! Rollback must restore the in-memory registry exactly; commit must keep
//! the mutated state and only discard the log. Nested levels roll back
//! independently of their enclosing transaction.

use rellite::catalog::{Catalog, DeviceState, ObjectKind, SchemaObject};

fn table(name: &str) -> SchemaObject {
    SchemaObject::new(0, name, ObjectKind::BaseTable).persistent()
}

#[test]
fn test_rollback_restores_pre_begin_state_exactly() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();

    let customer = session.create_object(table("Main.Customer")).unwrap();
    session.create_right("Main.Customer.Select", Some(customer)).unwrap();
    let snapshot = catalog.snapshot();

    session.begin().unwrap();
    session.create_object(table("Main.Orders")).unwrap();
    session.rename_object(customer, "Main.Client").unwrap();
    session
        .grant_right_to_user("Main.Customer.Select", "alice", true)
        .unwrap();
    session.drop_right("Main.Customer.Select").unwrap();
    assert_ne!(catalog.snapshot(), snapshot);

    session.rollback().unwrap();
    assert_eq!(catalog.snapshot(), snapshot);
}

#[test]
fn test_commit_keeps_state_and_discards_log() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    let log_before = session.log_len();

    session.begin().unwrap();
    session.create_object(table("Main.A")).unwrap();
    session.create_object(table("Main.B")).unwrap();
    session.commit().unwrap();

    assert_eq!(session.log_len(), log_before);
    assert_eq!(catalog.resident_count(), 2);
    assert!(catalog
        .resolve_cached_by_name("Main.A", false)
        .unwrap()
        .is_some());
}

#[test]
fn test_inner_rollback_leaves_outer_mutations() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();

    session.begin().unwrap();
    session.create_object(table("Main.Outer")).unwrap();
    let mid = catalog.snapshot();

    session.begin().unwrap();
    session.create_object(table("Main.Inner")).unwrap();
    session.rollback().unwrap();

    assert_eq!(catalog.snapshot(), mid);
    assert!(session.in_transaction());
    session.commit().unwrap();
    assert!(catalog
        .resolve_cached_by_name("Main.Outer", false)
        .unwrap()
        .is_some());
    assert!(catalog
        .resolve_cached_by_name("Main.Inner", false)
        .unwrap()
        .is_none());
}

#[test]
fn test_rollback_reverts_store_writes() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();

    session.begin().unwrap();
    session.create_object(table("Main.Ghost")).unwrap();
    session.rollback().unwrap();

    let mut conn = catalog.store().connection().unwrap();
    assert!(catalog
        .store()
        .resolve_name(&mut conn, "Ghost", true)
        .unwrap()
        .is_empty());
    let stats = catalog.store().stats(&mut conn).unwrap();
    assert_eq!(stats.total_rows(), 0);
}

#[test]
fn test_dropped_object_restored_on_rollback() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    let t = session.create_object(table("Main.T")).unwrap();
    session
        .create_object(
            SchemaObject::new(0, "Main.T.PK", ObjectKind::Constraint)
                .persistent()
                .generated_by(t),
        )
        .unwrap();
    let snapshot = catalog.snapshot();

    session.begin().unwrap();
    session.drop_object(t).unwrap();
    assert_eq!(catalog.resident_count(), 0);
    session.rollback().unwrap();

    assert_eq!(catalog.snapshot(), snapshot);
    // The store rows came back with the native rollback.
    let mut conn = catalog.store().connection().unwrap();
    assert!(catalog.store().load_object(&mut conn, t).unwrap().is_some());
}

#[test]
fn test_device_registration_rolls_back() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    let snapshot = catalog.snapshot();

    session.begin().unwrap();
    let id = session
        .register_device(
            SchemaObject::new(0, "Disk1", ObjectKind::Device).persistent(),
            "strict",
        )
        .unwrap();
    assert_eq!(catalog.device_state(id), Some(DeviceState::Registered));
    session.rollback().unwrap();

    assert_eq!(catalog.device_state(id), None);
    assert_eq!(catalog.snapshot(), snapshot);
}
