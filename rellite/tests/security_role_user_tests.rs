//! Users, roles, rights, and device usage grants
//!
//! Grants carry an explicit granted/denied flag; revocation removes the
//! assignment entirely. Device usage is modeled as a user grant on the
//! device's `<name>.Usage` right.

use rellite::catalog::{Catalog, CatalogError, ObjectKind, SchemaObject};

#[test]
fn test_user_and_role_lifecycle() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();

    let alice = session.create_user("alice").unwrap();
    let admins = session.create_role("Admins").unwrap();
    assert_eq!(catalog.resident_count(), 2);

    let user = catalog.resolve_by_id(alice).unwrap();
    assert_eq!(user.kind, ObjectKind::User);

    session.drop_object(alice).unwrap();
    session.drop_object(admins).unwrap();
    assert_eq!(catalog.resident_count(), 0);
}

#[test]
fn test_grant_deny_and_revoke_persist() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    let admins = session.create_role("Admins").unwrap();
    session.create_right("Main.T.Select", None).unwrap();

    session.grant_right_to_role("Main.T.Select", admins, true).unwrap();
    session.grant_right_to_user("Main.T.Select", "bob", false).unwrap();

    let mut conn = catalog.store().connection().unwrap();
    let stored = catalog
        .store()
        .load_right(&mut conn, "Main.T.Select")
        .unwrap()
        .unwrap();
    assert_eq!(stored.role_grants.get(&admins), Some(&true));
    // An explicit denial is distinct from no assignment.
    assert_eq!(stored.user_grants.get("bob"), Some(&false));

    session.revoke_right_from_role("Main.T.Select", admins).unwrap();
    let stored = catalog
        .store()
        .load_right(&mut conn, "Main.T.Select")
        .unwrap()
        .unwrap();
    assert!(stored.role_grants.is_empty());
}

#[test]
fn test_duplicate_right_rejected() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    session.create_right("Main.T.Select", None).unwrap();
    assert!(matches!(
        session.create_right("Main.T.Select", None),
        Err(CatalogError::DuplicateObjectName(_))
    ));
}

#[test]
fn test_drop_right_removes_assignments() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    session.create_right("Main.T.Select", None).unwrap();
    session.grant_right_to_user("Main.T.Select", "bob", true).unwrap();

    session.drop_right("Main.T.Select").unwrap();

    let mut conn = catalog.store().connection().unwrap();
    assert!(catalog
        .store()
        .load_right(&mut conn, "Main.T.Select")
        .unwrap()
        .is_none());
    assert_eq!(catalog.store().stats(&mut conn).unwrap().total_rows(), 0);
}

#[test]
fn test_rights_transactional() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    session.create_right("Main.T.Select", None).unwrap();
    let snapshot = catalog.snapshot();

    session.begin().unwrap();
    session.grant_right_to_user("Main.T.Select", "carol", true).unwrap();
    session.create_right("Main.T.Update", None).unwrap();
    session.rollback().unwrap();

    assert_eq!(catalog.snapshot(), snapshot);
    let mut conn = catalog.store().connection().unwrap();
    assert!(catalog
        .store()
        .load_right(&mut conn, "Main.T.Update")
        .unwrap()
        .is_none());
    let select = catalog
        .store()
        .load_right(&mut conn, "Main.T.Select")
        .unwrap()
        .unwrap();
    assert!(select.user_grants.is_empty());
}

#[test]
fn test_device_usage_grant_and_revoke() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    let disk = session
        .register_device(
            SchemaObject::new(0, "Disk1", ObjectKind::Device).persistent(),
            "strict",
        )
        .unwrap();

    session.grant_device_usage(disk, "alice").unwrap();
    session.grant_device_usage(disk, "bob").unwrap();

    let mut conn = catalog.store().connection().unwrap();
    let usage = catalog
        .store()
        .load_right(&mut conn, "Disk1.Usage")
        .unwrap()
        .unwrap();
    assert_eq!(usage.owner_id, Some(disk));
    assert_eq!(usage.user_grants.len(), 2);

    session.revoke_device_usage(disk, "alice").unwrap();
    let usage = catalog
        .store()
        .load_right(&mut conn, "Disk1.Usage")
        .unwrap()
        .unwrap();
    assert_eq!(usage.user_grants.len(), 1);
    assert_eq!(usage.user_grants.get("bob"), Some(&true));
}

#[test]
fn test_device_usage_for_unknown_device_rejected() {
    let catalog = Catalog::in_memory().expect("Failed to open catalog");
    let mut session = catalog.session();
    assert!(matches!(
        session.grant_device_usage(99, "alice"),
        Err(CatalogError::ObjectIdNotFound(99))
    ));
}
