//! Store-level transaction nesting and connection pooling
//!
//! The bundled backends expose one native transaction level; deeper levels
//! run through compensating statements. The pool is LIFO with a hard cap
//! that fails fast.

use rellite::store::{CatalogStore, StoreError, StoreTable};

const PK_RIGHTS: &str = "pk_rights";

#[test]
fn test_nested_emulation_inner_rollback() {
    let store = CatalogStore::in_memory();
    let mut conn = store.connection().unwrap();

    conn.begin().unwrap();
    conn.insert(StoreTable::Rights, PK_RIGHTS, b"row\0", b"outer")
        .unwrap();

    conn.begin().unwrap();
    conn.update(StoreTable::Rights, PK_RIGHTS, b"row\0", b"inner")
        .unwrap();
    conn.rollback().unwrap();

    // The row is exactly as the outer insert left it, outer still open.
    assert!(conn.in_transaction());
    assert_eq!(conn.depth(), 1);
    assert_eq!(
        conn.get(StoreTable::Rights, PK_RIGHTS, b"row\0").unwrap(),
        Some(b"outer".to_vec())
    );

    conn.commit().unwrap();
    assert_eq!(
        conn.get(StoreTable::Rights, PK_RIGHTS, b"row\0").unwrap(),
        Some(b"outer".to_vec())
    );
}

#[test]
fn test_three_levels_deep() {
    let store = CatalogStore::in_memory();
    let mut conn = store.connection().unwrap();

    conn.begin().unwrap();
    conn.insert(StoreTable::Rights, PK_RIGHTS, b"a\0", b"1").unwrap();
    conn.begin().unwrap();
    conn.insert(StoreTable::Rights, PK_RIGHTS, b"b\0", b"2").unwrap();
    conn.begin().unwrap();
    conn.delete(StoreTable::Rights, PK_RIGHTS, b"a\0").unwrap();
    assert_eq!(conn.depth(), 3);

    // Innermost rollback reinserts the deleted row.
    conn.rollback().unwrap();
    assert_eq!(
        conn.get(StoreTable::Rights, PK_RIGHTS, b"a\0").unwrap(),
        Some(b"1".to_vec())
    );

    // Middle commit keeps its insert; outer rollback reverts everything.
    conn.commit().unwrap();
    conn.rollback().unwrap();
    assert_eq!(conn.depth(), 0);
    assert_eq!(conn.get(StoreTable::Rights, PK_RIGHTS, b"a\0").unwrap(), None);
    assert_eq!(conn.get(StoreTable::Rights, PK_RIGHTS, b"b\0").unwrap(), None);
}

#[test]
fn test_outermost_commit_durable_outermost_rollback_reverts() {
    let store = CatalogStore::in_memory();
    {
        let mut conn = store.connection().unwrap();
        conn.begin().unwrap();
        conn.insert(StoreTable::Rights, PK_RIGHTS, b"kept\0", b"v")
            .unwrap();
        conn.commit().unwrap();
    }
    let mut conn = store.connection().unwrap();
    assert_eq!(
        conn.get(StoreTable::Rights, PK_RIGHTS, b"kept\0").unwrap(),
        Some(b"v".to_vec())
    );
}

#[test]
fn test_pool_cap_fails_fast_without_queueing() {
    let store = CatalogStore::in_memory();
    let cap = store.pool().max_connections();
    let mut held = Vec::new();
    for _ in 0..cap {
        held.push(store.connection().unwrap());
    }
    assert!(matches!(
        store.connection(),
        Err(StoreError::ConnectionLimit(_))
    ));
    held.pop();
    assert!(store.connection().is_ok());
}

#[test]
fn test_commit_without_begin_is_rejected() {
    let store = CatalogStore::in_memory();
    let mut conn = store.connection().unwrap();
    assert!(matches!(conn.commit(), Err(StoreError::NoTransaction)));
    assert!(matches!(conn.rollback(), Err(StoreError::NoTransaction)));
}

#[cfg(feature = "sled-backend")]
mod durable {
    use super::*;
    use rellite::store::StoreConnection;

    fn put(conn: &mut StoreConnection, key: &[u8], value: &[u8]) {
        conn.begin().unwrap();
        conn.insert(StoreTable::Rights, PK_RIGHTS, key, value).unwrap();
        conn.commit().unwrap();
    }

    #[test]
    #[serial_test::serial]
    fn test_sled_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = CatalogStore::open(dir.path()).unwrap();
            let mut conn = store.connection().unwrap();
            put(&mut conn, b"persisted\0", b"v");
        }
        let store = CatalogStore::open(dir.path()).unwrap();
        let mut conn = store.connection().unwrap();
        assert_eq!(
            conn.get(StoreTable::Rights, PK_RIGHTS, b"persisted\0").unwrap(),
            Some(b"v".to_vec())
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_sled_nested_emulation() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::open(dir.path()).unwrap();
        let mut conn = store.connection().unwrap();

        conn.begin().unwrap();
        conn.insert(StoreTable::Rights, PK_RIGHTS, b"row\0", b"outer")
            .unwrap();
        conn.begin().unwrap();
        conn.update(StoreTable::Rights, PK_RIGHTS, b"row\0", b"inner")
            .unwrap();
        conn.rollback().unwrap();
        conn.commit().unwrap();

        assert_eq!(
            conn.get(StoreTable::Rights, PK_RIGHTS, b"row\0").unwrap(),
            Some(b"outer".to_vec())
        );
    }
}
