use crate::db::Database;

#[test]
fn test_open_and_migrate() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();
    let conn = db.conn();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='cost_cache'",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_migrations_are_idempotent() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();
    db.run_migrations().unwrap();
    let version: i64 = db
        .conn()
        .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
        .unwrap();
    assert_eq!(version, 1);
}

#[test]
fn test_put_and_get_cost_record() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();

    assert!(db.get_cost_record("k1").unwrap().is_none());
    assert!(db.put_cost_record("k1", "{\"volumes\":{}}").unwrap());

    let row = db.get_cost_record("k1").unwrap().unwrap();
    assert_eq!(row.cache_key, "k1");
    assert_eq!(row.record, "{\"volumes\":{}}");
    assert!(!row.created_at.is_empty());
}

#[test]
fn test_existing_record_is_kept() {
    let db = Database::open_in_memory().unwrap();
    db.run_migrations().unwrap();

    assert!(db.put_cost_record("k1", "first").unwrap());
    assert!(!db.put_cost_record("k1", "second").unwrap());
    assert!(db.put_cost_record("k2", "other").unwrap());

    assert_eq!(db.get_cost_record("k1").unwrap().unwrap().record, "first");
    assert_eq!(db.count_cost_records().unwrap(), 2);
}
