mod helpers;

use mnemos::db;
use mnemos::db::migrations::{get_schema_version, CURRENT_SCHEMA_VERSION};
use mnemos::embedding::store::{DurableTier, SqliteEmbeddingStore};
use mnemos::memory::store::{count_memories, insert_memory};
use tempfile::TempDir;

#[test]
fn open_creates_new_db_at_nonexistent_path() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("subdir").join("new.db");
    assert!(!db_path.exists());

    let conn = db::open_database(&db_path).unwrap();

    assert!(db_path.exists());
    assert_eq!(count_memories(&conn).unwrap(), 0);
    assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_SCHEMA_VERSION);
}

#[test]
fn all_tables_exist() {
    let conn = helpers::test_db();
    for table in ["embedding_cache", "memories", "schema_meta"] {
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                [table],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 1, "missing table {table}");
    }
}

#[test]
fn busy_timeout_is_set() {
    let tmp = TempDir::new().unwrap();
    let conn = db::open_database(tmp.path().join("test.db")).unwrap();

    let timeout: i64 = conn
        .pragma_query_value(None, "busy_timeout", |row| row.get(0))
        .unwrap();
    assert_eq!(timeout, 5000);
}

#[test]
fn cache_and_records_share_one_file() {
    let tmp = TempDir::new().unwrap();
    let db_path = tmp.path().join("shared.db");

    let conn = db::open_database(&db_path).unwrap();
    insert_memory(&conn, "I love coffee", Some(&[1.0, 0.0])).unwrap();

    let store = SqliteEmbeddingStore::open(&db_path).unwrap();
    assert_eq!(store.stats().unwrap().entry_count, 0);

    // reopening keeps the data
    drop(conn);
    let conn = db::open_database(&db_path).unwrap();
    assert_eq!(count_memories(&conn).unwrap(), 1);
}
