use meronotes_core::db::{open_db, open_db_in_memory};
use meronotes_core::{
    NoteStore, SlotRepoError, SlotRepository, SqliteSlotRepository, StoreConfig, DEFAULT_SLOT_KEY,
};
use rusqlite::Connection;

#[test]
fn sqlite_repository_upserts_and_deletes() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSlotRepository::try_new(&conn).unwrap();

    assert_eq!(repo.read_slot("a").unwrap(), None);
    repo.write_slot("a", "[]").unwrap();
    repo.write_slot("a", "[{\"x\":1}]").unwrap();
    assert_eq!(repo.read_slot("a").unwrap().as_deref(), Some("[{\"x\":1}]"));

    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM kv_slots;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);

    assert!(repo.delete_slot("a").unwrap());
    assert!(!repo.delete_slot("a").unwrap());
}

#[test]
fn repository_rejects_unmigrated_connection() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteSlotRepository::try_new(&conn).err().unwrap();
    assert!(matches!(
        err,
        SlotRepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn open_initializes_absent_slot_to_empty_array() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSlotRepository::try_new(&conn).unwrap();

    let store = NoteStore::open(&repo, &StoreConfig::default()).unwrap();
    assert!(store.is_empty().unwrap());
    assert_eq!(repo.read_slot(DEFAULT_SLOT_KEY).unwrap().as_deref(), Some("[]"));
}

#[test]
fn forest_survives_reopen_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig::default();
    let path = config.db_path(dir.path());

    let (root_id, child_id) = {
        let conn = open_db(&path).unwrap();
        let repo = SqliteSlotRepository::try_new(&conn).unwrap();
        let mut store = NoteStore::open(repo, &config).unwrap();
        let root = store.add("buy milk").unwrap();
        let child = store.add_child(root.id, "2%").unwrap().unwrap();
        store.done(child.id).unwrap().unwrap();
        (root.id, child.id)
    };

    let conn = open_db(&path).unwrap();
    let repo = SqliteSlotRepository::try_new(&conn).unwrap();
    let store = NoteStore::open(repo, &config).unwrap();

    let root = store.get(root_id).unwrap().unwrap();
    assert!(root.done);
    assert_eq!(root.children.len(), 1);
    assert_eq!(root.children[0].id, child_id);
    assert_eq!(root.children[0].parent, Some(root_id));
    assert!(root.children[0].done);
}

#[test]
fn stores_with_different_keys_are_isolated() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSlotRepository::try_new(&conn).unwrap();
    let work = StoreConfig::default().with_slot_key("work/notes").unwrap();

    let mut personal = NoteStore::open(&repo, &StoreConfig::default()).unwrap();
    let mut office = NoteStore::open(&repo, &work).unwrap();
    personal.add("groceries").unwrap();
    office.add("standup").unwrap();
    office.add("review").unwrap();

    assert_eq!(personal.forest().unwrap().len(), 1);
    assert_eq!(office.forest().unwrap().len(), 2);
}

#[test]
fn slot_layout_matches_note_records() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSlotRepository::try_new(&conn).unwrap();
    let mut store = NoteStore::open(&repo, &StoreConfig::default()).unwrap();
    let root = store.add("buy milk").unwrap();
    let child = store.add_child(root.id, "2%").unwrap().unwrap();

    let raw = repo.read_slot(DEFAULT_SLOT_KEY).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
    let record = &value[0];
    assert_eq!(record["id"], root.id.to_string());
    assert_eq!(record["contents"], "buy milk");
    assert_eq!(record["done"], false);
    assert!(record.get("parent").is_none());
    assert_eq!(record["children"][0]["id"], child.id.to_string());
    assert_eq!(record["children"][0]["parent"], root.id.to_string());
}

#[test]
fn externally_written_forest_without_children_field_loads() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteSlotRepository::try_new(&conn).unwrap();
    repo.write_slot(
        DEFAULT_SLOT_KEY,
        r#"[{"id":"6f1c1c39-2f43-4e55-9a43-0f3f7f4d2b10","contents":"legacy","done":true}]"#,
    )
    .unwrap();

    let store = NoteStore::open(&repo, &StoreConfig::default()).unwrap();
    let forest = store.forest().unwrap();
    assert_eq!(forest.len(), 1);
    assert!(forest.roots()[0].children.is_empty());
    assert!(!store.has_todo_items().unwrap());
}
