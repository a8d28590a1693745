//! Unit tests for the SQLite-backed record store.

use std::sync::Arc;

use marksync::database::Database;
use marksync::managers::bookmark_store::{RecordStore, SqliteRecordStore};
use marksync::managers::change_notifier::ChangeBus;
use marksync::types::errors::StoreError;
use marksync::types::identity::Identity;
use marksync::types::notification::ChangeKind;

fn setup() -> SqliteRecordStore {
    let db = Database::open_in_memory().expect("Failed to open in-memory database");
    SqliteRecordStore::new(Arc::new(db))
}

fn user(id: &str) -> Identity {
    Identity::new(id, None)
}

/// A fresh store lists nothing for any owner.
#[tokio::test]
async fn test_list_empty() {
    let store = setup();
    let items = store.list_for(&user("u1")).await.unwrap();
    assert!(items.is_empty());
}

/// The store assigns id, owner and creation time on insert.
#[tokio::test]
async fn test_insert_assigns_id_owner_and_timestamp() {
    let store = setup();
    let b = store.insert(&user("u1"), "https://x.test", "Docs").await.unwrap();

    assert!(!b.id.is_empty());
    assert_eq!(b.owner_id, "u1");
    assert_eq!(b.url, "https://x.test");
    assert_eq!(b.title, "Docs");
    assert!(b.created_at > 0);
}

/// Surrounding whitespace is stripped from url and title.
#[tokio::test]
async fn test_insert_trims_input() {
    let store = setup();
    let b = store.insert(&user("u1"), "  https://x.test ", "  Docs  ").await.unwrap();
    assert_eq!(b.url, "https://x.test");
    assert_eq!(b.title, "Docs");
}

/// A blank title is stored empty and rendered as the url.
#[tokio::test]
async fn test_blank_title_falls_back_to_url() {
    let store = setup();
    let b = store.insert(&user("u1"), "https://x.test", "   ").await.unwrap();
    assert_eq!(b.title, "");
    assert_eq!(b.display_title(), "https://x.test");
}

/// An empty url is a validation error and stores nothing.
#[tokio::test]
async fn test_empty_url_is_rejected() {
    let store = setup();
    let err = store.insert(&user("u1"), "   ", "Docs").await.unwrap_err();
    assert!(matches!(err, StoreError::Validation(_)));
    assert!(store.list_for(&user("u1")).await.unwrap().is_empty());
}

/// Listings come back newest first.
#[tokio::test]
async fn test_list_is_newest_first() {
    let store = setup();
    store.insert(&user("u1"), "https://a.test", "A").await.unwrap();
    store.insert(&user("u1"), "https://b.test", "B").await.unwrap();
    store.insert(&user("u1"), "https://c.test", "C").await.unwrap();

    let titles: Vec<String> = store
        .list_for(&user("u1"))
        .await
        .unwrap()
        .into_iter()
        .map(|b| b.title)
        .collect();
    assert_eq!(titles, vec!["C", "B", "A"]);
}

/// One owner never sees another owner's bookmarks.
#[tokio::test]
async fn test_owners_are_isolated() {
    let store = setup();
    store.insert(&user("u1"), "https://mine.test", "Mine").await.unwrap();
    store.insert(&user("u2"), "https://theirs.test", "Theirs").await.unwrap();

    let mine = store.list_for(&user("u1")).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(mine.iter().all(|b| b.owner_id == "u1"));
}

/// Deleting an absent or already deleted id succeeds.
#[tokio::test]
async fn test_delete_is_idempotent() {
    let store = setup();
    let b = store.insert(&user("u1"), "https://x.test", "X").await.unwrap();

    store.delete(&user("u1"), &b.id).await.unwrap();
    store.delete(&user("u1"), &b.id).await.unwrap();
    store.delete(&user("u1"), "never-existed").await.unwrap();

    assert!(store.list_for(&user("u1")).await.unwrap().is_empty());
}

/// A delete scoped to one owner leaves other owners' rows alone.
#[tokio::test]
async fn test_delete_cannot_touch_another_owner() {
    let store = setup();
    let theirs = store.insert(&user("u2"), "https://theirs.test", "Theirs").await.unwrap();

    store.delete(&user("u1"), &theirs.id).await.unwrap();

    let remaining = store.list_for(&user("u2")).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].id, theirs.id);
}

/// Effective inserts and deletes publish a change record; no-op deletes do not.
#[tokio::test]
async fn test_mutations_publish_change_records() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let bus = ChangeBus::new(16);
    let mut rx = bus.receiver();
    let store = SqliteRecordStore::new(db).with_change_bus(bus, "public", "bookmarks");

    let b = store.insert(&user("u1"), "https://x.test", "X").await.unwrap();
    let record = rx.try_recv().unwrap();
    assert_eq!(record.kind, ChangeKind::Insert);
    assert_eq!(record.table, "bookmarks");
    assert_eq!(record.schema, "public");

    store.delete(&user("u1"), &b.id).await.unwrap();
    assert_eq!(rx.try_recv().unwrap().kind, ChangeKind::Delete);

    // nothing changed, nothing published
    store.delete(&user("u1"), &b.id).await.unwrap();
    assert!(rx.try_recv().is_err());
}

/// A rejected insert publishes no change record.
#[tokio::test]
async fn test_rejected_insert_publishes_nothing() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let bus = ChangeBus::new(16);
    let mut rx = bus.receiver();
    let store = SqliteRecordStore::new(db).with_change_bus(bus, "public", "bookmarks");

    let _ = store.insert(&user("u1"), "", "X").await;
    assert!(rx.try_recv().is_err());
}
