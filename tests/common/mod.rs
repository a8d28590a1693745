//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use marksync::database::Database;
use marksync::managers::bookmark_store::{RecordStore, SqliteRecordStore};
use marksync::managers::change_notifier::{BroadcastNotifier, ChangeBus, ChangeCallback, ChangeNotifier, SubscriptionHandle};
use marksync::managers::sync_reconciler::{Command, Reconciler, SyncEvent};
use marksync::types::bookmark::Bookmark;
use marksync::types::errors::{NotifierError, StoreError};
use marksync::types::identity::{Identity, IdentityTransition};
use marksync::types::notification::Topic;

pub fn identity(id: &str) -> Identity {
    Identity::new(id, Some(&format!("{}@example.test", id)))
}

pub fn bookmark(id: &str, owner: &str, created_at: i64) -> Bookmark {
    Bookmark {
        id: id.to_string(),
        url: format!("https://{}.test", id),
        title: id.to_uppercase(),
        owner_id: owner.to_string(),
        created_at,
    }
}

pub fn topic() -> Topic {
    Topic::table("public", "bookmarks")
}

/// Store wrapper that counts calls and can simulate an outage.
pub struct CountingStore {
    inner: SqliteRecordStore,
    pub list_calls: AtomicUsize,
    pub insert_calls: AtomicUsize,
    pub delete_calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    pub fn new(inner: SqliteRecordStore) -> Self {
        Self {
            inner,
            list_calls: AtomicUsize::new(0),
            insert_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn lists(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn inserts(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for CountingStore {
    async fn list_for(&self, owner: &Identity) -> Result<Vec<Bookmark>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.list_for(owner).await
    }

    async fn insert(&self, owner: &Identity, url: &str, title: &str) -> Result<Bookmark, StoreError> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.insert(owner, url, title).await
    }

    async fn delete(&self, owner: &Identity, id: &str) -> Result<(), StoreError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.inner.delete(owner, id).await
    }
}

/// Notifier whose change stream is always down.
pub struct OfflineNotifier;

impl ChangeNotifier for OfflineNotifier {
    fn subscribe(&self, _topic: &Topic, _callback: ChangeCallback) -> Result<SubscriptionHandle, NotifierError> {
        Err(NotifierError::Unavailable("realtime endpoint unreachable".to_string()))
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), NotifierError> {
        Err(NotifierError::AlreadyReleased(handle.id()))
    }
}

/// A reconciler driven by hand, over a real SQLite store and change bus.
pub struct Harness {
    pub reconciler: Reconciler,
    pub rx: mpsc::UnboundedReceiver<SyncEvent>,
    pub store: Arc<CountingStore>,
    pub notifier: Arc<BroadcastNotifier>,
    /// Same database, no instrumentation; writes here still hit the change bus.
    pub backend: Arc<SqliteRecordStore>,
}

impl Harness {
    pub fn new() -> Self {
        let db = Arc::new(Database::open_in_memory().expect("in-memory database"));
        let bus = ChangeBus::new(64);
        let store = Arc::new(CountingStore::new(
            SqliteRecordStore::new(db.clone()).with_change_bus(bus.clone(), "public", "bookmarks"),
        ));
        let backend = Arc::new(SqliteRecordStore::new(db).with_change_bus(bus.clone(), "public", "bookmarks"));
        let notifier = Arc::new(BroadcastNotifier::new(bus));
        let (reconciler, rx) = Reconciler::new(store.clone(), notifier.clone(), topic());
        Self {
            reconciler,
            rx,
            store,
            notifier,
            backend,
        }
    }

    pub fn apply(&mut self, event: SyncEvent) {
        self.reconciler.apply(event);
    }

    pub fn sign_in(&mut self, user: &str) {
        self.apply(SyncEvent::Identity(IdentityTransition::SignedIn(identity(user))));
    }

    pub fn sign_out(&mut self) {
        self.apply(SyncEvent::Identity(IdentityTransition::SignedOut));
    }

    pub fn add(&mut self, title: &str, url: &str) {
        self.apply(SyncEvent::Command(Command::AddBookmark {
            title: title.to_string(),
            url: url.to_string(),
        }));
    }

    pub fn delete(&mut self, id: &str) {
        self.apply(SyncEvent::Command(Command::DeleteBookmark { id: id.to_string() }));
    }

    /// Feeds queued events back in until nothing arrives for a while.
    pub async fn settle(&mut self) {
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(150), self.rx.recv()).await {
            self.reconciler.apply(event);
        }
    }

    pub fn titles(&self) -> Vec<String> {
        self.reconciler
            .snapshot()
            .bookmarks
            .iter()
            .map(|b| b.title.clone())
            .collect()
    }
}
