//! Sync Reconciler for Marksync.
//!
//! A single-consumer state machine that folds identity transitions, change
//! signals and user commands into one [`ViewState`]. Every input goes through
//! one ordered queue. Store calls run as spawned tasks that post their result
//! back into the same queue, so the loop never waits on the network and a
//! stale listing can be recognised (and dropped) by its request number.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::managers::bookmark_store::RecordStore;
use crate::managers::change_notifier::{ChangeCallback, ChangeNotifier, Subscription};
use crate::managers::session_manager::{IdentityStream, SessionManager};
use crate::types::bookmark::Bookmark;
use crate::types::errors::{StoreError, SyncError};
use crate::types::identity::{AuthProvider, Identity, IdentityTransition, SignInFlow};
use crate::types::notification::{ChangeSignal, SubscriptionId, Topic};
use crate::types::view::ViewState;

/// Mutation requested by the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    AddBookmark { title: String, url: String },
    DeleteBookmark { id: String },
}

/// Which store mutation a `CommandCompleted` reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOp {
    Insert,
    Delete,
}

/// Everything the reconciler reacts to, in arrival order.
#[derive(Debug)]
pub enum SyncEvent {
    Identity(IdentityTransition),
    Changed(ChangeSignal),
    Command(Command),
    /// Posted by the task serving refresh number `request`.
    RefreshCompleted {
        request: u64,
        owner: String,
        result: Result<Vec<Bookmark>, StoreError>,
    },
    /// Posted by the task serving an insert or delete.
    CommandCompleted {
        owner: String,
        op: CommandOp,
        result: Result<(), StoreError>,
    },
    Shutdown,
}

pub type EventQueue = mpsc::UnboundedSender<SyncEvent>;

enum SyncState {
    Unauthenticated,
    Authenticated {
        identity: Identity,
        subscription: Option<Subscription>,
    },
}

/// Orchestrates session, store and notifier into one consistent view.
pub struct Reconciler {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn ChangeNotifier>,
    topic: Topic,
    queue: EventQueue,
    state: SyncState,
    view: watch::Sender<ViewState>,
    issued_refreshes: u64,
}

impl Reconciler {
    /// Creates a reconciler in `Unauthenticated` together with the receiving
    /// end of its event queue.
    pub fn new(
        store: Arc<dyn RecordStore>,
        notifier: Arc<dyn ChangeNotifier>,
        topic: Topic,
    ) -> (Self, mpsc::UnboundedReceiver<SyncEvent>) {
        let (queue, rx) = mpsc::unbounded_channel();
        let (view, _) = watch::channel(ViewState::default());
        let reconciler = Self {
            store,
            notifier,
            topic,
            queue,
            state: SyncState::Unauthenticated,
            view,
            issued_refreshes: 0,
        };
        (reconciler, rx)
    }

    pub fn queue(&self) -> EventQueue {
        self.queue.clone()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.view.subscribe()
    }

    pub fn snapshot(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            SyncState::Authenticated { identity, .. } => Some(identity),
            SyncState::Unauthenticated => None,
        }
    }

    /// Id of the live subscription, if one is open.
    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        match &self.state {
            SyncState::Authenticated { subscription, .. } => subscription.as_ref().and_then(Subscription::id),
            SyncState::Unauthenticated => None,
        }
    }

    /// Number of the most recently issued refresh (0 before the first).
    pub fn latest_refresh(&self) -> u64 {
        self.issued_refreshes
    }

    /// Presentation-facing handle sharing this reconciler's queue and view.
    pub fn handle(&self, sessions: Arc<SessionManager>) -> SyncHandle {
        SyncHandle {
            queue: self.queue(),
            view: self.watch(),
            sessions,
        }
    }

    /// Processes one event. Returns `false` once the reconciler has shut down.
    pub fn apply(&mut self, event: SyncEvent) -> bool {
        match event {
            SyncEvent::Identity(transition) => self.on_identity(transition),
            SyncEvent::Changed(signal) => self.on_changed(signal),
            SyncEvent::Command(command) => self.on_command(command),
            SyncEvent::RefreshCompleted { request, owner, result } => {
                self.on_refresh_completed(request, &owner, result)
            }
            SyncEvent::CommandCompleted { owner, op, result } => {
                self.on_command_completed(&owner, op, result)
            }
            SyncEvent::Shutdown => {
                self.teardown();
                return false;
            }
        }
        true
    }

    /// Drains the queue until `Shutdown`, then releases the subscription.
    pub async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SyncEvent>) {
        tracing::debug!("reconciler started");
        while let Some(event) = rx.recv().await {
            if !self.apply(event) {
                break;
            }
        }
        self.teardown();
        tracing::debug!("reconciler stopped");
    }

    fn on_identity(&mut self, transition: IdentityTransition) {
        match transition {
            IdentityTransition::SignedIn(next) => {
                let same_account = matches!(
                    &self.state,
                    SyncState::Authenticated { identity, .. } if identity.id == next.id
                );
                if same_account {
                    // token refresh or repeated callback: keep the channel, re-list
                    if let SyncState::Authenticated { identity, .. } = &mut self.state {
                        *identity = next.clone();
                    }
                    self.spawn_refresh();
                    self.view.send_modify(|v| {
                        v.identity = Some(next);
                        v.refreshing = true;
                    });
                    return;
                }
                self.release_session();
                self.enter_session(next);
            }
            IdentityTransition::SignedOut => {
                self.release_session();
                self.view.send_replace(ViewState::default());
            }
            IdentityTransition::AuthFailed { reason } => {
                tracing::warn!(%reason, "authentication failed");
                self.record_error(SyncError::AuthFailure(reason));
            }
        }
    }

    /// Opens the subscription, issues the first listing and publishes the new
    /// session's view in one update.
    fn enter_session(&mut self, identity: Identity) {
        tracing::info!(user = %identity.id, "session started");

        let queue = self.queue.clone();
        let callback: ChangeCallback = Arc::new(move |signal| {
            let _ = queue.send(SyncEvent::Changed(signal));
        });
        let subscription = match Subscription::open(Arc::clone(&self.notifier), &self.topic, callback) {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                tracing::warn!(error = %e, "live updates unavailable");
                None
            }
        };
        let last_error = if subscription.is_none() {
            Some(SyncError::ChangeStreamUnavailable(format!(
                "could not subscribe to {}.{}",
                self.topic.schema, self.topic.table
            )))
        } else {
            None
        };

        self.state = SyncState::Authenticated {
            identity: identity.clone(),
            subscription,
        };
        self.spawn_refresh();
        self.view.send_replace(ViewState {
            identity: Some(identity),
            bookmarks: Vec::new(),
            refreshing: true,
            last_error,
        });
    }

    /// Leaves `Authenticated` and releases its subscription. Publishes nothing;
    /// the caller owns the next view.
    fn release_session(&mut self) {
        let previous = std::mem::replace(&mut self.state, SyncState::Unauthenticated);
        if let SyncState::Authenticated { identity, subscription } = previous {
            tracing::info!(user = %identity.id, "session ended");
            if let Some(subscription) = subscription {
                if let Err(e) = subscription.release() {
                    tracing::warn!(error = %e, "failed to release subscription");
                }
            }
        }
    }

    fn on_changed(&mut self, signal: ChangeSignal) {
        if self.subscription_id() != Some(signal.subscription) {
            tracing::trace!(subscription = %signal.subscription, "signal from released subscription ignored");
            return;
        }
        self.request_refresh();
    }

    /// Issues a listing and marks the view as refreshing.
    fn request_refresh(&mut self) {
        if self.spawn_refresh() {
            self.view.send_modify(|v| v.refreshing = true);
        }
    }

    /// Bumps the refresh counter and spawns the listing without touching the
    /// view. Returns `false` when signed out.
    fn spawn_refresh(&mut self) -> bool {
        let SyncState::Authenticated { identity, .. } = &self.state else {
            return false;
        };
        self.issued_refreshes += 1;
        let request = self.issued_refreshes;
        let owner = identity.clone();
        let store = Arc::clone(&self.store);
        let queue = self.queue.clone();
        tracing::debug!(request, user = %owner.id, "refresh issued");

        tokio::spawn(async move {
            let result = store.list_for(&owner).await;
            let _ = queue.send(SyncEvent::RefreshCompleted {
                request,
                owner: owner.id,
                result,
            });
        });
        true
    }

    fn on_refresh_completed(&mut self, request: u64, owner: &str, result: Result<Vec<Bookmark>, StoreError>) {
        if request != self.issued_refreshes {
            tracing::debug!(request, latest = self.issued_refreshes, "superseded refresh dropped");
            return;
        }
        let Some(identity) = self.identity() else {
            return;
        };
        if identity.id != owner {
            tracing::debug!(request, %owner, "refresh for previous account dropped");
            return;
        }

        match result {
            Ok(mut bookmarks) => {
                let active = identity.id.clone();
                bookmarks.retain(|b| b.owner_id == active);
                bookmarks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                tracing::debug!(request, count = bookmarks.len(), "view refreshed");
                self.view.send_modify(|v| {
                    v.bookmarks = bookmarks;
                    v.refreshing = false;
                    if matches!(v.last_error, Some(SyncError::StoreUnavailable(_))) {
                        v.last_error = None;
                    }
                });
            }
            Err(e) => {
                tracing::warn!(request, error = %e, "refresh failed; keeping last known view");
                self.view.send_modify(|v| {
                    v.refreshing = false;
                    v.last_error = Some(e.into());
                });
            }
        }
    }

    fn on_command(&mut self, command: Command) {
        let Some(identity) = self.identity().cloned() else {
            tracing::debug!(?command, "command ignored while signed out");
            return;
        };
        let store = Arc::clone(&self.store);
        let queue = self.queue.clone();

        match command {
            Command::AddBookmark { title, url } => {
                let (title, url) = (title.trim().to_string(), url.trim().to_string());
                if title.is_empty() || url.is_empty() {
                    tracing::debug!("empty bookmark submission rejected");
                    return;
                }
                tokio::spawn(async move {
                    let result = store.insert(&identity, &url, &title).await.map(|_| ());
                    let _ = queue.send(SyncEvent::CommandCompleted {
                        owner: identity.id,
                        op: CommandOp::Insert,
                        result,
                    });
                });
            }
            Command::DeleteBookmark { id } => {
                tokio::spawn(async move {
                    let result = store.delete(&identity, &id).await;
                    let _ = queue.send(SyncEvent::CommandCompleted {
                        owner: identity.id,
                        op: CommandOp::Delete,
                        result,
                    });
                });
            }
        }
    }

    fn on_command_completed(&mut self, owner: &str, op: CommandOp, result: Result<(), StoreError>) {
        if self.identity().map(|i| i.id.as_str()) != Some(owner) {
            return;
        }
        match result {
            Ok(()) => self.request_refresh(),
            Err(e) => {
                tracing::warn!(?op, error = %e, "bookmark command failed");
                self.record_error(e.into());
            }
        }
    }

    fn record_error(&mut self, error: SyncError) {
        self.view.send_modify(|v| v.last_error = Some(error));
    }

    fn teardown(&mut self) {
        if let SyncState::Authenticated { subscription, .. } = &mut self.state {
            if let Some(subscription) = subscription.take() {
                if let Err(e) = subscription.release() {
                    tracing::warn!(error = %e, "failed to release subscription on shutdown");
                }
            }
        }
    }
}

/// Forwards identity transitions into the reconciler's queue until either side closes.
pub fn spawn_identity_forwarder(mut stream: IdentityStream, queue: EventQueue) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(transition) = stream.next().await {
            if queue.send(SyncEvent::Identity(transition)).is_err() {
                break;
            }
        }
    })
}

/// What the presentation layer holds: commands in, view state out.
#[derive(Clone)]
pub struct SyncHandle {
    queue: EventQueue,
    view: watch::Receiver<ViewState>,
    sessions: Arc<SessionManager>,
}

impl SyncHandle {
    /// Starts a sign-in. Failures end up in `last_error`, not in the return value.
    pub async fn login(&self, provider: AuthProvider) -> Option<SignInFlow> {
        match self.sessions.sign_in(provider).await {
            Ok(flow) => Some(flow),
            Err(e) => {
                self.send(SyncEvent::Identity(IdentityTransition::AuthFailed {
                    reason: e.to_string(),
                }));
                None
            }
        }
    }

    /// Ends the session. Returns `false` if the provider refused; the
    /// failure is also recorded in `last_error`.
    pub async fn logout(&self) -> bool {
        match self.sessions.sign_out().await {
            Ok(()) => true,
            Err(e) => {
                self.send(SyncEvent::Identity(IdentityTransition::AuthFailed {
                    reason: e.to_string(),
                }));
                false
            }
        }
    }

    pub fn add_bookmark(&self, title: &str, url: &str) {
        self.send(SyncEvent::Command(Command::AddBookmark {
            title: title.to_string(),
            url: url.to_string(),
        }));
    }

    pub fn delete_bookmark(&self, id: &str) {
        self.send(SyncEvent::Command(Command::DeleteBookmark { id: id.to_string() }));
    }

    pub fn current_identity(&self) -> Option<Identity> {
        self.sessions.current_identity()
    }

    pub fn snapshot(&self) -> ViewState {
        self.view.borrow().clone()
    }

    pub fn bookmarks(&self) -> Vec<Bookmark> {
        self.view.borrow().bookmarks.clone()
    }

    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.view.clone()
    }

    /// Waits until the view satisfies `predicate`; `None` if the reconciler is gone.
    pub async fn wait_for<F>(&self, predicate: F) -> Option<ViewState>
    where
        F: FnMut(&ViewState) -> bool,
    {
        let mut rx = self.view.clone();
        let view = rx.wait_for(predicate).await.ok()?.clone();
        Some(view)
    }

    pub fn shutdown(&self) {
        self.send(SyncEvent::Shutdown);
    }

    fn send(&self, event: SyncEvent) {
        if self.queue.send(event).is_err() {
            tracing::warn!("reconciler is not running; event dropped");
        }
    }
}
