//! Change Notifier for Marksync.
//!
//! Implements `ChangeNotifier`: coarse "the collection changed" signals fed
//! from an in-process `ChangeBus` (a `tokio::sync::broadcast` channel the
//! record store publishes to after every successful mutation).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use crate::types::errors::NotifierError;
use crate::types::notification::{ChangeRecord, ChangeSignal, SubscriptionId, Topic};

/// Callback invoked once per delivered signal.
pub type ChangeCallback = Arc<dyn Fn(ChangeSignal) + Send + Sync>;

/// An open notifier channel. Releasing it is the owner's job, see [`Subscription`].
#[derive(Debug, PartialEq, Eq)]
pub struct SubscriptionHandle {
    id: SubscriptionId,
    topic: Topic,
}

impl SubscriptionHandle {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

/// Trait defining change-stream subscription operations.
pub trait ChangeNotifier: Send + Sync {
    /// Opens a channel for `topic`; `callback` runs for every matching mutation.
    fn subscribe(&self, topic: &Topic, callback: ChangeCallback) -> Result<SubscriptionHandle, NotifierError>;
    /// Releases the channel. A second call for the same handle fails with `AlreadyReleased`.
    fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), NotifierError>;
}

/// Publisher side of the change stream.
#[derive(Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeRecord>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes a mutation. Having no listeners is not an error.
    pub fn publish(&self, record: ChangeRecord) {
        let receivers = self.tx.send(record).unwrap_or(0);
        tracing::trace!(receivers, "change published");
    }

    pub fn receiver(&self) -> broadcast::Receiver<ChangeRecord> {
        self.tx.subscribe()
    }

    pub fn listener_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Notifier that forwards `ChangeBus` records to subscriber callbacks.
///
/// Each subscription owns one forwarding task; releasing the subscription
/// aborts it, so no callback runs after `unsubscribe` returns.
pub struct BroadcastNotifier {
    bus: ChangeBus,
    tasks: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
    next_id: AtomicU64,
}

impl BroadcastNotifier {
    pub fn new(bus: ChangeBus) -> Self {
        Self {
            bus,
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Number of subscriptions that have not been released.
    pub fn active_subscriptions(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ChangeNotifier for BroadcastNotifier {
    fn subscribe(&self, topic: &Topic, callback: ChangeCallback) -> Result<SubscriptionHandle, NotifierError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| NotifierError::Unavailable(e.to_string()))?;

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let mut rx = self.bus.receiver();
        let filter = topic.clone();

        let task = runtime.spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(record) => {
                        if filter.matches(&record) {
                            callback(ChangeSignal { subscription: id });
                        }
                    }
                    // Missed records collapse into a single cue; the consumer re-lists anyway.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(subscription = %id, skipped, "change stream lagged");
                        callback(ChangeSignal { subscription: id });
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, task);
        tracing::debug!(subscription = %id, table = %topic.table, "subscribed to changes");

        Ok(SubscriptionHandle {
            id,
            topic: topic.clone(),
        })
    }

    fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<(), NotifierError> {
        let task = self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id)
            .ok_or(NotifierError::AlreadyReleased(handle.id))?;
        task.abort();
        tracing::debug!(subscription = %handle.id, "unsubscribed from changes");
        Ok(())
    }
}

/// Scoped ownership of a [`SubscriptionHandle`].
///
/// `release` closes the channel explicitly; dropping an unreleased guard
/// closes it as well.
pub struct Subscription {
    handle: Option<SubscriptionHandle>,
    notifier: Arc<dyn ChangeNotifier>,
}

impl Subscription {
    pub fn open(
        notifier: Arc<dyn ChangeNotifier>,
        topic: &Topic,
        callback: ChangeCallback,
    ) -> Result<Self, NotifierError> {
        let handle = notifier.subscribe(topic, callback)?;
        Ok(Self {
            handle: Some(handle),
            notifier,
        })
    }

    /// Id of the underlying handle, `None` once released.
    pub fn id(&self) -> Option<SubscriptionId> {
        self.handle.as_ref().map(SubscriptionHandle::id)
    }

    pub fn release(mut self) -> Result<(), NotifierError> {
        match self.handle.take() {
            Some(handle) => self.notifier.unsubscribe(&handle),
            None => Ok(()),
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = self.notifier.unsubscribe(&handle) {
                tracing::warn!(error = %e, "failed to release subscription on drop");
            }
        }
    }
}
