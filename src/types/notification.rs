use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of mutation reported by the change stream.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// Which event kinds a subscription is interested in (`*` on the wire).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventFilter {
    All,
    Only(ChangeKind),
}

impl EventFilter {
    pub fn accepts(&self, kind: ChangeKind) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Only(k) => *k == kind,
        }
    }
}

/// A subscribable slice of the change stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Topic {
    pub schema: String,
    pub table: String,
    pub events: EventFilter,
}

impl Topic {
    /// All mutations of `schema.table`.
    pub fn table(schema: &str, table: &str) -> Self {
        Self {
            schema: schema.to_string(),
            table: table.to_string(),
            events: EventFilter::All,
        }
    }

    pub fn matches(&self, record: &ChangeRecord) -> bool {
        self.schema == record.schema && self.table == record.table && self.events.accepts(record.kind)
    }
}

/// A raw mutation published by the backend. Carries no row data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeRecord {
    pub schema: String,
    pub table: String,
    pub kind: ChangeKind,
}

/// Identifier of one open notifier subscription.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// "Something changed" cue delivered to a subscriber.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeSignal {
    pub subscription: SubscriptionId,
}
