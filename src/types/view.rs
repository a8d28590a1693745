use serde::{Deserialize, Serialize};

use super::bookmark::Bookmark;
use super::errors::SyncError;
use super::identity::Identity;

/// Everything the presentation layer renders, owned by the reconciler.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ViewState {
    pub identity: Option<Identity>,
    /// Newest first.
    pub bookmarks: Vec<Bookmark>,
    /// True while the latest issued refresh has not come back.
    pub refreshing: bool,
    pub last_error: Option<SyncError>,
}

impl ViewState {
    pub fn is_signed_in(&self) -> bool {
        self.identity.is_some()
    }

    pub fn saved_count(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn contains(&self, bookmark_id: &str) -> bool {
        self.bookmarks.iter().any(|b| b.id == bookmark_id)
    }
}
