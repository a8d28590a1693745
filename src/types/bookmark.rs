use serde::{Deserialize, Serialize};

/// A saved URL owned by exactly one identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bookmark {
    pub id: String,
    pub url: String,
    pub title: String,
    pub owner_id: String,
    /// Unix timestamp in milliseconds, assigned by the store.
    pub created_at: i64,
}

impl Bookmark {
    /// Title to render; falls back to the url when the title is blank.
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            &self.url
        } else {
            &self.title
        }
    }
}
