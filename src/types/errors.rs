use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::notification::SubscriptionId;

// === StoreError ===

/// Errors returned by the remote record collection.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// Transport or backend failure; the operation did not take effect.
    #[error("Record store unavailable: {0}")]
    Unavailable(String),
    /// The store refused the record as malformed.
    #[error("Record validation failed: {0}")]
    Validation(String),
}

// === NotifierError ===

/// Errors related to change-notification subscriptions.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NotifierError {
    /// The handle was already released.
    #[error("Subscription already released: {0}")]
    AlreadyReleased(SubscriptionId),
    /// The change stream cannot be reached.
    #[error("Change notifier unavailable: {0}")]
    Unavailable(String),
}

// === AuthError ===

/// Errors related to the identity provider.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AuthError {
    /// The provider refused the sign-in or sign-out.
    #[error("Authentication rejected: {0}")]
    Rejected(String),
    /// The provider could not be reached.
    #[error("Identity provider unavailable: {0}")]
    Unavailable(String),
    /// A redirect callback did not match any pending sign-in.
    #[error("Invalid sign-in state: {0}")]
    InvalidState(String),
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    #[error("Settings I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize settings.
    #[error("Settings serialization error: {0}")]
    SerializationError(String),
    /// The provided settings key is invalid.
    #[error("Invalid settings key: {0}")]
    InvalidKey(String),
    /// The provided settings value is invalid.
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

// === SyncError ===

/// Failures recorded by the reconciler on its diagnostic channel.
///
/// These never escape into the presentation layer as `Err`; they are
/// attached to the view state instead.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum SyncError {
    #[error("Authentication failed: {0}")]
    AuthFailure(String),
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Live updates are off; the view only changes after local commands.
    #[error("Change stream unavailable: {0}")]
    ChangeStreamUnavailable(String),
}

impl From<NotifierError> for SyncError {
    fn from(err: NotifierError) -> Self {
        SyncError::ChangeStreamUnavailable(err.to_string())
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => SyncError::StoreUnavailable(msg),
            StoreError::Validation(msg) => SyncError::ValidationError(msg),
        }
    }
}

impl From<AuthError> for SyncError {
    fn from(err: AuthError) -> Self {
        SyncError::AuthFailure(err.to_string())
    }
}
