//! Session Manager for Marksync.
//!
//! Owns the current identity and relays sign-in/sign-out transitions from an
//! [`IdentityProvider`]. Completion of a sign-in or sign-out is observed via
//! [`SessionManager::observe_changes`], never via the initiating call.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::types::errors::AuthError;
use crate::types::identity::{AuthProvider, Identity, IdentityTransition, SignInFlow, SignInRequest};

/// Boundary to the hosted identity service.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The session persisted by the provider, if any.
    async fn current_session(&self) -> Result<Option<Identity>, AuthError>;
    /// Starts a sign-in. Success is reported later as `SignedIn`.
    async fn sign_in(&self, request: &SignInRequest) -> Result<SignInFlow, AuthError>;
    /// Ends the session. Success is reported later as `SignedOut`.
    async fn sign_out(&self) -> Result<(), AuthError>;
    /// Live transitions in the order they happened. Never coalesced.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<IdentityTransition>;
}

/// Session manager wrapping an identity provider.
pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    redirect_to: String,
    current: Arc<watch::Sender<Option<Identity>>>,
}

impl SessionManager {
    /// Creates a new SessionManager; sign-ins redirect back to `redirect_to`.
    pub fn new(provider: Arc<dyn IdentityProvider>, redirect_to: &str) -> Self {
        let (current, _) = watch::channel(None);
        Self {
            provider,
            redirect_to: redirect_to.to_string(),
            current: Arc::new(current),
        }
    }

    /// Fetches the provider's session once at startup.
    pub async fn resolve_initial(&self) -> Result<Option<Identity>, AuthError> {
        let session = self.provider.current_session().await?;
        tracing::info!(
            user = session.as_ref().map(|i| i.id.as_str()).unwrap_or("-"),
            "initial session resolved"
        );
        self.current.send_replace(session.clone());
        Ok(session)
    }

    /// Latest known identity. Never waits on the provider.
    pub fn current_identity(&self) -> Option<Identity> {
        self.current.borrow().clone()
    }

    /// Receiver that tracks the current identity.
    pub fn watch_identity(&self) -> watch::Receiver<Option<Identity>> {
        self.current.subscribe()
    }

    /// Opens a new ordered stream of transitions.
    ///
    /// Transitions that happened before this call are not replayed.
    pub fn observe_changes(&self) -> IdentityStream {
        IdentityStream {
            rx: self.provider.subscribe(),
            current: Arc::clone(&self.current),
        }
    }

    pub async fn sign_in(&self, provider: AuthProvider) -> Result<SignInFlow, AuthError> {
        let request = SignInRequest {
            provider,
            redirect_to: self.redirect_to.clone(),
        };
        self.provider.sign_in(&request).await.inspect_err(|e| {
            tracing::warn!(provider = %provider, error = %e, "sign-in failed");
        })
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.provider.sign_out().await.inspect_err(|e| {
            tracing::warn!(error = %e, "sign-out failed");
        })
    }
}

/// Ordered stream of identity transitions.
///
/// Yielding a transition also updates the owning manager's current identity,
/// so `current_identity()` never runs ahead of what consumers have seen.
pub struct IdentityStream {
    rx: mpsc::UnboundedReceiver<IdentityTransition>,
    current: Arc<watch::Sender<Option<Identity>>>,
}

impl IdentityStream {
    /// Next transition, or `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<IdentityTransition> {
        let transition = self.rx.recv().await?;
        match &transition {
            IdentityTransition::SignedIn(identity) => {
                self.current.send_replace(Some(identity.clone()));
            }
            IdentityTransition::SignedOut => {
                self.current.send_replace(None);
            }
            IdentityTransition::AuthFailed { .. } => {}
        }
        Some(transition)
    }
}
