//! Local identity provider for Marksync.
//!
//! A self-contained redirect-flow provider: `sign_in` hands out an authorize
//! URL carrying a one-time `state`, and the redirect callback completes the
//! flow through [`LocalIdentityProvider::complete_sign_in`]. Used by the RPC
//! binary and by tests in place of a hosted OAuth service.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::managers::session_manager::IdentityProvider;
use crate::types::errors::AuthError;
use crate::types::identity::{Identity, IdentityTransition, SignInFlow, SignInRequest};

/// Sign-ins awaiting their callback; beyond this the oldest is forgotten.
pub const MAX_PENDING_SIGN_INS: usize = 8;

struct ProviderState {
    session: Option<Identity>,
    /// Oldest first.
    pending: VecDeque<(String, SignInRequest)>,
    subscribers: Vec<mpsc::UnboundedSender<IdentityTransition>>,
    offline: bool,
    reject_next: Option<String>,
}

impl ProviderState {
    /// Delivers to every live subscriber, dropping the closed ones.
    fn emit(&mut self, transition: IdentityTransition) {
        self.subscribers.retain(|tx| tx.send(transition.clone()).is_ok());
    }

    fn check_online(&self) -> Result<(), AuthError> {
        if self.offline {
            return Err(AuthError::Unavailable("identity provider is offline".to_string()));
        }
        Ok(())
    }
}

/// In-process identity provider with an OAuth-style redirect flow.
pub struct LocalIdentityProvider {
    authorize_url: String,
    state: Mutex<ProviderState>,
}

impl LocalIdentityProvider {
    pub fn new(authorize_url: &str) -> Self {
        Self {
            authorize_url: authorize_url.to_string(),
            state: Mutex::new(ProviderState {
                session: None,
                pending: VecDeque::new(),
                subscribers: Vec::new(),
                offline: false,
                reject_next: None,
            }),
        }
    }

    /// Starts with `identity` already signed in, as after a previous run.
    pub fn with_session(self, identity: Identity) -> Self {
        self.lock().session = Some(identity);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProviderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Redirect callback: finishes the sign-in started with `state`.
    ///
    /// Signing in while another account is active replaces that session.
    pub fn complete_sign_in(&self, state: &str, identity: Identity) -> Result<(), AuthError> {
        let mut inner = self.lock();
        inner.check_online()?;
        let Some(index) = inner.pending.iter().position(|(s, _)| s == state) else {
            return Err(AuthError::InvalidState(state.to_string()));
        };
        inner.pending.remove(index);
        tracing::info!(user = %identity.id, "sign-in completed");
        inner.session = Some(identity.clone());
        inner.emit(IdentityTransition::SignedIn(identity));
        Ok(())
    }

    /// Ends the session without a user action.
    pub fn expire_session(&self) {
        let mut inner = self.lock();
        if inner.session.take().is_some() {
            tracing::info!("session expired");
            inner.emit(IdentityTransition::SignedOut);
        }
    }

    /// While offline every call fails with `Unavailable` and nothing is emitted.
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Makes the next `sign_in` or `sign_out` fail with `Rejected(reason)`.
    pub fn reject_next(&self, reason: &str) {
        self.lock().reject_next = Some(reason.to_string());
    }

    /// Number of sign-ins awaiting their redirect callback.
    pub fn pending_sign_ins(&self) -> usize {
        self.lock().pending.len()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn current_session(&self) -> Result<Option<Identity>, AuthError> {
        let inner = self.lock();
        inner.check_online()?;
        Ok(inner.session.clone())
    }

    async fn sign_in(&self, request: &SignInRequest) -> Result<SignInFlow, AuthError> {
        let mut inner = self.lock();
        inner.check_online()?;
        if let Some(reason) = inner.reject_next.take() {
            return Err(AuthError::Rejected(reason));
        }

        let state = Uuid::new_v4().simple().to_string();
        let url = format!(
            "{}?provider={}&redirect_to={}&state={}",
            self.authorize_url, request.provider, request.redirect_to, state
        );
        if inner.pending.len() >= MAX_PENDING_SIGN_INS {
            if let Some((expired, _)) = inner.pending.pop_front() {
                tracing::debug!(state = %expired, "abandoned sign-in dropped");
            }
        }
        inner.pending.push_back((state.clone(), request.clone()));
        tracing::debug!(provider = %request.provider, "sign-in redirect issued");
        Ok(SignInFlow::Redirect { url, state })
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut inner = self.lock();
        inner.check_online()?;
        if let Some(reason) = inner.reject_next.take() {
            return Err(AuthError::Rejected(reason));
        }
        inner.session = None;
        inner.emit(IdentityTransition::SignedOut);
        Ok(())
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<IdentityTransition> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }
}
