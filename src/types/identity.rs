use std::fmt;

use serde::{Deserialize, Serialize};

/// An authenticated user: opaque handle plus display attributes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Identity {
    pub id: String,
    pub email: Option<String>,
}

impl Identity {
    pub fn new(id: impl Into<String>, email: Option<&str>) -> Self {
        Self {
            id: id.into(),
            email: email.map(str::to_string),
        }
    }

    /// Returns the email when known, otherwise the raw user id.
    pub fn display_name(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.id)
    }
}

/// A change in authentication state, in the order it actually happened.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IdentityTransition {
    SignedIn(Identity),
    SignedOut,
    /// A sign-in or sign-out attempt was rejected. The session is unchanged.
    AuthFailed { reason: String },
}

/// Supported OAuth identity providers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AuthProvider {
    Google,
    GitHub,
}

impl AuthProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthProvider::Google => "google",
            AuthProvider::GitHub => "github",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "google" => Some(AuthProvider::Google),
            "github" => Some(AuthProvider::GitHub),
            _ => None,
        }
    }
}

impl fmt::Display for AuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for starting a redirect-based sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignInRequest {
    pub provider: AuthProvider,
    pub redirect_to: String,
}

/// What the caller has to do after initiating a sign-in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SignInFlow {
    /// Send the user to `url`; the provider calls back with `state`.
    Redirect { url: String, state: String },
    /// The provider finished without a redirect.
    Completed,
}
