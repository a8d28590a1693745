use serde::{Deserialize, Serialize};

use super::identity::AuthProvider;
use super::notification::Topic;

/// Top-level settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SyncSettings {
    pub general: GeneralSettings,
    pub auth: AuthSettings,
    pub realtime: RealtimeSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Storage location settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneralSettings {
    /// Overrides the platform data directory when set.
    pub data_dir: Option<String>,
    pub database_file: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: None,
            database_file: "marksync.db".to_string(),
        }
    }
}

/// Identity provider settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthSettings {
    pub default_provider: AuthProvider,
    /// Where the provider sends the user after a successful sign-in.
    pub redirect_to: String,
    pub authorize_url: String,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            default_provider: AuthProvider::Google,
            redirect_to: "http://localhost:3000".to_string(),
            authorize_url: "http://localhost:3000/auth/v1/authorize".to_string(),
        }
    }
}

/// Change stream settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RealtimeSettings {
    pub channel: String,
    pub schema: String,
    pub table: String,
    pub bus_capacity: usize,
}

impl RealtimeSettings {
    /// The topic the reconciler subscribes to.
    pub fn topic(&self) -> Topic {
        Topic::table(&self.schema, &self.table)
    }
}

impl Default for RealtimeSettings {
    fn default() -> Self {
        Self {
            channel: "bookmarks-changes".to_string(),
            schema: "public".to_string(),
            table: "bookmarks".to_string(),
            bus_capacity: 256,
        }
    }
}

/// Diagnostic output settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSettings {
    /// `tracing` env-filter directive, e.g. `info` or `marksync=debug`.
    pub filter: String,
    #[serde(default = "default_true")]
    pub ansi: bool,
}

fn default_true() -> bool {
    true
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}
