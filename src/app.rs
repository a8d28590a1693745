//! App Core for Marksync.
//!
//! Wires the local backend (SQLite record store, change bus, identity
//! provider) to the session manager and the sync reconciler, and owns the
//! background tasks that drive them.

use std::path::Path;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::database::Database;
use crate::managers::bookmark_store::SqliteRecordStore;
use crate::managers::change_notifier::{BroadcastNotifier, ChangeBus};
use crate::managers::session_manager::SessionManager;
use crate::managers::sync_reconciler::{spawn_identity_forwarder, Reconciler, SyncEvent, SyncHandle};
use crate::services::local_identity::LocalIdentityProvider;
use crate::types::identity::IdentityTransition;
use crate::types::settings::SyncSettings;

pub type AppError = Box<dyn std::error::Error + Send + Sync>;

/// Central application struct holding the backend, the managers and the
/// presentation handle.
pub struct App {
    pub settings: SyncSettings,
    pub db: Arc<Database>,
    pub identity_provider: Arc<LocalIdentityProvider>,
    pub notifier: Arc<BroadcastNotifier>,
    pub sessions: Arc<SessionManager>,
    pub sync: SyncHandle,
    reconciler_task: JoinHandle<()>,
    forwarder_task: JoinHandle<()>,
}

impl App {
    /// Opens the database at `db_path` and starts syncing.
    pub async fn start(settings: SyncSettings, db_path: &Path) -> Result<Self, AppError> {
        let db = Database::open(db_path)?;
        let provider = LocalIdentityProvider::new(&settings.auth.authorize_url);
        Self::start_with(settings, db, provider).await
    }

    /// Starts on an in-memory database; nothing survives the process.
    pub async fn start_in_memory(settings: SyncSettings) -> Result<Self, AppError> {
        let db = Database::open_in_memory()?;
        let provider = LocalIdentityProvider::new(&settings.auth.authorize_url);
        Self::start_with(settings, db, provider).await
    }

    /// Starts on an already opened database and identity provider.
    ///
    /// Identity changes are subscribed to before the initial session is
    /// resolved, so a sign-in racing startup is never lost.
    pub async fn start_with(
        settings: SyncSettings,
        db: Database,
        provider: LocalIdentityProvider,
    ) -> Result<Self, AppError> {
        let db = Arc::new(db);
        let realtime = &settings.realtime;

        let bus = ChangeBus::new(realtime.bus_capacity);
        let store = Arc::new(
            SqliteRecordStore::new(Arc::clone(&db)).with_change_bus(bus.clone(), &realtime.schema, &realtime.table),
        );
        let notifier = Arc::new(BroadcastNotifier::new(bus));
        let identity_provider = Arc::new(provider);
        let sessions = Arc::new(SessionManager::new(
            identity_provider.clone(),
            &settings.auth.redirect_to,
        ));

        let (reconciler, rx) = Reconciler::new(store, notifier.clone(), realtime.topic());
        let queue = reconciler.queue();

        let transitions = sessions.observe_changes();
        match sessions.resolve_initial().await {
            Ok(Some(identity)) => {
                let _ = queue.send(SyncEvent::Identity(IdentityTransition::SignedIn(identity)));
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(error = %e, "could not resolve initial session");
                let _ = queue.send(SyncEvent::Identity(IdentityTransition::AuthFailed {
                    reason: e.to_string(),
                }));
            }
        }

        let forwarder_task = spawn_identity_forwarder(transitions, queue);
        let sync = reconciler.handle(sessions.clone());
        let reconciler_task = tokio::spawn(reconciler.run(rx));

        tracing::info!(channel = %realtime.channel, table = %realtime.table, "marksync started");

        Ok(Self {
            settings,
            db,
            identity_provider,
            notifier,
            sessions,
            sync,
            reconciler_task,
            forwarder_task,
        })
    }

    /// Stops the reconciler (releasing its subscription) and the identity forwarder.
    pub async fn shutdown(self) {
        self.sync.shutdown();
        if let Err(e) = self.reconciler_task.await {
            tracing::warn!(error = %e, "reconciler task ended abnormally");
        }
        self.forwarder_task.abort();
        tracing::info!("marksync stopped");
    }
}
