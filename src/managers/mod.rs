// Marksync state managers
// Managers own the stateful pieces: session, bookmark store, change notifications and the reconciler.

pub mod bookmark_store;
pub mod change_notifier;
pub mod session_manager;
pub mod sync_reconciler;
