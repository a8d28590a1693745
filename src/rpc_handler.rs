//! RPC method handler for the Marksync JSON-RPC protocol.
//!
//! Extracted from `rpc_server.rs` so it can be unit-tested independently.
//! `handle_method` maps each method onto the presentation handle of a
//! running [`App`]; mutations are queued, and their effect shows up in later
//! `bookmark.list` / `view.snapshot` results and in pushed `view` events.

use serde_json::{json, Value};

use crate::app::App;
use crate::types::bookmark::Bookmark;
use crate::types::identity::{AuthProvider, Identity, SignInFlow};

fn bookmark_json(b: &Bookmark) -> Value {
    json!({
        "id": b.id,
        "url": b.url,
        "title": b.title,
        "display_title": b.display_title(),
        "created_at": b.created_at,
    })
}

fn str_param<'a>(params: &'a Value, name: &str) -> Result<&'a str, String> {
    params
        .get(name)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", name))
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    match method {
        "ping" => Ok(json!({"pong": true})),

        // ─── Session ───
        "session.current" => {
            let user = app.sync.current_identity();
            let display_name = user.as_ref().map(|u| u.display_name().to_string());
            Ok(json!({"user": user, "display_name": display_name}))
        }
        "session.login" => {
            let provider = match params.get("provider").and_then(|v| v.as_str()) {
                Some(name) => AuthProvider::parse(name).ok_or_else(|| format!("unknown provider: {}", name))?,
                None => app.settings.auth.default_provider,
            };
            match app.sync.login(provider).await {
                Some(SignInFlow::Redirect { url, state }) => Ok(json!({"redirect": url, "state": state})),
                Some(SignInFlow::Completed) => Ok(json!({"ok": true})),
                None => Err("sign-in failed".to_string()),
            }
        }
        "session.complete" => {
            let state = str_param(params, "state")?;
            let user_id = str_param(params, "user_id")?;
            let email = params.get("email").and_then(|v| v.as_str());
            app.identity_provider
                .complete_sign_in(state, Identity::new(user_id, email))
                .map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "session.logout" => {
            if !app.sync.logout().await {
                return Err("sign-out failed".to_string());
            }
            Ok(json!({"ok": true}))
        }

        // ─── Bookmarks ───
        "bookmark.list" => {
            let items: Vec<Value> = app.sync.bookmarks().iter().map(bookmark_json).collect();
            Ok(json!({"items": items, "count": items.len()}))
        }
        "bookmark.add" => {
            let url = str_param(params, "url")?;
            let title = str_param(params, "title")?;
            if app.sync.current_identity().is_none() {
                return Err("not signed in".to_string());
            }
            app.sync.add_bookmark(title, url);
            Ok(json!({"queued": true}))
        }
        "bookmark.delete" => {
            let id = str_param(params, "id")?;
            if app.sync.current_identity().is_none() {
                return Err("not signed in".to_string());
            }
            app.sync.delete_bookmark(id);
            Ok(json!({"queued": true}))
        }

        // ─── View ───
        "view.snapshot" => serde_json::to_value(app.sync.snapshot()).map_err(|e| e.to_string()),

        _ => Err(format!("unknown method: {}", method)),
    }
}
