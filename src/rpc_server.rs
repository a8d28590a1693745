//! Marksync RPC Server: JSON-RPC over stdin/stdout for a UI shell.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! Request:  {"id":1, "method":"bookmark.add", "params":{"url":"...","title":"..."}}
//! Response: {"id":1, "result":{...}} or {"id":1, "error":"..."}
//! Push:     {"event":"view", "state":{...}} whenever the view changes.

use std::io::{self, Write};

use marksync::app::App;
use marksync::rpc_handler::handle_method;
use marksync::services::logging::init_tracing;
use marksync::services::settings_engine::{SettingsEngine, SettingsEngineTrait};

use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};

fn emit(value: &Value) {
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", value);
    let _ = stdout.flush();
}

#[tokio::main]
async fn main() {
    let mut engine = SettingsEngine::new(std::env::var("MARKSYNC_CONFIG").ok());
    if let Err(e) = engine.load() {
        eprintln!("marksync: {}; falling back to defaults", e);
    }
    engine.apply_env_overrides();
    let settings = engine.get_settings().clone();
    init_tracing(&settings.logging);

    let db_path = engine.database_path();
    if let Some(dir) = db_path.parent() {
        if let Err(e) = std::fs::create_dir_all(dir) {
            tracing::error!(dir = %dir.display(), error = %e, "cannot create data directory");
            std::process::exit(1);
        }
    }

    let app = match App::start(settings, &db_path).await {
        Ok(app) => app,
        Err(e) => {
            tracing::error!(error = %e, "failed to start");
            std::process::exit(1);
        }
    };

    emit(&json!({"event":"ready","version":env!("CARGO_PKG_VERSION")}));

    let mut view = app.sync.watch();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let line = match line {
                    Ok(Some(l)) => l,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "stdin closed");
                        break;
                    }
                };
                if line.trim().is_empty() { continue; }

                let req: Value = match serde_json::from_str(&line) {
                    Ok(v) => v,
                    Err(e) => {
                        emit(&json!({"id":null,"error":format!("parse error: {}",e)}));
                        continue;
                    }
                };

                let id = req.get("id").cloned().unwrap_or(Value::Null);
                let method = req.get("method").and_then(|v| v.as_str()).unwrap_or("");
                let params = req.get("params").cloned().unwrap_or(json!({}));

                let response = match handle_method(&app, method, &params).await {
                    Ok(val) => json!({"id": id, "result": val}),
                    Err(err) => json!({"id": id, "error": err}),
                };
                emit(&response);
            }
            changed = view.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = serde_json::to_value(&*view.borrow_and_update()).unwrap_or(Value::Null);
                emit(&json!({"event":"view","state":state}));
            }
        }
    }

    app.shutdown().await;
}
