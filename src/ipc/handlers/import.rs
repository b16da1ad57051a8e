use crate::config::ImportConfig;
use crate::importer;
use crate::ipc::error::{err, import_failed, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use crate::loader::ImportSummary;
use std::path::PathBuf;
use tracing::warn;

fn summary_json(summary: &ImportSummary) -> serde_json::Value {
    serde_json::to_value(summary).unwrap_or_else(|_| serde_json::json!({}))
}

fn handle_import(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(path) = req.str_param("path").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };
    let original_name = req.str_param("originalName");

    let Some(conn) = state.conn() else {
        // The upload is still ours to clean up.
        if let Err(e) = std::fs::remove_file(&path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "failed to remove upload");
            }
        }
        return no_workspace(&req.id);
    };

    let cfg = match ImportConfig::load(conn) {
        Ok(c) => c,
        Err(e) => {
            let _ = std::fs::remove_file(&path);
            return err(&req.id, "db_query_failed", format!("{e:#}"), None);
        }
    };

    match importer::import_spreadsheet(conn, &path, original_name, &cfg) {
        Ok(summary) => ok(&req.id, summary_json(&summary)),
        Err(e) => import_failed(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "participants.import" => Some(handle_import(state, req)),
        _ => None,
    }
}
