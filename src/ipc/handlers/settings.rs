use crate::config::ImportConfig;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn config_json(cfg: &ImportConfig) -> serde_json::Value {
    serde_json::to_value(cfg).unwrap_or_else(|_| json!({}))
}

fn handle_import_config_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    match ImportConfig::load(conn) {
        Ok(cfg) => ok(&req.id, json!({ "config": config_json(&cfg) })),
        Err(e) => err(&req.id, "db_query_failed", format!("{e:#}"), None),
    }
}

fn handle_import_config_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match ImportConfig::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", format!("{e:#}"), None),
    };
    if let Err(msg) = current.apply_patch(patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = current.save(conn) {
        return err(&req.id, "db_update_failed", format!("{e:#}"), None);
    }
    ok(&req.id, json!({ "config": config_json(&current) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "import.config.get" => Some(handle_import_config_get(state, req)),
        "import.config.update" => Some(handle_import_config_update(state, req)),
        _ => None,
    }
}
