use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, OptionalExtension};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_years(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let mut stmt = match conn.prepare("SELECT DISTINCT year FROM archives ORDER BY year DESC") {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let years = stmt
        .query_map([], |r| r.get::<_, String>(0))
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match years {
        Ok(years) => ok(&req.id, json!({ "years": years })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };

    let mut sql = String::from(
        "SELECT a.id, a.filename, a.original_name, a.file_size, a.mime_type, a.year,
                a.sha256, a.uploaded_at,
                (SELECT COUNT(*) FROM participants p WHERE p.archive_id = a.id)
         FROM archives a",
    );
    let mut bind_values: Vec<Value> = Vec::new();
    if let Some(year) = req.str_param("year") {
        sql.push_str(" WHERE a.year = ?");
        bind_values.push(Value::Text(year.to_string()));
    }
    sql.push_str(" ORDER BY a.uploaded_at DESC, a.id DESC");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params_from_iter(bind_values), |row| {
            let id: i64 = row.get(0)?;
            let filename: String = row.get(1)?;
            let original_name: String = row.get(2)?;
            let file_size: i64 = row.get(3)?;
            let mime_type: String = row.get(4)?;
            let year: String = row.get(5)?;
            let sha256: Option<String> = row.get(6)?;
            let uploaded_at: String = row.get(7)?;
            let participant_count: i64 = row.get(8)?;
            Ok(json!({
                "id": id,
                "filename": filename,
                "originalName": original_name,
                "fileSize": file_size,
                "mimeType": mime_type,
                "year": year,
                "sha256": sha256,
                "uploadedAt": uploaded_at,
                "participantCount": participant_count
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(archives) => ok(&req.id, json!({ "archives": archives })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_export(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let Some(id) = req.i64_param("id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };
    let Some(out_path) = req.str_param("outPath").map(PathBuf::from) else {
        return err(&req.id, "bad_params", "missing outPath", None);
    };

    let payload: Option<(String, Vec<u8>)> = match conn
        .query_row(
            "SELECT original_name, file_data FROM archives WHERE id = ?",
            [id],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some((original_name, bytes)) = payload else {
        return err(&req.id, "not_found", "archive not found", None);
    };

    if let Some(parent) = out_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(&req.id, "io_failed", e.to_string(), None);
        }
    }
    if let Err(e) = std::fs::write(&out_path, &bytes) {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path.to_string_lossy() })),
        );
    }

    ok(
        &req.id,
        json!({
            "path": out_path.to_string_lossy(),
            "originalName": original_name,
            "bytes": bytes.len()
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let Some(id) = req.i64_param("id") else {
        return err(&req.id, "bad_params", "missing id", None);
    };

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let linked: i64 = match tx.query_row(
        "SELECT COUNT(*) FROM participants WHERE archive_id = ?",
        [id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_query_failed", e.to_string(), None);
        }
    };
    match tx.execute("DELETE FROM archives WHERE id = ?", [id]) {
        Ok(0) => {
            let _ = tx.rollback();
            return err(&req.id, "not_found", "archive not found", None);
        }
        Ok(_) => {}
        Err(e) => {
            let _ = tx.rollback();
            return err(&req.id, "db_delete_failed", e.to_string(), None);
        }
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    info!(archive_id = id, participants = linked, "archive deleted");
    ok(&req.id, json!({ "deletedParticipants": linked }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "archives.years" => Some(handle_years(state, req)),
        "archives.list" => Some(handle_list(state, req)),
        "archives.export" => Some(handle_export(state, req)),
        "archives.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
