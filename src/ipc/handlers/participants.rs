use crate::db::{self, PARTICIPANT_COLUMNS};
use crate::extract::ParticipantRecord;
use crate::ipc::error::{err, no_workspace, ok};
use crate::ipc::types::{AppState, Request};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, OptionalExtension};
use serde_json::json;

const BNSP_CLAUSE: &str = "materi_skema LIKE '%BNSP%'";
const KEMNAKER_CLAUSE: &str = "materi_skema LIKE '%Kemnaker%'";

fn param_id(req: &Request) -> Result<i64, serde_json::Value> {
    req.i64_param("id").ok_or_else(|| err(&req.id, "bad_params", "missing id", None))
}

fn param_record(req: &Request) -> Result<ParticipantRecord, serde_json::Value> {
    let Some(raw) = req.params.get("record") else {
        return Err(err(&req.id, "bad_params", "missing record", None));
    };
    let rec: ParticipantRecord = serde_json::from_value(raw.clone())
        .map_err(|e| err(&req.id, "bad_params", format!("invalid record: {e}"), None))?;
    let rec = rec.normalized();
    if rec.nama_peserta.is_empty() {
        return Err(err(
            &req.id,
            "bad_params",
            "record.nama_peserta must not be empty",
            None,
        ));
    }
    Ok(rec)
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };

    let mut clauses: Vec<String> = Vec::new();
    let mut bind_values: Vec<Value> = Vec::new();

    match req.params.get("filter").and_then(|v| v.as_str()) {
        None | Some("") | Some("all") => {}
        Some("bnsp") => clauses.push(BNSP_CLAUSE.to_string()),
        Some("kemnaker") => clauses.push(KEMNAKER_CLAUSE.to_string()),
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                format!("unknown filter: {other}"),
                Some(json!({ "allowed": ["bnsp", "kemnaker"] })),
            )
        }
    }

    if let Some(term) = req
        .params
        .get("search")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        clauses.push(
            "(nama_peserta LIKE ? OR nama_perusahaan LIKE ? OR materi_skema LIKE ? OR kso_lsp LIKE ?)"
                .to_string(),
        );
        let pattern = format!("%{}%", term);
        for _ in 0..4 {
            bind_values.push(Value::Text(pattern.clone()));
        }
    }

    if let Some(archive_id) = req.i64_param("archiveId") {
        clauses.push("archive_id = ?".to_string());
        bind_values.push(Value::Integer(archive_id));
    }

    let mut sql = format!("SELECT {} FROM participants", PARTICIPANT_COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY no IS NULL, no, id");

    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(params_from_iter(bind_values), db::participant_json)
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(participants) => {
            let count = participants.len();
            ok(
                &req.id,
                json!({ "participants": participants, "count": count }),
            )
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let id = match param_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let row = conn
        .query_row(
            &format!("SELECT {} FROM participants WHERE id = ?", PARTICIPANT_COLUMNS),
            [id],
            db::participant_json,
        )
        .optional();
    match row {
        Ok(Some(participant)) => ok(&req.id, json!({ "participant": participant })),
        Ok(None) => err(&req.id, "not_found", "participant not found", None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let rec = match param_record(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::insert_participant(conn, &rec, None) {
        Ok(id) => ok(&req.id, json!({ "id": id })),
        Err(e) => err(&req.id, "db_insert_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let id = match param_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let rec = match param_record(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match db::update_participant(conn, id, &rec) {
        Ok(0) => err(&req.id, "not_found", "participant not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };
    let id = match param_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match conn.execute("DELETE FROM participants WHERE id = ?", [id]) {
        Ok(0) => err(&req.id, "not_found", "participant not found", None),
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.conn() else {
        return no_workspace(&req.id);
    };

    let sql = format!(
        "SELECT
           COUNT(*),
           COALESCE(SUM(CASE WHEN {} THEN 1 ELSE 0 END), 0),
           COALESCE(SUM(CASE WHEN {} THEN 1 ELSE 0 END), 0)
         FROM participants",
        BNSP_CLAUSE, KEMNAKER_CLAUSE
    );
    let counts = conn.query_row(&sql, [], |r| {
        Ok((r.get::<_, i64>(0)?, r.get::<_, i64>(1)?, r.get::<_, i64>(2)?))
    });
    match counts {
        Ok((total, bnsp, kemnaker)) => ok(
            &req.id,
            json!({ "total": total, "bnsp": bnsp, "kemnaker": kemnaker }),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "participants.list" => Some(handle_list(state, req)),
        "participants.get" => Some(handle_get(state, req)),
        "participants.create" => Some(handle_create(state, req)),
        "participants.update" => Some(handle_update(state, req)),
        "participants.delete" => Some(handle_delete(state, req)),
        "participants.stats" => Some(handle_stats(state, req)),
        _ => None,
    }
}
