use crate::extract::ParticipantRecord;
use rusqlite::{params, Connection};
use std::path::Path;

pub const DB_FILE: &str = "peserta.sqlite3";

pub const PARTICIPANT_COLUMNS: &str = "id, archive_id, no, nama_peserta, nama_perusahaan,
    pelatihan, ujikom_praktek, materi_skema, kso_lsp, skl_sertifikat, tanggal_invoice,
    sertifikat_dari_kso, sertifikat_diterima_kandel, sertifikat_diterima_peserta,
    created_at, updated_at";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS archives(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            filename TEXT NOT NULL,
            original_name TEXT NOT NULL,
            file_data BLOB NOT NULL,
            file_size INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            year TEXT NOT NULL,
            sha256 TEXT,
            uploaded_at TEXT NOT NULL
        )",
        [],
    )?;
    ensure_archives_sha256(conn)?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_archives_year ON archives(year)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS participants(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            archive_id INTEGER,
            no INTEGER,
            nama_peserta TEXT NOT NULL,
            nama_perusahaan TEXT NOT NULL DEFAULT '',
            pelatihan TEXT NOT NULL DEFAULT '',
            ujikom_praktek TEXT NOT NULL DEFAULT '',
            materi_skema TEXT NOT NULL DEFAULT '',
            kso_lsp TEXT NOT NULL DEFAULT '',
            skl_sertifikat TEXT NOT NULL DEFAULT '',
            tanggal_invoice TEXT NOT NULL DEFAULT '',
            sertifikat_dari_kso TEXT NOT NULL DEFAULT '',
            sertifikat_diterima_kandel TEXT NOT NULL DEFAULT '',
            sertifikat_diterima_peserta TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(archive_id) REFERENCES archives(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participants_archive ON participants(archive_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_participants_no ON participants(no)",
        [],
    )?;

    Ok(())
}

// Workspaces created before checksums were recorded have no sha256 column.
fn ensure_archives_sha256(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "archives", "sha256")? {
        return Ok(());
    }
    conn.execute("ALTER TABLE archives ADD COLUMN sha256 TEXT", [])?;
    Ok(())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Inserts one participant and returns its rowid. Absent fields are stored
/// as empty strings.
pub fn insert_participant(
    conn: &Connection,
    rec: &ParticipantRecord,
    archive_id: Option<i64>,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO participants(
           archive_id,
           no,
           nama_peserta,
           nama_perusahaan,
           pelatihan,
           ujikom_praktek,
           materi_skema,
           kso_lsp,
           skl_sertifikat,
           tanggal_invoice,
           sertifikat_dari_kso,
           sertifikat_diterima_kandel,
           sertifikat_diterima_peserta,
           created_at,
           updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
           strftime('%Y-%m-%dT%H:%M:%SZ','now'),
           strftime('%Y-%m-%dT%H:%M:%SZ','now'))",
        params![
            archive_id,
            rec.no,
            rec.nama_peserta,
            rec.nama_perusahaan.as_deref().unwrap_or(""),
            rec.pelatihan.as_deref().unwrap_or(""),
            rec.ujikom_praktek.as_deref().unwrap_or(""),
            rec.materi_skema.as_deref().unwrap_or(""),
            rec.kso_lsp.as_deref().unwrap_or(""),
            rec.skl_sertifikat.as_deref().unwrap_or(""),
            rec.tanggal_invoice.as_deref().unwrap_or(""),
            rec.sertifikat_dari_kso.as_deref().unwrap_or(""),
            rec.sertifikat_diterima_kandel.as_deref().unwrap_or(""),
            rec.sertifikat_diterima_peserta.as_deref().unwrap_or(""),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Replaces every canonical field of a participant. Returns rows changed.
pub fn update_participant(
    conn: &Connection,
    id: i64,
    rec: &ParticipantRecord,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE participants SET
           no = ?,
           nama_peserta = ?,
           nama_perusahaan = ?,
           pelatihan = ?,
           ujikom_praktek = ?,
           materi_skema = ?,
           kso_lsp = ?,
           skl_sertifikat = ?,
           tanggal_invoice = ?,
           sertifikat_dari_kso = ?,
           sertifikat_diterima_kandel = ?,
           sertifikat_diterima_peserta = ?,
           updated_at = strftime('%Y-%m-%dT%H:%M:%SZ','now')
         WHERE id = ?",
        params![
            rec.no,
            rec.nama_peserta,
            rec.nama_perusahaan.as_deref().unwrap_or(""),
            rec.pelatihan.as_deref().unwrap_or(""),
            rec.ujikom_praktek.as_deref().unwrap_or(""),
            rec.materi_skema.as_deref().unwrap_or(""),
            rec.kso_lsp.as_deref().unwrap_or(""),
            rec.skl_sertifikat.as_deref().unwrap_or(""),
            rec.tanggal_invoice.as_deref().unwrap_or(""),
            rec.sertifikat_dari_kso.as_deref().unwrap_or(""),
            rec.sertifikat_diterima_kandel.as_deref().unwrap_or(""),
            rec.sertifikat_diterima_peserta.as_deref().unwrap_or(""),
            id,
        ],
    )
}

/// Reads a participant row selected with [`PARTICIPANT_COLUMNS`].
pub fn participant_json(row: &rusqlite::Row<'_>) -> rusqlite::Result<serde_json::Value> {
    let id: i64 = row.get(0)?;
    let archive_id: Option<i64> = row.get(1)?;
    let no: Option<i64> = row.get(2)?;
    let mut obj = serde_json::Map::new();
    obj.insert("id".into(), id.into());
    obj.insert("archive_id".into(), archive_id.into());
    obj.insert("no".into(), no.into());
    let text_cols = [
        "nama_peserta",
        "nama_perusahaan",
        "pelatihan",
        "ujikom_praktek",
        "materi_skema",
        "kso_lsp",
        "skl_sertifikat",
        "tanggal_invoice",
        "sertifikat_dari_kso",
        "sertifikat_diterima_kandel",
        "sertifikat_diterima_peserta",
        "created_at",
        "updated_at",
    ];
    for (i, name) in text_cols.iter().enumerate() {
        let v: String = row.get(3 + i)?;
        obj.insert((*name).into(), v.into());
    }
    Ok(serde_json::Value::Object(obj))
}
