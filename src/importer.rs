use crate::config::ImportConfig;
use crate::error::ImportError;
use crate::extract::{extract_records, ParticipantRecord};
use crate::grid::{self, SheetFormat};
use crate::loader::{load_batch, ArchiveMeta, ArchiveUpload, ImportBatch, ImportSummary, SqliteStore};
use crate::mapping::{locate_header_row, map_columns, Field};
use crate::year::detect_year;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

/// Removes the uploaded temp file when dropped, whatever the import outcome.
struct UploadGuard {
    path: PathBuf,
}

impl Drop for UploadGuard {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "upload removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove upload"),
        }
    }
}

/// Result of reading one workbook, before anything is stored.
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub format: SheetFormat,
    pub header_row: usize,
    pub records: Vec<ParticipantRecord>,
}

/// Reads the first sheet and extracts participant records.
pub fn parse_spreadsheet(path: &Path, cfg: &ImportConfig) -> Result<ParsedSheet, ImportError> {
    let sheet = grid::read_first_sheet(path)?;
    debug!(
        sheet = %sheet.sheet_name,
        rows = sheet.grid.height(),
        cols = sheet.grid.width(),
        merged = sheet.merged.len(),
        "sheet loaded"
    );
    let header_row = locate_header_row(&sheet.grid, cfg);
    let map = map_columns(sheet.grid.row(header_row), cfg);
    let records = extract_records(&sheet.grid, header_row, &map, &sheet.merged);
    Ok(ParsedSheet {
        format: sheet.format,
        header_row,
        records,
    })
}

/// Imports the workbook at `path` into the workspace database.
///
/// `path` is the temporary upload and is deleted before returning on every
/// outcome. `original_name` is the client-side file name used for the archive.
pub fn import_spreadsheet(
    conn: &Connection,
    path: &Path,
    original_name: Option<&str>,
    cfg: &ImportConfig,
) -> Result<ImportSummary, ImportError> {
    let _upload = UploadGuard {
        path: path.to_path_buf(),
    };
    let import_id = Uuid::new_v4();
    let _span = info_span!("import", id = %import_id).entered();
    info!(path = %path.display(), "import started");

    let parsed = parse_spreadsheet(path, cfg).inspect_err(|e| {
        error!(error = %e, "import rejected");
    })?;
    let Some(first) = parsed.records.first() else {
        warn!(header_row = parsed.header_row, "no usable rows");
        return Err(ImportError::EmptyResult);
    };

    let year = detect_year(first.text(Field::Pelatihan), first.text(Field::UjikomPraktek));
    let uploaded_at = Utc::now();
    let source_name = original_name
        .map(str::to_string)
        .or_else(|| {
            path.file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_else(|| "upload".to_string());

    let archive = if cfg.archive_uploads {
        let bytes = std::fs::read(path).map_err(|e| ImportError::UnreadableFile(e.to_string()))?;
        Some(ArchiveUpload {
            meta: ArchiveMeta {
                filename: archive_filename(&source_name, uploaded_at),
                original_name: source_name.clone(),
                mime_type: parsed.format.mime_type().to_string(),
                year: year.clone(),
                sha256: format!("{:x}", Sha256::digest(&bytes)),
                uploaded_at,
            },
            bytes,
        })
    } else {
        None
    };

    let batch = ImportBatch {
        source_name,
        year,
        uploaded_at,
        records: parsed.records,
        archive,
    };
    let summary = load_batch(&SqliteStore::new(conn), &batch).inspect_err(|e| {
        error!(error = %e, "import aborted");
    })?;
    info!(
        total = summary.total,
        success = summary.success,
        failed = summary.failed,
        year = %summary.year,
        "import finished"
    );
    Ok(summary)
}

/// `<stem>-<unix millis>.<ext>`, keeping the client's extension.
fn archive_filename(original_name: &str, at: DateTime<Utc>) -> String {
    let p = Path::new(original_name);
    let stem = p
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "upload".to_string());
    match p.extension() {
        Some(ext) => format!("{}-{}.{}", stem, at.timestamp_millis(), ext.to_string_lossy()),
        None => format!("{}-{}", stem, at.timestamp_millis()),
    }
}
