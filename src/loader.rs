//! Transactional bulk insert with per-row failure isolation.

use crate::db;
use crate::error::ImportError;
use crate::extract::ParticipantRecord;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum StoreError {
    /// The row itself was rejected; the transaction is still usable.
    #[error("{0}")]
    Row(String),

    #[error("{0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        let row_level = match &e {
            rusqlite::Error::SqliteFailure(f, _) => matches!(
                f.code,
                ErrorCode::ConstraintViolation | ErrorCode::TypeMismatch | ErrorCode::TooBig
            ),
            rusqlite::Error::ToSqlConversionFailure(_) => true,
            _ => false,
        };
        if row_level {
            Self::Row(e.to_string())
        } else {
            Self::Unavailable(e.to_string())
        }
    }
}

#[derive(Debug, Clone)]
pub struct ArchiveMeta {
    pub filename: String,
    pub original_name: String,
    pub mime_type: String,
    pub year: String,
    pub sha256: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct ArchiveUpload {
    pub meta: ArchiveMeta,
    pub bytes: Vec<u8>,
}

/// Storage operations the loader needs.
pub trait ParticipantStore {
    fn insert_participant(
        &self,
        record: &ParticipantRecord,
        archive_id: Option<i64>,
    ) -> Result<i64, StoreError>;

    fn insert_archive(&self, meta: &ArchiveMeta, bytes: &[u8]) -> Result<i64, StoreError>;

    /// Runs `f` in one transaction, committing on `Ok` and rolling back on `Err`.
    fn run_in_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>;
}

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl ParticipantStore for SqliteStore<'_> {
    fn insert_participant(
        &self,
        record: &ParticipantRecord,
        archive_id: Option<i64>,
    ) -> Result<i64, StoreError> {
        Ok(db::insert_participant(self.conn, record, archive_id)?)
    }

    fn insert_archive(&self, meta: &ArchiveMeta, bytes: &[u8]) -> Result<i64, StoreError> {
        self.conn.execute(
            "INSERT INTO archives(
               filename,
               original_name,
               file_data,
               file_size,
               mime_type,
               year,
               sha256,
               uploaded_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                meta.filename,
                meta.original_name,
                bytes,
                bytes.len() as i64,
                meta.mime_type,
                meta.year,
                meta.sha256,
                meta.uploaded_at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn run_in_transaction<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&Self) -> Result<T, StoreError>,
    {
        let tx = self
            .conn
            .unchecked_transaction()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        match f(self) {
            Ok(v) => {
                tx.commit()
                    .map_err(|e| StoreError::Unavailable(e.to_string()))?;
                Ok(v)
            }
            Err(e) => {
                let _ = tx.rollback();
                Err(e)
            }
        }
    }
}

/// Records extracted from one upload, with provenance.
#[derive(Debug, Clone)]
pub struct ImportBatch {
    pub source_name: String,
    pub year: String,
    pub uploaded_at: DateTime<Utc>,
    pub records: Vec<ParticipantRecord>,
    pub archive: Option<ArchiveUpload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    pub row: String,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub year: String,
    pub archive_id: Option<i64>,
    pub errors: Vec<RowError>,
}

/// Persists a batch. Rejected rows are tallied in the summary; only a
/// storage-level failure aborts, and then nothing from the batch is kept.
pub fn load_batch<S: ParticipantStore>(
    store: &S,
    batch: &ImportBatch,
) -> Result<ImportSummary, ImportError> {
    if batch.records.is_empty() {
        return Err(ImportError::EmptyResult);
    }

    let (archive_id, success, errors) = store
        .run_in_transaction(|s| {
            let archive_id = match &batch.archive {
                Some(a) => Some(s.insert_archive(&a.meta, &a.bytes)?),
                None => None,
            };
            let mut success = 0usize;
            let mut errors: Vec<RowError> = Vec::new();
            for rec in &batch.records {
                match s.insert_participant(rec, archive_id) {
                    Ok(_) => success += 1,
                    Err(StoreError::Row(msg)) => {
                        warn!(row = %rec.key(), error = %msg, "participant row rejected");
                        errors.push(RowError {
                            row: rec.key(),
                            error: msg,
                        });
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok((archive_id, success, errors))
        })
        .map_err(|e| ImportError::StorageUnavailable(e.to_string()))?;

    info!(
        source = %batch.source_name,
        total = batch.records.len(),
        success,
        failed = errors.len(),
        "batch persisted"
    );

    Ok(ImportSummary {
        total: batch.records.len(),
        success,
        failed: errors.len(),
        year: batch.year.clone(),
        archive_id,
        errors,
    })
}
