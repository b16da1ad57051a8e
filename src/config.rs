use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const IMPORT_CONFIG_KEY: &str = "import.config";

/// Per-workspace knobs for the spreadsheet heuristics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportConfig {
    /// Rows examined from the top when looking for the header.
    pub header_scan_rows: usize,
    /// Header row used when no scanned row looks like a header.
    pub default_header_row: usize,
    /// Column assumed to hold `pelatihan` when no header names it.
    pub fallback_pelatihan_col: Option<usize>,
    /// Column assumed to hold `ujikom_praktek` alongside the above.
    pub fallback_ujikom_col: Option<usize>,
    /// Keep a copy of each uploaded workbook in the `archives` table.
    pub archive_uploads: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            header_scan_rows: 5,
            default_header_row: 1,
            fallback_pelatihan_col: Some(3),
            fallback_ujikom_col: Some(4),
            archive_uploads: true,
        }
    }
}

impl ImportConfig {
    pub fn load(conn: &Connection) -> anyhow::Result<Self> {
        let raw: Option<String> = conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?",
                [IMPORT_CONFIG_KEY],
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(serde_json::from_str(&text)?),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, conn: &Connection) -> anyhow::Result<()> {
        let text = serde_json::to_string(self)?;
        conn.execute(
            "INSERT INTO settings(key, value_json) VALUES(?, ?)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
            (IMPORT_CONFIG_KEY, &text),
        )?;
        Ok(())
    }

    /// Applies a camelCase JSON patch, rejecting unknown keys and bad ranges.
    pub fn apply_patch(&mut self, patch: &Map<String, Value>) -> Result<(), String> {
        for (k, v) in patch {
            match k.as_str() {
                "headerScanRows" => self.header_scan_rows = parse_usize_range(v, k, 1, 20)?,
                "defaultHeaderRow" => self.default_header_row = parse_usize_range(v, k, 0, 20)?,
                "fallbackPelatihanCol" => self.fallback_pelatihan_col = parse_optional_col(v, k)?,
                "fallbackUjikomCol" => self.fallback_ujikom_col = parse_optional_col(v, k)?,
                "archiveUploads" => {
                    self.archive_uploads = v
                        .as_bool()
                        .ok_or_else(|| format!("{} must be boolean", k))?
                }
                _ => return Err(format!("unknown import config field: {}", k)),
            }
        }
        Ok(())
    }
}

fn parse_usize_range(v: &Value, key: &str, min: u64, max: u64) -> Result<usize, String> {
    let n = v
        .as_u64()
        .ok_or_else(|| format!("{} must be a non-negative integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n as usize)
}

fn parse_optional_col(v: &Value, key: &str) -> Result<Option<usize>, String> {
    if v.is_null() {
        return Ok(None);
    }
    parse_usize_range(v, key, 0, 255).map(Some)
}
