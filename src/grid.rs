//! First-sheet grid extraction for uploaded workbooks.
//!
//! Only the first sheet of a workbook is read. Cells come back as display
//! text (numbers without a trailing `.0`, dates as `YYYY-MM-DD`) so later
//! stages can keyword-match on them, together with the sheet's merged ranges
//! in absolute zero-based coordinates.

use calamine::{open_workbook, Data, Dimensions, Range, Reader, Xls, Xlsx};
use chrono::Timelike;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use thiserror::Error;

const ZIP_SIGNATURE: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];
const CFB_SIGNATURE: [u8; 8] = [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

#[derive(Debug, Error)]
pub enum GridError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid xlsx file: {0}")]
    Xlsx(#[from] calamine::XlsxError),

    #[error("invalid xls file: {0}")]
    Xls(#[from] calamine::XlsError),

    #[error("not a spreadsheet: {0}")]
    UnsupportedFormat(String),

    #[error("workbook has no sheets")]
    NoSheets,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SheetFormat {
    Xlsx,
    Xls,
}

impl SheetFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            Self::Xls => "application/vnd.ms-excel",
        }
    }
}

/// Inclusive rectangle of merged cells; only the anchor holds data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergedRange {
    pub start_row: usize,
    pub end_row: usize,
    pub start_col: usize,
    pub end_col: usize,
}

impl MergedRange {
    pub fn contains(&self, row: usize, col: usize) -> bool {
        (self.start_row..=self.end_row).contains(&row)
            && (self.start_col..=self.end_col).contains(&col)
    }
}

impl From<&Dimensions> for MergedRange {
    fn from(dim: &Dimensions) -> Self {
        Self {
            start_row: dim.start.0 as usize,
            end_row: dim.end.0 as usize,
            start_col: dim.start.1 as usize,
            end_col: dim.end.1 as usize,
        }
    }
}

/// Rectangular cell text. Blank cells are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Grid {
    rows: Vec<Vec<String>>,
    width: usize,
}

impl Grid {
    /// Builds a grid from ragged rows, padding short rows with blanks.
    pub fn from_rows(mut rows: Vec<Vec<String>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut rows {
            row.resize(width, String::new());
        }
        Self { rows, width }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn row(&self, row: usize) -> &[String] {
        self.rows.get(row).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.row(row).get(col).map(String::as_str).unwrap_or("")
    }

    pub fn is_blank_row(&self, row: usize) -> bool {
        self.row(row).iter().all(|c| c.trim().is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct SheetGrid {
    pub sheet_name: String,
    pub format: SheetFormat,
    pub grid: Grid,
    pub merged: Vec<MergedRange>,
}

/// Picks the container format from the extension, falling back to the file
/// signature when the extension is missing or unrecognised.
pub fn detect_format(path: &Path) -> Result<SheetFormat, GridError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("xlsx") | Some("xlsm") => return Ok(SheetFormat::Xlsx),
        Some("xls") => return Ok(SheetFormat::Xls),
        _ => {}
    }

    let mut f = File::open(path).map_err(|source| GridError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    let mut sig = [0u8; 8];
    let read = f.read(&mut sig).map_err(|source| GridError::Io {
        path: path.to_string_lossy().to_string(),
        source,
    })?;
    if read >= 4 && sig[..4] == ZIP_SIGNATURE {
        return Ok(SheetFormat::Xlsx);
    }
    if read == 8 && sig == CFB_SIGNATURE {
        return Ok(SheetFormat::Xls);
    }
    Err(GridError::UnsupportedFormat(
        path.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
    ))
}

pub fn read_first_sheet(path: &Path) -> Result<SheetGrid, GridError> {
    if !path.is_file() {
        return Err(GridError::Io {
            path: path.to_string_lossy().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        });
    }
    match detect_format(path)? {
        SheetFormat::Xlsx => read_xlsx(path),
        SheetFormat::Xls => read_xls(path),
    }
}

fn read_xlsx(path: &Path) -> Result<SheetGrid, GridError> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(GridError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;
    let merged = match workbook.worksheet_merge_cells(&sheet_name) {
        Some(dims) => dims?.iter().map(MergedRange::from).collect(),
        None => Vec::new(),
    };
    Ok(SheetGrid {
        sheet_name,
        format: SheetFormat::Xlsx,
        grid: grid_from_range(&range),
        merged,
    })
}

fn read_xls(path: &Path) -> Result<SheetGrid, GridError> {
    let mut workbook: Xls<_> = open_workbook(path)?;
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or(GridError::NoSheets)?;
    let range = workbook.worksheet_range(&sheet_name)?;
    let merged = workbook
        .worksheet_merge_cells(&sheet_name)
        .map(|dims| dims.iter().map(MergedRange::from).collect())
        .unwrap_or_default();
    Ok(SheetGrid {
        sheet_name,
        format: SheetFormat::Xls,
        grid: grid_from_range(&range),
        merged,
    })
}

// calamine ranges start at the first used cell; the grid always starts at A1
// so that merged-range coordinates line up.
fn grid_from_range(range: &Range<Data>) -> Grid {
    let (Some(start), Some(end)) = (range.start(), range.end()) else {
        return Grid::default();
    };
    let height = end.0 as usize + 1;
    let width = end.1 as usize + 1;
    let mut rows = vec![vec![String::new(); width]; height];
    for (row, col, value) in range.used_cells() {
        let r = start.0 as usize + row;
        let c = start.1 as usize + col;
        if r < height && c < width {
            rows[r][c] = cell_text(value);
        }
    }
    Grid::from_rows(rows)
}

fn cell_text(value: &Data) -> String {
    match value {
        Data::Empty | Data::Error(_) => String::new(),
        Data::String(s) | Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Int(v) => v.to_string(),
        Data::Float(v) => format_number(*v),
        Data::Bool(true) => "TRUE".to_string(),
        Data::Bool(false) => "FALSE".to_string(),
        Data::DateTime(v) => match v.as_datetime() {
            Some(dt) if dt.hour() == 0 && dt.minute() == 0 && dt.second() == 0 => {
                dt.format("%Y-%m-%d").to_string()
            }
            Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format_number(v.as_f64()),
        },
    }
}

fn format_number(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}
