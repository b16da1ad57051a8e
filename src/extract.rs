use crate::grid::{Grid, MergedRange};
use crate::mapping::{ColumnMap, Field};
use serde::{Deserialize, Serialize};

/// One participant row in canonical shape.
///
/// `None` means the source had no column for the field; `Some("")` means the
/// column existed but the cell was blank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParticipantRecord {
    pub no: Option<i64>,
    pub nama_peserta: String,
    pub nama_perusahaan: Option<String>,
    pub pelatihan: Option<String>,
    pub ujikom_praktek: Option<String>,
    pub materi_skema: Option<String>,
    pub kso_lsp: Option<String>,
    pub skl_sertifikat: Option<String>,
    pub tanggal_invoice: Option<String>,
    pub sertifikat_dari_kso: Option<String>,
    pub sertifikat_diterima_kandel: Option<String>,
    pub sertifikat_diterima_peserta: Option<String>,
}

impl ParticipantRecord {
    fn slot(&mut self, field: Field) -> Option<&mut Option<String>> {
        match field {
            Field::No | Field::NamaPeserta => None,
            Field::NamaPerusahaan => Some(&mut self.nama_perusahaan),
            Field::Pelatihan => Some(&mut self.pelatihan),
            Field::UjikomPraktek => Some(&mut self.ujikom_praktek),
            Field::MateriSkema => Some(&mut self.materi_skema),
            Field::KsoLsp => Some(&mut self.kso_lsp),
            Field::SklSertifikat => Some(&mut self.skl_sertifikat),
            Field::TanggalInvoice => Some(&mut self.tanggal_invoice),
            Field::SertifikatDariKso => Some(&mut self.sertifikat_dari_kso),
            Field::SertifikatDiterimaKandel => Some(&mut self.sertifikat_diterima_kandel),
            Field::SertifikatDiterimaPeserta => Some(&mut self.sertifikat_diterima_peserta),
        }
    }

    pub fn set(&mut self, field: Field, value: String) {
        match field {
            Field::No => self.no = parse_no(&value),
            Field::NamaPeserta => self.nama_peserta = value,
            _ => {
                if let Some(slot) = self.slot(field) {
                    *slot = Some(value);
                }
            }
        }
    }

    /// Text column value with absence collapsed to "".
    pub fn text(&self, field: Field) -> &str {
        let v = match field {
            Field::No => return "",
            Field::NamaPeserta => return &self.nama_peserta,
            Field::NamaPerusahaan => &self.nama_perusahaan,
            Field::Pelatihan => &self.pelatihan,
            Field::UjikomPraktek => &self.ujikom_praktek,
            Field::MateriSkema => &self.materi_skema,
            Field::KsoLsp => &self.kso_lsp,
            Field::SklSertifikat => &self.skl_sertifikat,
            Field::TanggalInvoice => &self.tanggal_invoice,
            Field::SertifikatDariKso => &self.sertifikat_dari_kso,
            Field::SertifikatDiterimaKandel => &self.sertifikat_diterima_kandel,
            Field::SertifikatDiterimaPeserta => &self.sertifikat_diterima_peserta,
        };
        v.as_deref().unwrap_or("")
    }

    /// Identifies the row in failure reports: its `no`, else its name.
    pub fn key(&self) -> String {
        match self.no {
            Some(no) => no.to_string(),
            None if !self.nama_peserta.is_empty() => self.nama_peserta.clone(),
            None => "unknown".to_string(),
        }
    }

    /// Trims every text field and canonicalises `skl_sertifikat`.
    pub fn normalized(mut self) -> Self {
        self.nama_peserta = self.nama_peserta.trim().to_string();
        for field in Field::ALL {
            if let Some(slot) = self.slot(field) {
                if let Some(v) = slot.as_mut() {
                    *v = v.trim().to_string();
                }
            }
        }
        if let Some(v) = self.skl_sertifikat.as_mut() {
            *v = normalize_skl(v).to_string();
        }
        self
    }
}

/// Collapses certificate markers to `"v"`, `"x"` or `""`.
pub fn normalize_skl(value: &str) -> &'static str {
    match value.trim().to_lowercase().as_str() {
        "v" | "✓" | "✔" => "v",
        "x" | "✗" | "✘" => "x",
        _ => "",
    }
}

fn parse_no(value: &str) -> Option<i64> {
    let t = value.trim().trim_end_matches('.');
    if t.is_empty() {
        return None;
    }
    if let Ok(n) = t.parse::<i64>() {
        return Some(n);
    }
    match t.parse::<f64>() {
        Ok(f) if f.fract() == 0.0 && f.is_finite() => Some(f as i64),
        _ => None,
    }
}

/// Last non-empty value seen per field, in row encounter order.
#[derive(Debug, Default)]
struct LastValues([Option<String>; Field::COUNT]);

impl LastValues {
    fn get(&self, field: Field) -> &str {
        self.0[field as usize].as_deref().unwrap_or("")
    }

    fn remember(&mut self, field: Field, value: &str) {
        self.0[field as usize] = Some(value.to_string());
    }
}

/// Walks the rows below `header_row` and emits one record per usable row.
///
/// Blank rows are skipped. An empty cell inside a merged range takes the last
/// non-empty value seen for its field. Rows without `nama_peserta` are
/// dropped. Output keeps source row order.
pub fn extract_records(
    grid: &Grid,
    header_row: usize,
    map: &ColumnMap,
    merged: &[MergedRange],
) -> Vec<ParticipantRecord> {
    let (records, _) = (header_row.saturating_add(1)..grid.height())
        .filter(|row| !grid.is_blank_row(*row))
        .fold(
            (Vec::new(), LastValues::default()),
            |(mut out, mut last), row| {
                if let Some(rec) = extract_row(grid, row, map, merged, &mut last) {
                    out.push(rec);
                }
                (out, last)
            },
        );
    records
}

fn extract_row(
    grid: &Grid,
    row: usize,
    map: &ColumnMap,
    merged: &[MergedRange],
    last: &mut LastValues,
) -> Option<ParticipantRecord> {
    let mut rec = ParticipantRecord::default();
    for (field, col) in map.iter() {
        let raw = grid.cell(row, col).trim();
        let value = if !raw.is_empty() {
            last.remember(field, raw);
            raw.to_string()
        } else if merged.iter().any(|m| m.contains(row, col)) {
            last.get(field).to_string()
        } else {
            String::new()
        };
        let value = if field == Field::SklSertifikat {
            normalize_skl(&value).to_string()
        } else {
            value
        };
        rec.set(field, value);
    }
    if rec.nama_peserta.is_empty() {
        return None;
    }
    Some(rec)
}
