#![allow(dead_code)]

use rust_xlsxwriter::{Format, Workbook};
use serde_json::json;
use std::io::{BufRead, BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const TEMPLATE_HEADER: [&str; 12] = [
    "No",
    "Nama Peserta",
    "Nama Perusahaan",
    "Pelatihan",
    "Ujikom / Uji Praktek",
    "Materi / Skema",
    "KSO / LSP",
    "SKL / E-sertifikat",
    "Tanggal Invoice",
    "Sertifikat diberikan dari KSO / LSP",
    "Sertifikast diterima oleh Kandel",
    "Sertifikat diterima peserta pelatihan",
];

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_pesertad");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn pesertad");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn read_response(reader: &mut BufReader<ChildStdout>) -> serde_json::Value {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let value = read_response(reader);
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> &str {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

/// Merged range as `(first_row, first_col, last_row, last_col)`, zero-based.
pub type Merge = (u32, u16, u32, u16);

/// Writes a single-sheet workbook. Merged ranges take the value of their
/// top-left cell; other cells inside a merge are left to the merge.
pub fn write_sheet(path: &Path, rows: &[Vec<&str>], merges: &[Merge]) {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let merge_format = Format::new();
    let inside = |r: u32, c: u16| {
        merges
            .iter()
            .any(|&(r1, c1, r2, c2)| (r1..=r2).contains(&r) && (c1..=c2).contains(&c))
    };

    for (r, cells) in rows.iter().enumerate() {
        for (c, text) in cells.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            if text.is_empty() || inside(r, c) {
                continue;
            }
            match text.parse::<f64>() {
                Ok(n) => worksheet.write_number(r, c, n).expect("write number"),
                Err(_) => worksheet.write_string(r, c, *text).expect("write string"),
            };
        }
    }
    for &(r1, c1, r2, c2) in merges {
        let text = rows
            .get(r1 as usize)
            .and_then(|cells| cells.get(c1 as usize))
            .copied()
            .unwrap_or("");
        worksheet
            .merge_range(r1, c1, r2, c2, text, &merge_format)
            .expect("merge range");
    }
    workbook.save(path).expect("save workbook");
}

/// Rekap sheet shaped like real uploads: a merged title banner, the template
/// header on the second row, a company cell merged over two participants, a
/// spacer row and a row without a name.
fn roster() -> (Vec<Vec<&'static str>>, [Merge; 2]) {
    let rows = vec![
        vec!["REKAP PESERTA PELATIHAN K3 UMUM 2024"],
        TEMPLATE_HEADER.to_vec(),
        vec![
            "1",
            "Budi Santoso",
            "PT Maju Jaya",
            "Pelatihan Ahli K3 Umum Batch 12 Tahun 2024",
            "Ujikom 14 Maret",
            "Skema BNSP Ahli K3 Umum",
            "LSP K3 Nusantara",
            "✓",
            "2024-03-20",
            "Sudah",
            "Sudah",
            "Belum",
        ],
        vec![
            "2",
            "Sari Dewi",
            "",
            "Pelatihan Ahli K3 Umum Batch 12 Tahun 2024",
            "Ujikom 14 Maret",
            "Skema BNSP Ahli K3 Umum",
            "LSP K3 Nusantara",
            "x",
            "2024-03-20",
            "",
            "",
            "",
        ],
        vec![],
        vec!["3", "", "PT Tanpa Nama"],
    ];
    (rows, [(0, 0, 0, 11), (2, 2, 3, 2)])
}

pub fn write_roster(path: &Path) {
    let (rows, merges) = roster();
    write_sheet(path, &rows, &merges);
}

pub fn write_roster_xls(path: &Path) {
    let (rows, merges) = roster();
    write_xls(path, "Rekap", &rows, &merges);
}

const RECORD_BOF: u16 = 0x0809;
const RECORD_EOF: u16 = 0x000A;
const RECORD_BOUNDSHEET: u16 = 0x0085;
const RECORD_NUMBER: u16 = 0x0203;
const RECORD_LABEL: u16 = 0x0204;
const RECORD_MERGEDCELLS: u16 = 0x00E5;

const BOF_VERSION_BIFF8: u16 = 0x0600;
const BOF_DT_WORKBOOK_GLOBALS: u16 = 0x0005;
const BOF_DT_WORKSHEET: u16 = 0x0010;

fn push_record(out: &mut Vec<u8>, id: u16, data: &[u8]) {
    out.extend_from_slice(&id.to_le_bytes());
    out.extend_from_slice(&(data.len() as u16).to_le_bytes());
    out.extend_from_slice(data);
}

fn bof(dt: u16) -> [u8; 16] {
    let mut out = [0u8; 16];
    out[0..2].copy_from_slice(&BOF_VERSION_BIFF8.to_le_bytes());
    out[2..4].copy_from_slice(&dt.to_le_bytes());
    out
}

fn utf16(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// Writes a single-sheet BIFF8 workbook, the format of legacy `.xls`
/// uploads. Cells follow `write_sheet`: numeric text becomes a NUMBER record,
/// anything else a LABEL, and merged ranges keep only their top-left value.
pub fn write_xls(path: &Path, sheet_name: &str, rows: &[Vec<&str>], merges: &[Merge]) {
    let mut globals = Vec::new();
    push_record(&mut globals, RECORD_BOF, &bof(BOF_DT_WORKBOOK_GLOBALS));
    let mut boundsheet = vec![0u8; 6];
    boundsheet.push(sheet_name.encode_utf16().count() as u8);
    boundsheet.push(1);
    boundsheet.extend_from_slice(&utf16(sheet_name));
    let boundsheet_offset_pos = globals.len() + 4;
    push_record(&mut globals, RECORD_BOUNDSHEET, &boundsheet);
    push_record(&mut globals, RECORD_EOF, &[]);

    let sheet_offset = globals.len() as u32;
    globals[boundsheet_offset_pos..boundsheet_offset_pos + 4]
        .copy_from_slice(&sheet_offset.to_le_bytes());

    let mut sheet = Vec::new();
    push_record(&mut sheet, RECORD_BOF, &bof(BOF_DT_WORKSHEET));
    let hidden = |r: u32, c: u16| {
        merges.iter().any(|&(r1, c1, r2, c2)| {
            (r1..=r2).contains(&r) && (c1..=c2).contains(&c) && (r, c) != (r1, c1)
        })
    };
    for (r, cells) in rows.iter().enumerate() {
        for (c, text) in cells.iter().enumerate() {
            let (r, c) = (r as u32, c as u16);
            if text.is_empty() || hidden(r, c) {
                continue;
            }
            let mut data = Vec::new();
            data.extend_from_slice(&(r as u16).to_le_bytes());
            data.extend_from_slice(&c.to_le_bytes());
            data.extend_from_slice(&0u16.to_le_bytes());
            match text.parse::<f64>() {
                Ok(n) => {
                    data.extend_from_slice(&n.to_le_bytes());
                    push_record(&mut sheet, RECORD_NUMBER, &data);
                }
                Err(_) => {
                    data.extend_from_slice(&(text.encode_utf16().count() as u16).to_le_bytes());
                    data.push(1);
                    data.extend_from_slice(&utf16(text));
                    push_record(&mut sheet, RECORD_LABEL, &data);
                }
            }
        }
    }
    if !merges.is_empty() {
        let mut data = (merges.len() as u16).to_le_bytes().to_vec();
        for &(r1, c1, r2, c2) in merges {
            for v in [r1 as u16, r2 as u16, c1, c2] {
                data.extend_from_slice(&v.to_le_bytes());
            }
        }
        push_record(&mut sheet, RECORD_MERGEDCELLS, &data);
    }
    push_record(&mut sheet, RECORD_EOF, &[]);
    globals.extend_from_slice(&sheet);

    let mut ole = cfb::CompoundFile::create(Cursor::new(Vec::new())).expect("create cfb");
    {
        let mut stream = ole.create_stream("Workbook").expect("Workbook stream");
        stream.write_all(&globals).expect("write Workbook stream");
    }
    std::fs::write(path, ole.into_inner().into_inner()).expect("write xls");
}
