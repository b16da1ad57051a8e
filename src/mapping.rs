//! Header detection and header-text to canonical field mapping.
//!
//! Both steps are best-effort: a wrong guess degrades into empty fields
//! downstream, never into an error.

use crate::config::ImportConfig;
use crate::grid::Grid;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    No,
    NamaPeserta,
    NamaPerusahaan,
    Pelatihan,
    UjikomPraktek,
    MateriSkema,
    KsoLsp,
    SklSertifikat,
    TanggalInvoice,
    SertifikatDariKso,
    SertifikatDiterimaKandel,
    SertifikatDiterimaPeserta,
}

impl Field {
    pub const COUNT: usize = 12;

    pub const ALL: [Field; Field::COUNT] = [
        Field::No,
        Field::NamaPeserta,
        Field::NamaPerusahaan,
        Field::Pelatihan,
        Field::UjikomPraktek,
        Field::MateriSkema,
        Field::KsoLsp,
        Field::SklSertifikat,
        Field::TanggalInvoice,
        Field::SertifikatDariKso,
        Field::SertifikatDiterimaKandel,
        Field::SertifikatDiterimaPeserta,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::No => "no",
            Self::NamaPeserta => "nama_peserta",
            Self::NamaPerusahaan => "nama_perusahaan",
            Self::Pelatihan => "pelatihan",
            Self::UjikomPraktek => "ujikom_praktek",
            Self::MateriSkema => "materi_skema",
            Self::KsoLsp => "kso_lsp",
            Self::SklSertifikat => "skl_sertifikat",
            Self::TanggalInvoice => "tanggal_invoice",
            Self::SertifikatDariKso => "sertifikat_dari_kso",
            Self::SertifikatDiterimaKandel => "sertifikat_diterima_kandel",
            Self::SertifikatDiterimaPeserta => "sertifikat_diterima_peserta",
        }
    }
}

/// Canonical field -> column index. A field absent here is unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    cols: [Option<usize>; Field::COUNT],
}

impl ColumnMap {
    pub fn get(&self, field: Field) -> Option<usize> {
        self.cols[field as usize]
    }

    pub fn insert(&mut self, field: Field, col: usize) {
        self.cols[field as usize] = Some(col);
    }

    pub fn is_mapped(&self, field: Field) -> bool {
        self.get(field).is_some()
    }

    pub fn claims(&self, col: usize) -> bool {
        self.cols.iter().any(|c| *c == Some(col))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, usize)> + '_ {
        Field::ALL
            .into_iter()
            .filter_map(move |f| self.get(f).map(|c| (f, c)))
    }

    pub fn len(&self) -> usize {
        self.cols.iter().filter(|c| c.is_some()).count()
    }
}

const NAME_TOKENS: &[&str] = &["nama", "name"];
const SUBJECT_TOKENS: &[&str] = &["peserta", "participant", "perusahaan", "company"];

/// Returns the zero-based header row.
///
/// Many templates put a merged title banner above the real header, so the
/// first few rows are scanned for a name token paired with a participant or
/// company token. Without a match, `default_header_row` is used.
pub fn locate_header_row(grid: &Grid, cfg: &ImportConfig) -> usize {
    let scan = cfg.header_scan_rows.min(grid.height());
    for row in 0..scan {
        let text = grid
            .row(row)
            .iter()
            .map(|c| c.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let has_name = NAME_TOKENS.iter().any(|t| text.contains(t));
        let has_subject = SUBJECT_TOKENS.iter().any(|t| text.contains(t));
        if has_name && has_subject {
            debug!(row, "header row detected");
            return row;
        }
    }
    debug!(
        row = cfg.default_header_row,
        "no header row detected, using default"
    );
    cfg.default_header_row
}

enum Rule {
    /// Every keyword is a substring of the header.
    All(&'static [&'static str]),
    /// Every keyword of the first list is present and none of the second.
    AllExcept(&'static [&'static str], &'static [&'static str]),
    /// Header equals one of these exactly.
    Exact(&'static [&'static str]),
}

impl Rule {
    fn matches(&self, header: &str) -> bool {
        match self {
            Rule::All(all) => all.iter().all(|k| header.contains(k)),
            Rule::AllExcept(all, none) => {
                all.iter().all(|k| header.contains(k)) && !none.iter().any(|k| header.contains(k))
            }
            Rule::Exact(options) => options.iter().any(|o| header == *o),
        }
    }

    /// The header is nothing but this rule's keyword.
    fn names_exactly(&self, header: &str) -> bool {
        match self {
            Rule::All(all) | Rule::AllExcept(all, _) => all.len() == 1 && header == all[0],
            Rule::Exact(options) => options.iter().any(|o| header == *o),
        }
    }
}

struct FieldRules {
    field: Field,
    strict: &'static [Rule],
    relaxed: &'static [Rule],
}

// Fields whose headers are supersets of others ("Sertifikat diterima peserta
// pelatihan" vs "Pelatihan") are listed first so they claim their column.
const RULES: &[FieldRules] = &[
    FieldRules {
        field: Field::SertifikatDiterimaKandel,
        strict: &[Rule::All(&["sertifikat", "diterima", "kandel"])],
        relaxed: &[Rule::All(&["diterima", "kandel"])],
    },
    FieldRules {
        field: Field::SertifikatDiterimaPeserta,
        strict: &[Rule::All(&["sertifikat", "diterima", "peserta"])],
        relaxed: &[Rule::All(&["diterima", "peserta"])],
    },
    FieldRules {
        field: Field::SertifikatDariKso,
        strict: &[Rule::All(&["sertifikat", "kso"])],
        relaxed: &[Rule::All(&["diberikan", "lsp"]), Rule::All(&["dari", "kso"])],
    },
    FieldRules {
        field: Field::SklSertifikat,
        strict: &[Rule::All(&["skl"])],
        relaxed: &[Rule::All(&["e-sertifikat"]), Rule::All(&["e-sert"])],
    },
    FieldRules {
        field: Field::NamaPeserta,
        strict: &[Rule::All(&["nama", "peserta"])],
        relaxed: &[
            Rule::All(&["name", "participant"]),
            Rule::AllExcept(&["peserta"], &["sertifikat", "diterima"]),
        ],
    },
    FieldRules {
        field: Field::NamaPerusahaan,
        strict: &[Rule::All(&["nama", "perusahaan"])],
        relaxed: &[Rule::All(&["perusahaan"]), Rule::All(&["company"])],
    },
    FieldRules {
        field: Field::UjikomPraktek,
        strict: &[Rule::All(&["ujikom"])],
        relaxed: &[Rule::All(&["uji", "praktek"]), Rule::All(&["praktek"])],
    },
    FieldRules {
        field: Field::MateriSkema,
        strict: &[Rule::All(&["materi"])],
        relaxed: &[Rule::All(&["skema"])],
    },
    FieldRules {
        field: Field::KsoLsp,
        strict: &[Rule::AllExcept(&["kso"], &["sertifikat"])],
        relaxed: &[Rule::AllExcept(&["lsp"], &["sertifikat"])],
    },
    FieldRules {
        field: Field::TanggalInvoice,
        strict: &[Rule::All(&["invoice"])],
        relaxed: &[Rule::All(&["tanggal"])],
    },
    FieldRules {
        field: Field::Pelatihan,
        strict: &[Rule::AllExcept(&["pelatihan"], &["peserta", "sertifikat"])],
        relaxed: &[Rule::All(&["training"])],
    },
    FieldRules {
        field: Field::No,
        strict: &[Rule::Exact(&["no", "no.", "nomor", "no urut", "#"])],
        relaxed: &[Rule::Exact(&["nomer", "number"])],
    },
];

/// Maps header cells to canonical fields.
///
/// Each field takes the leftmost unclaimed column whose header is exactly one
/// of its strict keywords, else the leftmost satisfying a strict rule, else one
/// satisfying a relaxed rule. When `pelatihan` stays unmapped the
/// configured positional fallback columns are applied.
pub fn map_columns(header: &[String], cfg: &ImportConfig) -> ColumnMap {
    let normalized: Vec<String> = header.iter().map(|h| h.trim().to_lowercase()).collect();
    let mut map = ColumnMap::default();

    for rules in RULES {
        let found = find_column(&normalized, &map, |h| {
            rules.strict.iter().any(|r| r.names_exactly(h))
        })
        .or_else(|| find_column(&normalized, &map, |h| rules.strict.iter().any(|r| r.matches(h))))
        .or_else(|| {
            find_column(&normalized, &map, |h| rules.relaxed.iter().any(|r| r.matches(h)))
        });
        if let Some(col) = found {
            debug!(field = rules.field.as_str(), col, "column mapped");
            map.insert(rules.field, col);
        }
    }

    if !map.is_mapped(Field::Pelatihan) {
        if let Some(col) = cfg.fallback_pelatihan_col.filter(|c| *c < header.len()) {
            debug!(col, "pelatihan not found by header, using positional fallback");
            map.insert(Field::Pelatihan, col);
            if !map.is_mapped(Field::UjikomPraktek) {
                if let Some(col) = cfg.fallback_ujikom_col.filter(|c| *c < header.len()) {
                    map.insert(Field::UjikomPraktek, col);
                }
            }
        }
    }

    debug!(mapped = map.len(), "column map built");
    map
}

fn find_column(
    headers: &[String],
    map: &ColumnMap,
    accept: impl Fn(&str) -> bool,
) -> Option<usize> {
    headers.iter().enumerate().find_map(|(col, h)| {
        if h.is_empty() || map.claims(col) {
            return None;
        }
        accept(h).then_some(col)
    })
}
