//! Field extraction over the OCR block list.
//!
//! Four independent passes, each tolerant of missing structure:
//!
//! | Pass | Source | Result |
//! |------|--------|--------|
//! | [`extract_family_table`]   | TABLE on page 2        | header + 10 records |
//! | [`extract_issue_date`]     | LINE blocks            | `D.MM.YYYY` string  |
//! | [`extract_seal_footer`]    | LINE window after stamp | 4-line footer      |
//! | [`extract_comune_sezione`] | LINE blocks            | municipality, section |
//!
//! The table's column positions are a contract with one specific printed
//! form. They live in [`TableLayout`] and nowhere else.

use crate::model::{
    Block, BlockType, Certificate, CertificateMetadata, FamilyRecord, TranslatedField,
    UntranslatedTerm,
};
use crate::pipeline::translate::{lookup_citizenship, lookup_marital_status, lookup_relation};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// First caption line of the rendered stamp.
pub const SEAL_CAPTION_1: &str = "Timbrato elettronicamente dalla Direzione";
/// Second caption line of the rendered stamp.
pub const SEAL_CAPTION_2: &str = "Generale dello Stato Civile";

const SEAL_TRIGGER: &str = "vulosur elektronikisht";
const SEAL_WINDOW: usize = 6;

/// Row/column positions of the family table (1-based, as the OCR reports them).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableLayout {
    /// Page holding the family table.
    pub page: u32,
    pub header_row: u32,
    pub first_data_row: u32,
    /// Inclusive.
    pub last_data_row: u32,
    pub full_name: u32,
    pub father_name: u32,
    pub mother_name: u32,
    pub sex: u32,
    pub relation: u32,
    pub birth_day: u32,
    pub birth_month: u32,
    pub birth_year: u32,
    pub marital_status: u32,
    pub place_of_birth: u32,
    pub citizenship: u32,
    pub personal_number: u32,
}

impl TableLayout {
    /// The 2010 civil-registry family certificate.
    pub const CIVIL_REGISTRY_2010: TableLayout = TableLayout {
        page: 2,
        header_row: 1,
        first_data_row: 3,
        last_data_row: 12,
        full_name: 2,
        father_name: 3,
        mother_name: 4,
        sex: 5,
        relation: 6,
        birth_day: 7,
        birth_month: 8,
        birth_year: 9,
        marital_status: 10,
        place_of_birth: 11,
        citizenship: 12,
        personal_number: 13,
    };
}

impl Default for TableLayout {
    fn default() -> Self {
        Self::CIVIL_REGISTRY_2010
    }
}

/// Output of [`extract_family_table`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyTable {
    pub header: Vec<String>,
    pub rows: Vec<FamilyRecord>,
    pub seal_footer: String,
    pub untranslated: Vec<UntranslatedTerm>,
}

/// Run every extractor and assemble the certificate.
pub fn extract_certificate(blocks: &[Block], layout: &TableLayout) -> Certificate {
    let table = read_table(blocks, layout).unwrap_or_default();
    let (comune, sezione) = extract_comune_sezione(blocks);
    let issue_date = extract_issue_date(blocks);
    // The stamp is read from all lines, so it survives a missing table.
    let seal_footer = extract_seal_footer(blocks);

    debug!(
        "Extracted {} rows, comune={:?}, sezione={:?}, issue_date={:?}, seal={}",
        table.rows.len(),
        comune,
        sezione,
        issue_date,
        !seal_footer.is_empty()
    );

    Certificate {
        header: table.header,
        records: table.rows,
        metadata: CertificateMetadata {
            comune,
            sezione,
            issue_date,
            seal_footer,
        },
        untranslated: table.untranslated,
    }
}

// ── Family table ─────────────────────────────────────────────────────────

type Grid = HashMap<u32, HashMap<u32, String>>;

/// Locate the family table and read its header and data rows.
///
/// A certificate without a table on the layout's page yields empty results.
pub fn extract_family_table(blocks: &[Block], layout: &TableLayout) -> FamilyTable {
    match read_table(blocks, layout) {
        Some(table) => FamilyTable {
            seal_footer: extract_seal_footer(blocks),
            ..table
        },
        None => FamilyTable::default(),
    }
}

/// Header, rows and untranslated terms; `None` without a table on the page.
fn read_table(blocks: &[Block], layout: &TableLayout) -> Option<FamilyTable> {
    let Some(table) = blocks
        .iter()
        .find(|b| b.block_type == BlockType::Table && b.page == Some(layout.page))
    else {
        debug!("No table on page {}", layout.page);
        return None;
    };

    let by_id: HashMap<&str, &Block> = blocks.iter().map(|b| (b.id.as_str(), b)).collect();
    let grid = build_grid(table, &by_id);

    let max_col = grid.values().flat_map(|row| row.keys()).copied().max().unwrap_or(0);
    let header = (1..=max_col)
        .map(|c| cell(&grid, layout.header_row, c).to_string())
        .collect();

    let mut untranslated = Vec::new();
    let rows = (layout.first_data_row..=layout.last_data_row)
        .enumerate()
        .map(|(i, r)| read_record(&grid, layout, r, i + 1, &mut untranslated))
        .collect();

    Some(FamilyTable {
        header,
        rows,
        seal_footer: String::new(),
        untranslated,
    })
}

/// Follow TABLE → CELL → WORD edges into a `row → column → text` grid.
fn build_grid(table: &Block, by_id: &HashMap<&str, &Block>) -> Grid {
    let mut grid = Grid::new();
    for cell_id in table.child_ids() {
        let Some(cell) = by_id.get(cell_id).filter(|b| b.block_type == BlockType::Cell) else {
            continue;
        };
        let (Some(row), Some(col)) = (cell.row_index, cell.column_index) else {
            continue;
        };
        let text = cell
            .child_ids()
            .filter_map(|id| by_id.get(id))
            .filter(|b| b.block_type == BlockType::Word)
            .map(|b| b.text())
            .collect::<Vec<_>>()
            .join(" ")
            .trim()
            .to_string();
        grid.entry(row).or_default().insert(col, text);
    }
    grid
}

fn cell(grid: &Grid, row: u32, col: u32) -> &str {
    grid.get(&row)
        .and_then(|r| r.get(&col))
        .map(String::as_str)
        .unwrap_or("")
}

fn read_record(
    grid: &Grid,
    layout: &TableLayout,
    row: u32,
    sequence: usize,
    untranslated: &mut Vec<UntranslatedTerm>,
) -> FamilyRecord {
    let get = |col| cell(grid, row, col);
    let sex = get(layout.sex).trim().to_uppercase();

    let mut translate = |field, raw: &str, mapped: Option<&'static str>| match mapped {
        Some(it) => it.to_string(),
        None => {
            if !raw.trim().is_empty() {
                warn!("Row {}: no Italian {} for {:?}", sequence, field, raw);
                untranslated.push(UntranslatedTerm {
                    sequence,
                    field,
                    value: raw.to_string(),
                });
            }
            raw.to_string()
        }
    };

    let relation_raw = get(layout.relation);
    let marital_raw = get(layout.marital_status);
    let citizenship_raw = get(layout.citizenship);

    FamilyRecord {
        sequence,
        full_name: get(layout.full_name).to_string(),
        father_name: get(layout.father_name).to_string(),
        mother_name: get(layout.mother_name).to_string(),
        relation: translate(
            TranslatedField::Relation,
            relation_raw,
            lookup_relation(relation_raw),
        ),
        date_of_birth: join_date(
            get(layout.birth_day),
            get(layout.birth_month),
            get(layout.birth_year),
        ),
        marital_status: translate(
            TranslatedField::MaritalStatus,
            marital_raw,
            lookup_marital_status(marital_raw, &sex),
        ),
        place_of_birth: get(layout.place_of_birth).to_string(),
        citizenship: translate(
            TranslatedField::Citizenship,
            citizenship_raw,
            lookup_citizenship(citizenship_raw, &sex),
        ),
        personal_number: get(layout.personal_number).to_string(),
        sex,
    }
}

/// Join day/month/year with `/`, skipping empty parts without reordering.
pub fn join_date(day: &str, month: &str, year: &str) -> String {
    [day, month, year]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

// ── Line helpers ─────────────────────────────────────────────────────────

fn lines(blocks: &[Block]) -> Vec<&str> {
    blocks
        .iter()
        .filter(|b| b.block_type == BlockType::Line)
        .map(|b| b.text().trim())
        .collect()
}

// ── Issue date ───────────────────────────────────────────────────────────

static RE_ISSUE_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{1,2}\.\d{2}\.\d{4}$").unwrap());

/// First LINE that is exactly a `D.MM.YYYY` / `DD.MM.YYYY` date, else `""`.
pub fn extract_issue_date(blocks: &[Block]) -> String {
    lines(blocks)
        .into_iter()
        .find(|l| RE_ISSUE_DATE.is_match(l))
        .unwrap_or("")
        .to_string()
}

// ── Seal footer ──────────────────────────────────────────────────────────

static RE_SEAL_DATE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}/\d{2}/\d{2}.*").unwrap());
static RE_DATE_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(date|datë|daté)\s*:?\s*").unwrap());
static RE_HASH_CANDIDATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9A-Fa-fO]{30,40}\b").unwrap());
static RE_HEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9A-Fa-f]{30,40}$").unwrap());

/// Normalised electronic-stamp footer, or `""` when no stamp is found.
///
/// The last "vulosur elektronikisht" line wins: reissued certificates carry
/// the superseded stamp first.
pub fn extract_seal_footer(blocks: &[Block]) -> String {
    let lines = lines(blocks);
    let Some(start) = lines
        .iter()
        .rposition(|l| l.to_lowercase().contains(SEAL_TRIGGER))
    else {
        return String::new();
    };
    let end = (start + SEAL_WINDOW).min(lines.len());
    let snippet = lines[start..end].join("\n");

    let date_line = RE_SEAL_DATE
        .find(&snippet)
        .map(|m| {
            let cleaned = RE_DATE_LABEL.replace(m.as_str(), "");
            format!("In data: {}", cleaned.trim())
        })
        .unwrap_or_default();

    let hash_line = stamp_hash(&snippet).unwrap_or_default();

    if date_line.is_empty() && hash_line.is_empty() {
        return String::new();
    }

    [SEAL_CAPTION_1, SEAL_CAPTION_2, &date_line, &hash_line].join("\n")
}

/// Longest hex run in the window, tolerating an OCR'd leading `O` for `0`.
fn stamp_hash(snippet: &str) -> Option<String> {
    let mut best: Option<String> = None;
    for m in RE_HASH_CANDIDATE.find_iter(snippet) {
        let raw = m.as_str();
        let candidate = match raw.strip_prefix(['O', 'o']) {
            Some(rest) => format!("0{rest}"),
            None => raw.to_string(),
        };
        if !RE_HEX.is_match(&candidate) {
            continue;
        }
        // Strictly longer only: ties keep the earliest.
        if best.as_ref().is_none_or(|b| candidate.len() > b.len()) {
            best = Some(candidate);
        }
    }
    best
}

// ── Municipality header ──────────────────────────────────────────────────

static RE_COMUNE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Bashkia\s+([A-Za-zÇËçë\-]+)").unwrap());

/// Municipality (`comune`) and administrative section (`sezione`), title-cased.
pub fn extract_comune_sezione(blocks: &[Block]) -> (String, String) {
    let lines = lines(blocks);
    let mut comune = String::new();
    let mut sezione = String::new();

    for (i, line) in lines.iter().enumerate() {
        if line.contains("Bashkia") {
            if let Some(caps) = RE_COMUNE.captures(line) {
                comune = title_case(&caps[1]);
            }
        }
        if line.contains("Njësia Administrative") || line.contains("Njesia Administrative") {
            if let Some((_, rest)) = line.split_once("Administrative") {
                let mut s = rest.trim().to_string();
                // "nr." alone means the number was split onto the next line.
                if matches!(s.to_lowercase().as_str(), "nr." | "nr") {
                    s.push(' ');
                    s.push_str(lines.get(i + 1).copied().unwrap_or(""));
                }
                sezione = title_case(s.trim());
            }
        }
    }
    (comune, sezione)
}

/// Upper-case the first letter of every letter run, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if prev_is_letter {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_is_letter = true;
        } else {
            out.push(c);
            prev_is_letter = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(text: &str) -> Block {
        Block {
            block_type: BlockType::Line,
            id: String::new(),
            text: Some(text.to_string()),
            page: Some(1),
            row_index: None,
            column_index: None,
            relationships: vec![],
        }
    }

    fn lines_of(texts: &[&str]) -> Vec<Block> {
        texts.iter().map(|t| line(t)).collect()
    }

    #[test]
    fn issue_date_requires_full_match() {
        assert_eq!(extract_issue_date(&lines_of(&["12.03.2021"])), "12.03.2021");
        assert_eq!(extract_issue_date(&lines_of(&["2021/03/12"])), "");
        assert_eq!(extract_issue_date(&lines_of(&["Data 12.03.2021"])), "");
        assert_eq!(extract_issue_date(&lines_of(&["1.3.2021"])), "");
        assert_eq!(extract_issue_date(&lines_of(&[" 5.13.2021 "])), "5.13.2021");
    }

    #[test]
    fn issue_date_first_match_wins() {
        let blocks = lines_of(&["CERTIFIKATË", "01.02.2020", "03.04.2022"]);
        assert_eq!(extract_issue_date(&blocks), "01.02.2020");
    }

    #[test]
    fn seal_footer_reads_date_and_hash() {
        let hash = "0123456789abcdef0123456789ABCDEF";
        let blocks = lines_of(&["Vulosur elektronikisht Date: 2022/05/10 extra", hash]);
        let footer = extract_seal_footer(&blocks);
        let got: Vec<&str> = footer.lines().collect();
        assert_eq!(got.len(), 4);
        assert_eq!(got[0], SEAL_CAPTION_1);
        assert_eq!(got[1], SEAL_CAPTION_2);
        assert_eq!(got[2], "In data: 2022/05/10 extra");
        assert_eq!(got[3], hash);
    }

    #[test]
    fn seal_footer_uses_last_trigger() {
        let blocks = lines_of(&[
            "vulosur elektronikisht",
            "2019/01/01 10:00",
            "VULOSUR ELEKTRONIKISHT nga DPGJC",
            "Datë: 2023/07/08 09:15",
        ]);
        let footer = extract_seal_footer(&blocks);
        assert!(footer.contains("In data: 2023/07/08 09:15"), "{footer}");
        assert!(!footer.contains("2019"));
    }

    #[test]
    fn seal_footer_window_is_six_lines() {
        let blocks = lines_of(&[
            "Vulosur elektronikisht",
            "a",
            "b",
            "c",
            "d",
            "e",
            "2022/05/10",
        ]);
        assert_eq!(extract_seal_footer(&blocks), "");
    }

    #[test]
    fn seal_footer_empty_without_trigger_or_content() {
        assert_eq!(extract_seal_footer(&lines_of(&["2022/05/10"])), "");
        assert_eq!(
            extract_seal_footer(&lines_of(&["Vulosur elektronikisht", "nothing here"])),
            ""
        );
    }

    #[test]
    fn seal_hash_only_leaves_date_line_empty() {
        let hash = "ABCDEF0123456789ABCDEF0123456789AB";
        let footer = extract_seal_footer(&lines_of(&["vulosur elektronikisht", hash]));
        let got: Vec<&str> = footer.split('\n').collect();
        assert_eq!(got, vec![SEAL_CAPTION_1, SEAL_CAPTION_2, "", hash]);
    }

    #[test]
    fn stamp_hash_fixes_leading_letter_o_and_prefers_longest() {
        let short = "O123456789abcdef0123456789abcd"; // 30 chars
        let long = "0123456789abcdef0123456789abcdef0123"; // 36 chars
        let snippet = format!("{short}\n{long}");
        assert_eq!(stamp_hash(&snippet).as_deref(), Some(long));
        assert_eq!(
            stamp_hash(short).as_deref(),
            Some("0123456789abcdef0123456789abcd")
        );
    }

    #[test]
    fn stamp_hash_rejects_interior_letter_o_and_keeps_first_on_ties() {
        let with_o = "0123456789abcdefO123456789abcdef"; // O inside
        assert_eq!(stamp_hash(with_o), None);
        let a = "a".repeat(32);
        let b = "b".repeat(32);
        assert_eq!(stamp_hash(&format!("{a} {b}")), Some(a));
    }

    #[test]
    fn comune_and_sezione() {
        let blocks = lines_of(&[
            "REPUBLIKA E SHQIPËRISË",
            "Bashkia TIRANË",
            "Njësia Administrative nr. 5",
        ]);
        assert_eq!(
            extract_comune_sezione(&blocks),
            ("Tiranë".to_string(), "Nr. 5".to_string())
        );
    }

    #[test]
    fn sezione_number_on_next_line() {
        let blocks = lines_of(&["Njesia Administrative Nr.", "11", "Bashkia Kavajë-Qendër"]);
        assert_eq!(
            extract_comune_sezione(&blocks),
            ("Kavajë-Qendër".to_string(), "Nr. 11".to_string())
        );
    }

    #[test]
    fn header_defaults_to_empty() {
        assert_eq!(
            extract_comune_sezione(&lines_of(&["nothing", "relevant"])),
            (String::new(), String::new())
        );
    }

    #[test]
    fn date_of_birth_drops_empty_parts() {
        assert_eq!(join_date("05", "", "1990"), "05/1990");
        assert_eq!(join_date("05", "11", "1990"), "05/11/1990");
        assert_eq!(join_date("", "", ""), "");
    }

    #[test]
    fn certificate_without_table_keeps_its_seal() {
        let blocks = lines_of(&[
            "Vulosur elektronikisht Date: 2022/05/10",
            "0123456789abcdef0123456789abcdef",
        ]);
        let table = extract_family_table(&blocks, &TableLayout::default());
        assert_eq!(table.seal_footer, "");
        assert!(table.rows.is_empty());

        let cert = extract_certificate(&blocks, &TableLayout::default());
        assert!(cert.records.is_empty());
        assert!(cert.metadata.seal_footer.ends_with("0123456789abcdef0123456789abcdef"));
        assert_eq!(cert.metadata.seal_footer, extract_seal_footer(&blocks));
    }

    #[test]
    fn title_case_matches_word_boundaries() {
        assert_eq!(title_case("DURRËS"), "Durrës");
        assert_eq!(title_case("nr. 5"), "Nr. 5");
        assert_eq!(title_case("fier-shegan"), "Fier-Shegan");
    }
}
