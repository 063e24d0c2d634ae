//! Document rendering: [`Certificate`] → Italian DOCX.
//!
//! The binary format is docx-rs's business; this module only decides what
//! goes on the page. Geometry, fonts and column widths are fixed and never
//! depend on the data, so an empty certificate renders the same skeleton
//! with blank cells.
//!
//! Page 1 carries the letterhead, issue date, title and intro sentence.
//! Page 2 carries the family table, the stamp and the translator's
//! attestation.

use crate::config::{ConversionConfig, TranslatorAttestation};
use crate::error::CertError;
use crate::model::Certificate;
use chrono::NaiveDate;
use docx_rs::{
    AlignmentType, BreakType, Docx, HeightRule, LineSpacing, PageMargin, PageOrientationType,
    Paragraph, Pic, Run, RunFonts, Table, TableCell, TableLayoutType, TableRow,
    TextDirectionType, VAlignType, WidthType,
};
use std::io::Cursor;
use tracing::debug;

/// MIME type of the rendered document.
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Turns an extracted certificate into a binary document.
pub trait DocumentRenderer: Send + Sync {
    /// Render the certificate; `issued_on` dates the translator's attestation.
    fn render(&self, certificate: &Certificate, issued_on: NaiveDate)
        -> Result<Vec<u8>, CertError>;

    /// File extension of the output, without the dot.
    fn extension(&self) -> &str {
        "docx"
    }

    fn mime_type(&self) -> &str {
        DOCX_MIME
    }
}

/// Captions of the rendered family table, `N.` first.
pub const COLUMN_CAPTIONS: [&str; 11] = [
    "N.",
    "1. Nome e Cognome",
    "2. Nome del Padre",
    "3. Nome della Madre",
    "4. Sesso",
    "5. Legame con il capofamiglia",
    "6. Data di nascita",
    "7. Stato Civile",
    "8. Luogo di Nascita",
    "9. Cittadinanza",
    "10. Numero Personale",
];

/// Column widths in centimetres, same order as [`COLUMN_CAPTIONS`].
const COLUMN_WIDTHS_CM: [f32; 11] = [0.9, 4.0, 2.4, 2.4, 0.7, 3.0, 2.4, 2.5, 4.0, 1.9, 2.7];

/// Captions printed bottom-to-top because their columns are narrow.
const VERTICAL_CAPTIONS: [&str; 2] = ["4. Sesso", "9. Cittadinanza"];

const FONT: &str = "Times New Roman";
const BODY_SIZE: usize = 22; // half-points
const SMALL_SIZE: usize = 20;

const TITLE: &str = "CERTIFICATO DI STATO DI FAMIGLIA";
const INTRO: &str = "In base al Registro Nazionale dello Stato Civile dell'anno 2010, \
si certificano i seguenti dati:";
const FOREIGN_USE: &str = "Questo certificato viene rilasciato per uso all'estero";
const SEALED_BY: &str = "Timbrato elettronicamente dalla Direzione Generale dello Stato Civile";
const AUTOMATED_NOTE: [&str; 3] = [
    "Nota: Questo documento è stato generato e timbrato",
    "da una procedura automatica da un sistema elettronico",
    "(Direzione Generale di Stato Civile)",
];

fn twips(cm: f32) -> i32 {
    (cm * 567.0).round() as i32
}

fn emu(cm: f32) -> u32 {
    (cm * 360_000.0).round() as u32
}

/// The DOCX renderer.
#[derive(Debug, Clone, Default)]
pub struct DocxRenderer {
    attestation: Option<TranslatorAttestation>,
    flag_png: Option<Vec<u8>>,
}

impl DocxRenderer {
    pub fn new(attestation: Option<TranslatorAttestation>, flag_png: Option<Vec<u8>>) -> Self {
        Self {
            attestation,
            flag_png,
        }
    }

    /// Build from the conversion config, reading the flag image if one is set.
    pub fn from_config(config: &ConversionConfig) -> Result<Self, CertError> {
        let flag_png = match config.flag_image {
            Some(ref path) => Some(std::fs::read(path).map_err(|e| {
                CertError::InvalidConfig(format!("Cannot read flag image {}: {e}", path.display()))
            })?),
            None => None,
        };
        Ok(Self::new(config.attestation.clone(), flag_png))
    }

    fn letterhead(&self, certificate: &Certificate) -> Table {
        let mut left = Run::new();
        if let Some(ref png) = self.flag_png {
            left = left
                .add_image(Pic::new(png).size(emu(0.9), emu(0.6)))
                .add_break(BreakType::TextWrapping);
        }
        let left = left
            .add_break(BreakType::TextWrapping)
            .add_text("REPUBBLICA D'ALBANIA")
            .bold();

        let meta = &certificate.metadata;
        let mut office = Vec::new();
        if !meta.comune.is_empty() {
            office.push(format!("Ufficio di Stato Civile Comune di {}", meta.comune));
        }
        if !meta.sezione.is_empty() {
            office.push(format!("Sezione Amministrativa {}", meta.sezione));
        }
        let right = multiline_run(&office[..]).bold();

        Table::new(vec![TableRow::new(vec![
            TableCell::new().add_paragraph(Paragraph::new().add_run(left)),
            TableCell::new().add_paragraph(Paragraph::new().add_run(right)),
        ])])
    }

    fn family_table(&self, certificate: &Certificate) -> Table {
        let widths: Vec<usize> = COLUMN_WIDTHS_CM.iter().map(|&w| twips(w) as usize).collect();

        let header_cells = COLUMN_CAPTIONS
            .iter()
            .zip(&widths)
            .map(|(&caption, &w)| {
                let mut cell = centred_cell(Run::new().add_text(caption).bold(), w);
                if VERTICAL_CAPTIONS.contains(&caption) {
                    cell = cell.text_direction(TextDirectionType::BtLr);
                }
                cell
            })
            .collect();
        let header = TableRow::new(header_cells)
            .row_height(twips(3.0) as f32)
            .height_rule(HeightRule::Exact);

        let mut rows = vec![header];
        for record in &certificate.records {
            let sequence = record.sequence.to_string();
            let values = std::iter::once(sequence.as_str()).chain(record.columns());
            let cells = values
                .zip(&widths)
                .map(|(v, &w)| centred_cell(Run::new().add_text(v), w))
                .collect();
            rows.push(TableRow::new(cells));
        }

        Table::new(rows)
            .set_grid(widths)
            .layout(TableLayoutType::Fixed)
    }

    fn signature(name: &str) -> Paragraph {
        tight(Paragraph::new().add_run(multiline_run(&["Traduzione eseguita da:", name])))
            .align(AlignmentType::Center)
            .indent(Some(twips(18.0)), None, None, None)
    }

    fn attestation_box(attestation: &TranslatorAttestation, issued_on: NaiveDate) -> Table {
        let (title, certified) = if attestation.feminine {
            ("traduttrice", "certificata")
        } else {
            ("traduttore", "certificato")
        };
        let text = format!(
            "Io, {name}, {title} ufficiale della lingua italiana {certified} dal Ministero della \
Giustizia con il numero di certificato {number} datato {date}, dichiaro di aver tradotto il testo \
presentatomi dalla lingua albanese all'italiano con precisione e responsabilità legale.",
            name = attestation.name,
            number = attestation.certificate_number,
            date = attestation.certificate_date,
        );
        let dated = format!("In data {}.", issued_on.format("%d.%m.%Y"));
        let run = multiline_run(&[text.as_str(), dated.as_str()]).size(SMALL_SIZE);
        Table::new(vec![TableRow::new(vec![TableCell::new()
            .width(twips(13.5) as usize, WidthType::Dxa)
            .add_paragraph(Paragraph::new().add_run(run))])])
        .set_grid(vec![twips(13.5) as usize])
        .layout(TableLayoutType::Fixed)
    }

    fn build(&self, certificate: &Certificate, issued_on: NaiveDate) -> Docx {
        let fonts = RunFonts::new().ascii(FONT).hi_ansi(FONT).east_asia(FONT).cs(FONT);
        let mut doc = Docx::new()
            .page_size(16838, 11906)
            .page_orient(PageOrientationType::Landscape)
            .page_margin(
                PageMargin::new()
                    .top(twips(2.0))
                    .bottom(twips(1.0))
                    .left(twips(2.0))
                    .right(twips(2.0)),
            )
            .default_fonts(fonts)
            .default_size(BODY_SIZE);

        // ── Page 1 ────────────────────────────────────────────────────────
        doc = doc
            .add_table(self.letterhead(certificate))
            .add_paragraph(
                tight(
                    Paragraph::new().add_run(Run::new().add_text(&certificate.metadata.issue_date)),
                )
                .align(AlignmentType::Right),
            )
            .add_paragraph(Paragraph::new())
            .add_paragraph(
                tight(Paragraph::new().add_run(Run::new().add_text(TITLE).bold()))
                    .align(AlignmentType::Center),
            )
            .add_paragraph(Paragraph::new())
            .add_paragraph(tight(Paragraph::new().add_run(Run::new().add_text(INTRO))));

        if let Some(ref a) = self.attestation {
            doc = doc
                .add_paragraph(Paragraph::new())
                .add_paragraph(Self::signature(&a.name));
        }

        doc = doc.add_paragraph(
            Paragraph::new().add_run(Run::new().add_break(BreakType::Page)),
        );

        // ── Page 2 ────────────────────────────────────────────────────────
        doc = doc
            .add_table(self.family_table(certificate))
            .add_paragraph(tight(
                Paragraph::new().add_run(Run::new().add_text(FOREIGN_USE)),
            ))
            .add_paragraph(Paragraph::new())
            .add_paragraph(tight(
                Paragraph::new()
                    .add_run(Run::new().add_text(SEALED_BY))
                    .align(AlignmentType::Right),
            ));

        let seal: Vec<&str> = certificate
            .metadata
            .seal_footer
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if !seal.is_empty() {
            doc = doc.add_paragraph(Paragraph::new());
            for line in seal {
                doc = doc.add_paragraph(tight(
                    Paragraph::new().add_run(Run::new().add_text(line).italic().size(SMALL_SIZE)),
                ));
            }
        }

        doc = doc.add_paragraph(Paragraph::new()).add_paragraph(tight(
            Paragraph::new().add_run(multiline_run(&AUTOMATED_NOTE[..]).italic().size(SMALL_SIZE)),
        ));

        if let Some(ref a) = self.attestation {
            doc = doc
                .add_paragraph(Paragraph::new())
                .add_table(Self::attestation_box(a, issued_on))
                .add_paragraph(Paragraph::new())
                .add_paragraph(Self::signature(&a.name));
        }

        doc
    }
}

impl DocumentRenderer for DocxRenderer {
    fn render(
        &self,
        certificate: &Certificate,
        issued_on: NaiveDate,
    ) -> Result<Vec<u8>, CertError> {
        let mut buf = Cursor::new(Vec::new());
        self.build(certificate, issued_on)
            .build()
            .pack(&mut buf)
            .map_err(|e| CertError::RenderFailed(e.to_string()))?;
        let bytes = buf.into_inner();
        debug!(
            "Rendered DOCX: {} records, {} bytes",
            certificate.records.len(),
            bytes.len()
        );
        Ok(bytes)
    }
}

/// Zero paragraph spacing, single line height.
fn tight(p: Paragraph) -> Paragraph {
    p.line_spacing(LineSpacing::new().before(0).after(0).line(240))
}

/// One run with a line break between each entry.
fn multiline_run<S: AsRef<str>>(lines: &[S]) -> Run {
    let mut run = Run::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            run = run.add_break(BreakType::TextWrapping);
        }
        run = run.add_text(line.as_ref());
    }
    run
}

fn centred_cell(run: Run, width: usize) -> TableCell {
    TableCell::new()
        .width(width, WidthType::Dxa)
        .vertical_align(VAlignType::Center)
        .add_paragraph(Paragraph::new().add_run(run).align(AlignmentType::Center))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CertificateMetadata, FamilyRecord};
    use std::io::Read;

    fn document_xml(docx: &[u8]) -> String {
        let mut archive = zip::ZipArchive::new(Cursor::new(docx)).unwrap();
        let mut xml = String::new();
        archive
            .by_name("word/document.xml")
            .unwrap()
            .read_to_string(&mut xml)
            .unwrap();
        xml
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 1).unwrap()
    }

    #[test]
    fn empty_certificate_renders() {
        let bytes = DocxRenderer::default()
            .render(&Certificate::default(), day())
            .unwrap();
        assert!(bytes.starts_with(b"PK"));
        let xml = document_xml(&bytes);
        assert!(xml.contains(TITLE));
        assert!(xml.contains("10. Numero Personale"));
        assert!(!xml.contains("Ufficio di Stato Civile"));
        // Printed whether or not the scan carried a stamp.
        assert!(xml.contains(SEALED_BY));
        let foreign_use = xml.find("rilasciato per uso").unwrap();
        assert!(foreign_use < xml.find(SEALED_BY).unwrap());
    }

    #[test]
    fn records_and_metadata_appear() {
        let cert = Certificate {
            header: vec![],
            records: vec![FamilyRecord {
                sequence: 1,
                full_name: "Arben Hoxha".into(),
                sex: "M".into(),
                relation: "Capofamiglia".into(),
                date_of_birth: "05/1990".into(),
                ..Default::default()
            }],
            metadata: CertificateMetadata {
                comune: "Durrës".into(),
                sezione: "Nr. 2".into(),
                issue_date: "12.03.2021".into(),
                seal_footer: "Timbrato elettronicamente dalla Direzione\n\
                              Generale dello Stato Civile\n\
                              In data: 2022/05/10\n\
                              0123456789abcdef0123456789abcdef"
                    .into(),
            },
            untranslated: vec![],
        };
        let xml = document_xml(&DocxRenderer::default().render(&cert, day()).unwrap());
        for needle in [
            "Arben Hoxha",
            "Capofamiglia",
            "05/1990",
            "Ufficio di Stato Civile Comune di Durrës",
            "Sezione Amministrativa Nr. 2",
            "12.03.2021",
            "In data: 2022/05/10",
            "0123456789abcdef0123456789abcdef",
        ] {
            assert!(xml.contains(needle), "missing {needle:?}");
        }
    }

    #[test]
    fn attestation_is_dated_and_signed() {
        let renderer = DocxRenderer::new(
            Some(TranslatorAttestation {
                name: "Mira Kola".into(),
                certificate_number: "777".into(),
                certificate_date: "01.01.2023".into(),
                feminine: true,
            }),
            None,
        );
        let xml = document_xml(&renderer.render(&Certificate::default(), day()).unwrap());
        assert!(xml.contains("Mira Kola"));
        assert!(xml.contains("numero di certificato 777"));
        assert!(xml.contains("traduttrice ufficiale"));
        assert!(xml.contains("In data 01.09.2024."));
        assert!(xml.contains("Traduzione eseguita da:"));
    }

    #[test]
    fn geometry_helpers() {
        assert_eq!(twips(2.0), 1134);
        assert_eq!(emu(1.0), 360_000);
        assert_eq!(COLUMN_CAPTIONS.len(), COLUMN_WIDTHS_CM.len());
    }
}
