//! Data model shared by the pipeline stages.
//!
//! [`Block`] mirrors the OCR backend's layout element closely enough that a
//! saved Textract response deserialises straight into it. Everything else is
//! built fresh per uploaded certificate and dropped once the document is
//! rendered.

use serde::{Deserialize, Serialize};

/// Kind of an OCR layout element. Kinds the extractor never reads collapse
/// into [`BlockType::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockType {
    Line,
    Word,
    Table,
    Cell,
    #[serde(other)]
    Other,
}

/// Relationship kind between blocks. Only `CHILD` edges are followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationshipType {
    Child,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Relationship {
    #[serde(rename = "Type")]
    pub kind: RelationshipType,
    #[serde(default)]
    pub ids: Vec<String>,
}

/// One OCR-detected layout element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Block {
    pub block_type: BlockType,
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relationships: Vec<Relationship>,
}

impl Block {
    /// Text of the block, or `""` for blocks that carry none.
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    /// Ids of all `CHILD` relationships, in order.
    pub fn child_ids(&self) -> impl Iterator<Item = &str> {
        self.relationships
            .iter()
            .filter(|r| r.kind == RelationshipType::Child)
            .flat_map(|r| r.ids.iter().map(String::as_str))
    }
}

/// One row of the family table, already translated into Italian.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyRecord {
    /// 1-based position in the fixed 10-row window.
    pub sequence: usize,
    pub full_name: String,
    pub father_name: String,
    pub mother_name: String,
    /// `"M"`, `"F"` or whatever the OCR read, upper-cased.
    pub sex: String,
    pub relation: String,
    /// Day/month/year joined with `/`, empty parts dropped.
    pub date_of_birth: String,
    pub marital_status: String,
    pub place_of_birth: String,
    pub citizenship: String,
    pub personal_number: String,
}

impl FamilyRecord {
    /// The ten rendered columns, in table order.
    pub fn columns(&self) -> [&str; 10] {
        [
            self.full_name.as_str(),
            self.father_name.as_str(),
            self.mother_name.as_str(),
            self.sex.as_str(),
            self.relation.as_str(),
            self.date_of_birth.as_str(),
            self.marital_status.as_str(),
            self.place_of_birth.as_str(),
            self.citizenship.as_str(),
            self.personal_number.as_str(),
        ]
    }

    /// True when every field read from the table is empty.
    pub fn is_blank(&self) -> bool {
        self.columns().iter().all(|c| c.is_empty())
    }
}

/// Header/footer data derived once per certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMetadata {
    pub comune: String,
    pub sezione: String,
    pub issue_date: String,
    /// Normalised four-line stamp text, or empty.
    pub seal_footer: String,
}

/// Record field that went through a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslatedField {
    Relation,
    MaritalStatus,
    Citizenship,
}

impl std::fmt::Display for TranslatedField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TranslatedField::Relation => "relation",
            TranslatedField::MaritalStatus => "marital status",
            TranslatedField::Citizenship => "citizenship",
        })
    }
}

/// A non-empty value that passed through untranslated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UntranslatedTerm {
    pub sequence: usize,
    pub field: TranslatedField,
    pub value: String,
}

impl std::fmt::Display for UntranslatedTerm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {} {}: {}", self.sequence, self.field, self.value)
    }
}

/// Everything extracted from one certificate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    /// Column captions from row 1 of the source table (Albanian).
    pub header: Vec<String>,
    pub records: Vec<FamilyRecord>,
    pub metadata: CertificateMetadata,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub untranslated: Vec<UntranslatedTerm>,
}

impl Certificate {
    /// Records that carry at least one value.
    pub fn populated_records(&self) -> impl Iterator<Item = &FamilyRecord> {
        self.records.iter().filter(|r| !r.is_blank())
    }
}
