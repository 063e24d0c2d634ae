//! Albanian → Italian glossary for the three free-text table columns.
//!
//! Lookups go through [`normalize`] on both sides: keys are normalized once
//! when the tables are built, inputs on every call. Casing, diacritics and
//! separator punctuation therefore never affect a match (`Bashkëshortja`,
//! `bashkeshortja` and `BASHKESHORTJA.` all hit the same entry).
//!
//! Unknown input is returned unchanged. Callers that need to know whether a
//! mapping existed use the `lookup_*` functions instead.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static RE_SEPARATORS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s.\-_/]+").unwrap());

/// Canonical lookup form: lowercase, accents removed, runs of whitespace and
/// `.`, `-`, `_`, `/` collapsed to one space, trimmed.
pub fn normalize(s: &str) -> String {
    let lowered = s.trim().to_lowercase();
    let stripped: String = lowered.nfd().filter(|c| !is_combining_mark(*c)).collect();
    RE_SEPARATORS.replace_all(&stripped, " ").trim().to_string()
}

/// Italian rendering of a glossary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rendering {
    /// Same word for both sexes.
    Invariant(&'static str),
    /// Gender-agreed pair.
    Gendered {
        masculine: &'static str,
        feminine: &'static str,
    },
}

impl Rendering {
    /// Pick the form agreeing with `sex`; anything but "F" is masculine.
    pub fn agree(self, sex: &str) -> &'static str {
        match self {
            Rendering::Invariant(word) => word,
            Rendering::Gendered { feminine, .. } if is_feminine(sex) => feminine,
            Rendering::Gendered { masculine, .. } => masculine,
        }
    }
}

fn is_feminine(sex: &str) -> bool {
    sex.trim().eq_ignore_ascii_case("f")
}

const fn pair(masculine: &'static str, feminine: &'static str) -> Rendering {
    Rendering::Gendered {
        masculine,
        feminine,
    }
}

const RELATIONS: &[(&str, &str)] = &[
    ("kryefamiljar", "Capofamiglia"),
    ("i biri", "Figlio"),
    ("biri", "Figlio"),
    ("e bija", "Figlia"),
    ("bija", "Figlia"),
    ("bashkeshortja", "Moglie"),
    ("bashkeshorti", "Marito"),
    ("gruaja", "Moglie"),
    ("burri", "Marito"),
    ("nipi", "Nipote (maschio)"),
    ("mbesa", "Nipote (femmina)"),
    ("babai", "Padre"),
    ("nena", "Madre"),
    ("gjyshi", "Nonno"),
    ("gjyshja", "Nonna"),
    ("vellai", "Fratello"),
    ("motra", "Sorella"),
];

const MARITAL_STATUSES: &[(&str, Rendering)] = &[
    ("i martuar", pair("Coniugato", "Coniugata")),
    ("e martuar", pair("Coniugato", "Coniugata")),
    ("i/e martuar", pair("Coniugato", "Coniugata")),
    ("beqar", pair("Celibe", "Nubile")),
    ("beqare", pair("Celibe", "Nubile")),
    ("beqar/e", pair("Celibe", "Nubile")),
    ("i/e ve", pair("Vedovo", "Vedova")),
    ("i ve", pair("Vedovo", "Vedova")),
    ("e ve", pair("Vedovo", "Vedova")),
    ("i/e divorcuar", pair("Divorziato", "Divorziata")),
    ("i/e ndare", pair("Separato", "Separata")),
];

const CITIZENSHIPS: &[(&str, Rendering)] = &[
    ("shqiptare", Rendering::Invariant("Albanese")),
    ("shqiptar", Rendering::Invariant("Albanese")),
    ("shqiptar/e", Rendering::Invariant("Albanese")),
    ("italian", pair("Italiano", "Italiana")),
    ("italiane", pair("Italiano", "Italiana")),
    ("grek", pair("Greco", "Greca")),
    ("greke", pair("Greco", "Greca")),
    ("francez", Rendering::Invariant("Francese")),
    ("franceze", Rendering::Invariant("Francese")),
];

fn index<V: Copy>(entries: &[(&str, V)]) -> HashMap<String, V> {
    entries.iter().map(|&(k, v)| (normalize(k), v)).collect()
}

static RELATION_INDEX: Lazy<HashMap<String, &'static str>> = Lazy::new(|| index(RELATIONS));
static MARITAL_INDEX: Lazy<HashMap<String, Rendering>> = Lazy::new(|| index(MARITAL_STATUSES));
static CITIZENSHIP_INDEX: Lazy<HashMap<String, Rendering>> = Lazy::new(|| index(CITIZENSHIPS));

/// Italian relation-to-head, or `None` when the term is unknown.
///
/// Relation words already carry their own gender (`biri` / `bija`), so the
/// sex column is not consulted.
pub fn lookup_relation(raw: &str) -> Option<&'static str> {
    RELATION_INDEX.get(&normalize(raw)).copied()
}

/// Italian marital status agreeing with `sex`, or `None` when unknown.
pub fn lookup_marital_status(raw: &str, sex: &str) -> Option<&'static str> {
    MARITAL_INDEX.get(&normalize(raw)).map(|r| r.agree(sex))
}

/// Italian citizenship adjective agreeing with `sex`, or `None` when unknown.
pub fn lookup_citizenship(raw: &str, sex: &str) -> Option<&'static str> {
    CITIZENSHIP_INDEX.get(&normalize(raw)).map(|r| r.agree(sex))
}

/// Translate a relation-to-head value; unknown values pass through.
pub fn translate_relation(raw: &str, _sex: &str) -> String {
    lookup_relation(raw).map_or_else(|| raw.to_string(), str::to_string)
}

/// Translate a marital status, agreeing with `sex`; unknown values pass through.
pub fn translate_marital_status(raw: &str, sex: &str) -> String {
    lookup_marital_status(raw, sex).map_or_else(|| raw.to_string(), str::to_string)
}

/// Translate a citizenship, agreeing with `sex` where Italian distinguishes;
/// unknown values pass through.
pub fn translate_citizenship(raw: &str, sex: &str) -> String {
    lookup_citizenship(raw, sex).map_or_else(|| raw.to_string(), str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_folds_case_accents_and_separators() {
        assert_eq!(normalize("  Bashkëshortja "), "bashkeshortja");
        assert_eq!(normalize("I/E  MARTUAR"), "i e martuar");
        assert_eq!(normalize("beqar_-/e."), "beqar e");
        assert_eq!(normalize("Çelës\tËshtë"), "celes eshte");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" ./- "), "");
    }

    #[test]
    fn normalize_is_idempotent() {
        let samples = [
            "Kryefamiljar",
            "  I/E   Divorcuar.. ",
            "Ë-ç_ë / x",
            "İstanbul",
            "ǅemal",
            "MBESA\u{00A0}e vogël",
            "---",
            "",
        ];
        for s in samples {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "input {s:?}");
        }
    }

    #[test]
    fn relation_lookup_ignores_spelling_variants() {
        assert_eq!(translate_relation("kryefamiljar", "M"), "Capofamiglia");
        assert_eq!(translate_relation("KRYEFAMILJAR", "M"), "Capofamiglia");
        assert_eq!(translate_relation("Bashkëshortja", "F"), "Moglie");
        assert_eq!(translate_relation("i  biri", ""), "Figlio");
        assert_eq!(translate_relation("Mbesa", "F"), "Nipote (femmina)");
    }

    #[test]
    fn unknown_terms_pass_through_unchanged() {
        assert_eq!(translate_relation("Kunata", "F"), "Kunata");
        assert_eq!(translate_marital_status("Bashkëjetesë", "M"), "Bashkëjetesë");
        assert_eq!(translate_citizenship("Kosovare", "F"), "Kosovare");
        assert_eq!(translate_citizenship("", "F"), "");
        assert_eq!(lookup_relation("Kunata"), None);
    }

    #[test]
    fn marital_status_agrees_with_sex() {
        assert_eq!(translate_marital_status("I martuar", "M"), "Coniugato");
        assert_eq!(translate_marital_status("I martuar", "F"), "Coniugata");
        assert_eq!(translate_marital_status("beqare", "f "), "Nubile");
        assert_eq!(translate_marital_status("beqare", "M"), "Celibe");
        assert_eq!(translate_marital_status("beqar", "?"), "Celibe");
        assert_eq!(translate_marital_status("beqar", ""), "Celibe");
    }

    #[test]
    fn slash_spelled_keys_match_after_normalization() {
        assert_eq!(translate_marital_status("i/e martuar", "F"), "Coniugata");
        assert_eq!(translate_marital_status("I/E DIVORCUAR", "M"), "Divorziato");
        assert_eq!(translate_marital_status("i/e ndarë", "F"), "Separata");
        assert_eq!(translate_citizenship("Shqiptar/e", "F"), "Albanese");
    }

    #[test]
    fn citizenship_invariant_and_gendered() {
        assert_eq!(translate_citizenship("Shqiptare", "F"), "Albanese");
        assert_eq!(translate_citizenship("shqiptar", "M"), "Albanese");
        assert_eq!(translate_citizenship("Italiane", "F"), "Italiana");
        assert_eq!(translate_citizenship("Italiane", "M"), "Italiano");
        assert_eq!(translate_citizenship("Greke", "X"), "Greco");
        assert_eq!(translate_citizenship("Franceze", "F"), "Francese");
    }

    #[test]
    fn gendered_lookups_report_unknown_terms() {
        assert_eq!(lookup_marital_status("E martuar", "F"), Some("Coniugata"));
        assert_eq!(lookup_marital_status("e fejuar", "F"), None);
        assert_eq!(lookup_citizenship("Italiane", "M"), Some("Italiano"));
        assert_eq!(lookup_citizenship("Marsiane", "M"), None);
    }
}
