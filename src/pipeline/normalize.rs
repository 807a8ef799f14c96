//! Metadata normalisation: freeform date / company / title → filename parts.
//!
//! The agent (or the `extract_metadata` tool) reports whatever it read off the
//! letterhead: "18.08.2025", "Deutsche Bahn GmbH", "Ihre Rechnung #2025/08!!".
//! These functions turn that into stable filename components. Every function
//! here is pure and total: any input string, including the empty string,
//! yields exactly one output and never an error. A bad extraction therefore
//! degrades to a sentinel in the filename instead of blocking the save.

use crate::output::{Metadata, RawMetadata};
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Sentinel used when no date can be recovered.
pub const UNKNOWN_DATE: &str = "unknown_date";
/// Sentinel used when no company can be recovered.
pub const UNKNOWN_COMPANY: &str = "UnknownCompany";
/// Sentinel used when no title can be recovered.
pub const UNTITLED: &str = "untitled";

/// Date formats tried in order. Day-first variants come before year-first
/// ones because the source letters are European.
const DATE_FORMATS: &[&str] = &[
    "%d.%m.%Y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d", "%d.%m.%y",
    "%d %B %Y", "%B %d, %Y",
];

/// Known long company names and their short codes. Matched as a
/// case-insensitive substring of the (suffix-stripped) name.
const BUILTIN_ALIASES: &[(&str, &str)] = &[
    ("deutsche bahn", "DB"),
    ("deutsche post", "DP"),
    ("deutsche telekom", "Telekom"),
    ("deutsche rentenversicherung", "DRV"),
    ("techniker krankenkasse", "TK"),
    ("allgemeine ortskrankenkasse", "AOK"),
    ("bundesagentur für arbeit", "BA"),
    ("finanzamt", "Finanzamt"),
];

static RE_NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\W_]+").unwrap());
static RE_LEGAL_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\s*\bgmbh\.?\s*$").unwrap());

/// Canonicalises raw metadata. Holds the company alias table; everything
/// else is stateless.
#[derive(Debug, Clone, Default)]
pub struct MetadataNormalizer {
    /// Extra `(needle, code)` pairs checked before the built-in table.
    extra_aliases: Vec<(String, String)>,
}

impl MetadataNormalizer {
    /// Normaliser with only the built-in alias table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Normaliser with additional aliases, e.g. from configuration.
    pub fn with_aliases(aliases: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            extra_aliases: aliases
                .into_iter()
                .map(|(needle, code)| (needle.to_lowercase(), code))
                .collect(),
        }
    }

    /// Normalise all three fields. Missing fields map to their sentinels.
    pub fn normalize(&self, raw: &RawMetadata) -> Metadata {
        Metadata {
            date: normalize_date(raw.date.as_deref().unwrap_or_default()),
            company: self.shorten_company(raw.company.as_deref().unwrap_or_default()),
            title: sanitize_title(raw.title.as_deref().unwrap_or_default()),
        }
    }

    /// [`shorten_company`] with this normaliser's extra aliases.
    pub fn shorten_company(&self, raw: &str) -> String {
        shorten_company_with(raw, &self.extra_aliases)
    }
}

/// Convert a freeform date into `YYYYMMDD`.
///
/// Fallback chain when no known format parses:
/// 1. take the first 8 digits; if they start with `19`/`20` they are already
///    `YYYYMMDD`, otherwise they are read as `DDMMYYYY` and reordered
/// 2. fewer than 8 digits: a sanitised copy of the input
/// 3. nothing left: [`UNKNOWN_DATE`]
pub fn normalize_date(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return UNKNOWN_DATE.to_string();
    }

    for fmt in DATE_FORMATS {
        match NaiveDate::parse_from_str(trimmed, fmt) {
            // `%Y` happily reads "24" as the year 24; leave those to `%y`.
            Ok(date) if (1900..=2100).contains(&date.year()) => {
                return date.format("%Y%m%d").to_string();
            }
            _ => {}
        }
    }

    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.len() >= 8 {
        let d = &digits[..8];
        if d.starts_with("19") || d.starts_with("20") {
            return d.to_string();
        }
        return format!("{}{}{}", &d[4..8], &d[2..4], &d[0..2]);
    }

    let fallback = sanitize(trimmed);
    if fallback.is_empty() {
        UNKNOWN_DATE.to_string()
    } else {
        fallback
    }
}

/// Shorten a company name to a short code using only the built-in aliases.
pub fn shorten_company(raw: &str) -> String {
    shorten_company_with(raw, &[])
}

fn shorten_company_with(raw: &str, extra: &[(String, String)]) -> String {
    let stripped = RE_LEGAL_SUFFIX.replace(raw.trim(), "");
    let stripped = stripped.trim();
    if stripped.is_empty() {
        return UNKNOWN_COMPANY.to_string();
    }

    let lower = stripped.to_lowercase();
    if let Some((_, code)) = extra.iter().find(|(needle, _)| lower.contains(needle.as_str())) {
        return code.clone();
    }
    if let Some((_, code)) = BUILTIN_ALIASES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
    {
        return (*code).to_string();
    }

    let words: Vec<&str> = RE_NON_WORD
        .split(stripped)
        .filter(|w| !w.is_empty())
        .collect();

    match words.as_slice() {
        [] => UNKNOWN_COMPANY.to_string(),
        [single] => (*single).to_string(),
        many => many
            .iter()
            .take(3)
            .filter_map(|w| w.chars().next())
            .flat_map(char::to_uppercase)
            .collect(),
    }
}

/// Collapse every run of non-alphanumeric characters into one underscore.
pub fn sanitize_title(raw: &str) -> String {
    let s = sanitize(raw);
    if s.is_empty() {
        UNTITLED.to_string()
    } else {
        s
    }
}

fn sanitize(raw: &str) -> String {
    RE_NON_WORD
        .replace_all(raw, "_")
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_day_first() {
        assert_eq!(normalize_date("18.08.2025"), "20250818");
        assert_eq!(normalize_date("18/08/2025"), "20250818");
        assert_eq!(normalize_date("18-08-2025"), "20250818");
    }

    #[test]
    fn date_iso() {
        assert_eq!(normalize_date("2025-08-18"), "20250818");
        assert_eq!(normalize_date("2025/08/18"), "20250818");
    }

    #[test]
    fn date_two_digit_year_and_month_name() {
        assert_eq!(normalize_date("01.02.24"), "20240201");
        assert_eq!(normalize_date("18 August 2025"), "20250818");
    }

    #[test]
    fn date_digit_fallbacks() {
        // Already ISO once the noise is stripped.
        assert_eq!(normalize_date("Datum: 2025 08 18"), "20250818");
        // Day-first digits get reordered.
        assert_eq!(normalize_date("am 18 08 2025 um 10:30"), "20250818");
        assert_eq!(normalize_date("YYYYMMDD"), "YYYYMMDD");
    }

    #[test]
    fn date_empty_and_garbage() {
        assert_eq!(normalize_date(""), UNKNOWN_DATE);
        assert_eq!(normalize_date("   "), UNKNOWN_DATE);
        assert_eq!(normalize_date("garbage"), "garbage");
        assert_eq!(normalize_date("?!"), UNKNOWN_DATE);
    }

    #[test]
    fn company_alias_and_suffix() {
        assert_eq!(shorten_company("Deutsche Bahn GmbH"), "DB");
        assert_eq!(shorten_company("DEUTSCHE BAHN Fernverkehr"), "DB");
        assert_eq!(shorten_company("Muster GmbH."), "Muster");
    }

    #[test]
    fn company_initials() {
        assert_eq!(shorten_company("Acme Corp"), "AC");
        assert_eq!(shorten_company("stadtwerke münchen energie service"), "SME");
        assert_eq!(shorten_company("Meier & Söhne"), "MS");
    }

    #[test]
    fn company_empty() {
        assert_eq!(shorten_company(""), UNKNOWN_COMPANY);
        assert_eq!(shorten_company("GmbH"), UNKNOWN_COMPANY);
    }

    #[test]
    fn company_extra_aliases_win() {
        let n = MetadataNormalizer::with_aliases([("Acme".to_string(), "ACME".to_string())]);
        assert_eq!(n.shorten_company("Acme Corp"), "ACME");
        assert_eq!(n.shorten_company("Deutsche Bahn"), "DB");
    }

    #[test]
    fn title_sanitised() {
        assert_eq!(sanitize_title("Invoice #2025/08!!"), "Invoice_2025_08");
        assert_eq!(sanitize_title("  Kündigung  Vertrag "), "Kündigung_Vertrag");
        assert_eq!(sanitize_title(""), UNTITLED);
        assert_eq!(sanitize_title("///"), UNTITLED);
    }

    #[test]
    fn normalisation_is_idempotent_per_input() {
        let n = MetadataNormalizer::new();
        let raw = RawMetadata {
            date: Some("18.08.2025".into()),
            company: Some("Deutsche Bahn GmbH".into()),
            title: Some("Fahrgastrechte".into()),
        };
        assert_eq!(n.normalize(&raw), n.normalize(&raw));
        assert_eq!(normalize_date("garbage"), normalize_date("garbage"));
    }

    #[test]
    fn missing_fields_become_sentinels() {
        let m = MetadataNormalizer::new().normalize(&RawMetadata::default());
        assert_eq!(m.date, UNKNOWN_DATE);
        assert_eq!(m.company, UNKNOWN_COMPANY);
        assert_eq!(m.title, UNTITLED);
    }
}
