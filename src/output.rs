//! Result and data-model types shared by the controller, the writer and the CLI.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;

// ── Metadata ─────────────────────────────────────────────────────────────

/// Letter metadata as the agent or the extraction call reported it.
///
/// Models are inconsistent about key names (`date` vs `datum`, `company` vs
/// `sender`/`from`, `title` vs `subject`/`heading`). All of that is coalesced
/// here, once, so nothing downstream branches on alias keys. Deserialisation
/// never fails: anything that is not a usable string becomes `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct RawMetadata {
    pub date: Option<String>,
    pub company: Option<String>,
    pub title: Option<String>,
}

const DATE_KEYS: &[&str] = &["date", "datum", "letter_date"];
const COMPANY_KEYS: &[&str] = &["company", "sender", "from", "absender"];
const TITLE_KEYS: &[&str] = &["title", "subject", "heading", "betreff"];

impl RawMetadata {
    /// True when no field carries a value.
    pub fn is_empty(&self) -> bool {
        self.date.is_none() && self.company.is_none() && self.title.is_none()
    }

    /// Fill missing fields from `other`, keeping our own where present.
    pub fn or(self, other: &RawMetadata) -> RawMetadata {
        RawMetadata {
            date: self.date.or_else(|| other.date.clone()),
            company: self.company.or_else(|| other.company.clone()),
            title: self.title.or_else(|| other.title.clone()),
        }
    }
}

impl From<Value> for RawMetadata {
    fn from(value: Value) -> Self {
        Self::from(&value)
    }
}

impl From<&Value> for RawMetadata {
    fn from(value: &Value) -> Self {
        let pick = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|k| match value.get(*k) {
                Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Some(Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
        };
        Self {
            date: pick(DATE_KEYS),
            company: pick(COMPANY_KEYS),
            title: pick(TITLE_KEYS),
        }
    }
}

/// Canonical metadata used to build the output filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    /// `YYYYMMDD`, a sanitised fallback, or `unknown_date`.
    pub date: String,
    /// Short company code or `UnknownCompany`.
    pub company: String,
    /// Underscore slug or `untitled`.
    pub title: String,
}

impl Metadata {
    /// `{date}-{company}-{title}` without extension.
    pub fn file_stem(&self) -> String {
        format!("{}-{}-{}", self.date, self.company, self.title)
    }
}

// ── Run output ───────────────────────────────────────────────────────────

/// One document written to the output directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedDocument {
    /// Where the PDF was written.
    pub path: PathBuf,
    /// 0-based source page indices, in output order.
    pub pages: Vec<usize>,
    /// Metadata the filename was built from.
    pub metadata: Metadata,
}

/// Counters for one split run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SplitStats {
    /// Pages in the source PDF.
    pub total_pages: usize,
    /// Documents written.
    pub documents_saved: usize,
    /// Reasoning turns requested (including retries counted once).
    pub agent_turns: usize,
    /// Tool invocations executed, successful or not.
    pub tool_calls: usize,
    /// Turns where the backend failed after all retries.
    pub backend_failures: usize,
    /// Times the operator was prompted.
    pub human_prompts: usize,
    /// Documents flushed by the controller because the agent skipped the final save.
    pub forced_saves: usize,
    /// Wall-clock duration of the run.
    pub duration_ms: u64,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitOutput {
    /// Written documents, in save order.
    pub documents: Vec<SavedDocument>,
    /// Run counters.
    pub stats: SplitStats,
}

// ── Inspection ───────────────────────────────────────────────────────────

const PREVIEW_CHARS: usize = 80;

/// One page of an [`InspectReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagePreview {
    /// 0-based page index.
    pub index: usize,
    /// Characters of extracted text.
    pub chars: usize,
    /// First non-blank line, truncated.
    pub first_line: String,
}

impl PagePreview {
    pub fn from_text(index: usize, text: &str) -> Self {
        let first_line = text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("")
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        Self {
            index,
            chars: text.chars().count(),
            first_line,
        }
    }
}

/// Page count and previews, produced without calling a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InspectReport {
    pub path: PathBuf,
    pub total_pages: usize,
    pub pages: Vec<PagePreview>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn aliases_are_coalesced() {
        let raw: RawMetadata =
            serde_json::from_value(json!({"datum": "18.08.2025", "sender": "ACME", "subject": "Invoice"}))
                .unwrap();
        assert_eq!(raw.date.as_deref(), Some("18.08.2025"));
        assert_eq!(raw.company.as_deref(), Some("ACME"));
        assert_eq!(raw.title.as_deref(), Some("Invoice"));
    }

    #[test]
    fn canonical_key_wins_over_alias() {
        let raw = RawMetadata::from(&json!({"company": "Primary", "from": "Secondary"}));
        assert_eq!(raw.company.as_deref(), Some("Primary"));
    }

    #[test]
    fn junk_values_become_none() {
        let raw = RawMetadata::from(&json!({"date": "", "company": null, "title": ["x"]}));
        assert!(raw.is_empty());
        let raw: RawMetadata = serde_json::from_str("\"not an object\"").unwrap();
        assert!(raw.is_empty());
    }

    #[test]
    fn numeric_dates_are_kept() {
        let raw = RawMetadata::from(&json!({"date": 20250101}));
        assert_eq!(raw.date.as_deref(), Some("20250101"));
    }

    #[test]
    fn or_fills_gaps_only() {
        let a = RawMetadata {
            date: Some("1".into()),
            ..Default::default()
        };
        let b = RawMetadata {
            date: Some("2".into()),
            title: Some("T".into()),
            ..Default::default()
        };
        let merged = a.or(&b);
        assert_eq!(merged.date.as_deref(), Some("1"));
        assert_eq!(merged.title.as_deref(), Some("T"));
        assert_eq!(merged.company, None);
    }

    #[test]
    fn file_stem_format() {
        let m = Metadata {
            date: "20250101".into(),
            company: "ACME".into(),
            title: "Invoice".into(),
        };
        assert_eq!(m.file_stem(), "20250101-ACME-Invoice");
    }

    #[test]
    fn preview_takes_first_non_blank_line() {
        let p = PagePreview::from_text(4, "\n   \n  Stadtwerke Musterstadt  \nRechnung");
        assert_eq!(p.index, 4);
        assert_eq!(p.first_line, "Stadtwerke Musterstadt");
        assert!(PagePreview::from_text(0, "").first_line.is_empty());
        assert_eq!(PagePreview::from_text(0, &"x".repeat(200)).first_line.len(), 80);
    }
}
