//! The agent's tool vocabulary: JSON-schema declarations and argument parsing.
//!
//! The set is closed. A tool name the model invents is surfaced as
//! [`ToolError::UnknownTool`] in its tool result; arguments that do not fit
//! the declared schema become [`ToolError::InvalidArguments`]. Neither stops
//! the run.

use crate::backend::ToolSpec;
use crate::error::ToolError;
use crate::output::RawMetadata;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

pub const READ_CONSECUTIVE_PAGES: &str = "read_consecutive_pages";
pub const SEARCH_FOR_SIMILAR_CASES: &str = "search_for_similar_cases";
pub const ASK_HUMAN_FOR_CONFIRMATION: &str = "ask_human_for_confirmation";
pub const EXTRACT_METADATA: &str = "extract_metadata";
pub const SAVE_DOCUMENT: &str = "save_document";

/// A parsed, validated tool request.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolInvocation {
    ReadConsecutivePages {
        current_page_index: usize,
    },
    SearchForSimilarCases {
        current_page_text: String,
        next_page_text: String,
    },
    AskHumanForConfirmation {
        question: String,
    },
    ExtractMetadata {
        current_page_text: String,
        next_page_text: String,
    },
    SaveDocument {
        page_indices: Vec<usize>,
        metadata: RawMetadata,
    },
}

#[derive(Deserialize)]
struct ReadArgs {
    #[serde(alias = "page_index", alias = "index")]
    current_page_index: usize,
}

#[derive(Deserialize)]
struct PairArgs {
    #[serde(alias = "current_page", alias = "current_text")]
    current_page_text: String,
    #[serde(default, alias = "next_page", alias = "next_text")]
    next_page_text: String,
}

#[derive(Deserialize)]
struct AskArgs {
    #[serde(alias = "prompt", alias = "message")]
    question: String,
}

#[derive(Deserialize)]
struct SaveArgs {
    #[serde(alias = "pages")]
    page_indices: Vec<usize>,
}

impl ToolInvocation {
    /// Parse a model-requested call.
    pub fn parse(name: &str, arguments: &Value) -> Result<Self, ToolError> {
        // Some models double-encode: the arguments object arrives as a JSON string.
        let decoded;
        let args = match arguments {
            Value::String(raw) => {
                decoded = serde_json::from_str::<Value>(raw).map_err(|e| {
                    ToolError::InvalidArguments {
                        tool: name.to_string(),
                        detail: format!("arguments are not a JSON object: {e}"),
                    }
                })?;
                &decoded
            }
            other => other,
        };

        match name {
            READ_CONSECUTIVE_PAGES => {
                let a: ReadArgs = from_args(name, args)?;
                Ok(Self::ReadConsecutivePages {
                    current_page_index: a.current_page_index,
                })
            }
            SEARCH_FOR_SIMILAR_CASES => {
                let a: PairArgs = from_args(name, args)?;
                Ok(Self::SearchForSimilarCases {
                    current_page_text: a.current_page_text,
                    next_page_text: a.next_page_text,
                })
            }
            ASK_HUMAN_FOR_CONFIRMATION => {
                let a: AskArgs = from_args(name, args)?;
                Ok(Self::AskHumanForConfirmation {
                    question: a.question,
                })
            }
            EXTRACT_METADATA => {
                let a: PairArgs = from_args(name, args)?;
                Ok(Self::ExtractMetadata {
                    current_page_text: a.current_page_text,
                    next_page_text: a.next_page_text,
                })
            }
            SAVE_DOCUMENT => {
                let a: SaveArgs = from_args(name, args)?;
                // Nested `metadata` object first, flat date/company/title keys fill gaps.
                let nested = args.get("metadata").map(RawMetadata::from).unwrap_or_default();
                Ok(Self::SaveDocument {
                    page_indices: a.page_indices,
                    metadata: nested.or(&RawMetadata::from(args)),
                })
            }
            other => Err(ToolError::UnknownTool(other.to_string())),
        }
    }

    /// The wire name of this tool.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ReadConsecutivePages { .. } => READ_CONSECUTIVE_PAGES,
            Self::SearchForSimilarCases { .. } => SEARCH_FOR_SIMILAR_CASES,
            Self::AskHumanForConfirmation { .. } => ASK_HUMAN_FOR_CONFIRMATION,
            Self::ExtractMetadata { .. } => EXTRACT_METADATA,
            Self::SaveDocument { .. } => SAVE_DOCUMENT,
        }
    }
}

fn from_args<T: DeserializeOwned>(tool: &str, args: &Value) -> Result<T, ToolError> {
    T::deserialize(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        detail: e.to_string(),
    })
}

/// Declarations sent with every agent turn.
pub fn tool_specs() -> Vec<ToolSpec> {
    let pair_params = json!({
        "type": "object",
        "properties": {
            "current_page_text": { "type": "string", "description": "Text of the current page." },
            "next_page_text": { "type": "string", "description": "Text of the next page." }
        },
        "required": ["current_page_text", "next_page_text"]
    });

    vec![
        ToolSpec {
            name: READ_CONSECUTIVE_PAGES,
            description: "Read the text of the current page and the page after it. \
                          After the last page the second part is '--- End of Document ---'.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "current_page_index": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "0-based index of the current page."
                    }
                },
                "required": ["current_page_index"]
            }),
        },
        ToolSpec {
            name: SEARCH_FOR_SIMILAR_CASES,
            description: "Look up the most similar past page pair and the split decision made for it.",
            parameters: pair_params.clone(),
        },
        ToolSpec {
            name: ASK_HUMAN_FOR_CONFIRMATION,
            description: "Ask the operator whether the next page starts a new document. \
                          Use only when still unsure after reading and searching.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "question": { "type": "string", "description": "Question shown to the operator." }
                },
                "required": ["question"]
            }),
        },
        ToolSpec {
            name: EXTRACT_METADATA,
            description: "Extract the letter date, sending company and subject from page text.",
            parameters: pair_params,
        },
        ToolSpec {
            name: SAVE_DOCUMENT,
            description: "Save the pages collected for the current document as one PDF. \
                          Call this when the next page starts a new document, and after the last page.",
            parameters: json!({
                "type": "object",
                "properties": {
                    "page_indices": {
                        "type": "array",
                        "items": { "type": "integer", "minimum": 0 },
                        "description": "0-based indices of the pages of the finished document."
                    },
                    "metadata": {
                        "type": "object",
                        "properties": {
                            "date": { "type": "string", "description": "Letter date as printed." },
                            "company": { "type": "string", "description": "Sending company." },
                            "title": { "type": "string", "description": "Subject of the letter." }
                        }
                    }
                },
                "required": ["page_indices", "metadata"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_declared_tool_parses_by_name() {
        let names: Vec<&str> = tool_specs().iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            [
                READ_CONSECUTIVE_PAGES,
                SEARCH_FOR_SIMILAR_CASES,
                ASK_HUMAN_FOR_CONFIRMATION,
                EXTRACT_METADATA,
                SAVE_DOCUMENT
            ]
        );
    }

    #[test]
    fn read_accepts_alias() {
        let t = ToolInvocation::parse(READ_CONSECUTIVE_PAGES, &json!({"page_index": 4})).unwrap();
        assert_eq!(t, ToolInvocation::ReadConsecutivePages { current_page_index: 4 });
    }

    #[test]
    fn negative_index_is_invalid() {
        let err = ToolInvocation::parse(READ_CONSECUTIVE_PAGES, &json!({"current_page_index": -1}))
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }

    #[test]
    fn unknown_tool() {
        let err = ToolInvocation::parse("delete_everything", &json!({})).unwrap_err();
        assert_eq!(err, ToolError::UnknownTool("delete_everything".into()));
    }

    #[test]
    fn save_with_nested_metadata() {
        let t = ToolInvocation::parse(
            SAVE_DOCUMENT,
            &json!({"page_indices": [0, 1], "metadata": {"date": "01.01.2025", "sender": "ACME", "title": "Invoice"}}),
        )
        .unwrap();
        match t {
            ToolInvocation::SaveDocument { page_indices, metadata } => {
                assert_eq!(page_indices, vec![0, 1]);
                assert_eq!(metadata.company.as_deref(), Some("ACME"));
                assert_eq!(metadata.date.as_deref(), Some("01.01.2025"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn save_with_flat_metadata_and_string_encoded_args() {
        let raw = r#"{"page_indices": [2], "company": "DB", "date": "2025-01-01", "subject": "Ticket"}"#;
        let t = ToolInvocation::parse(SAVE_DOCUMENT, &Value::String(raw.into())).unwrap();
        match t {
            ToolInvocation::SaveDocument { page_indices, metadata } => {
                assert_eq!(page_indices, vec![2]);
                assert_eq!(metadata.company.as_deref(), Some("DB"));
                assert_eq!(metadata.title.as_deref(), Some("Ticket"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn save_with_empty_indices_parses() {
        // Emptiness is a save-time error, not a schema error.
        let t = ToolInvocation::parse(SAVE_DOCUMENT, &json!({"page_indices": []})).unwrap();
        assert!(matches!(t, ToolInvocation::SaveDocument { ref page_indices, .. } if page_indices.is_empty()));
    }

    #[test]
    fn garbage_argument_text() {
        let err = ToolInvocation::parse(SAVE_DOCUMENT, &json!("{not json")).unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
