//! Error types for the edgequake-pdfsplit library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PdfSplitError`] — **Fatal**: the run cannot start or must stop
//!   (missing source file, unreadable PDF, provider not configured, or the
//!   `halt` backend-failure policy fired). Returned as `Err(PdfSplitError)`
//!   from the top-level `split*` functions.
//!
//! * [`ToolError`] — **Non-fatal**: one tool invocation failed (page index out
//!   of range, empty selection, case memory unreachable, unknown tool name).
//!   It is rendered into a tool-result message and fed back to the agent, and
//!   the page walk continues.
//!
//! Keeping in-loop failures out of `PdfSplitError` means the controller can
//! never abort a half-finished run because of a single bad tool call.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfsplit library.
#[derive(Debug, Error)]
pub enum PdfSplitError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// The PDF parsed but has no pages to walk.
    #[error("PDF '{path}' has no pages")]
    EmptyPdf { path: PathBuf },

    // ── Backend errors ────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The reasoning backend kept failing and the policy is `halt`.
    #[error("Reasoning backend failed at page {page} after {attempts} attempts: {detail}")]
    BackendHalted {
        page: usize,
        attempts: u32,
        detail: String,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write a split document outside the agent loop.
    #[error("Failed to write output file '{path}': {detail}")]
    OutputWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single tool invocation.
///
/// Its `Display` text is what the agent sees in the tool-result message, so
/// messages are phrased for the model as much as for the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
pub enum ToolError {
    /// Page index outside `[0, total)`.
    #[error("Error: page index {index} is out of bounds (document has {total} pages)")]
    OutOfBounds { index: usize, total: usize },

    /// Text extraction for an existing page failed.
    #[error("Error reading page {index}: {detail}")]
    ExtractionFailed { index: usize, detail: String },

    /// Case memory or embedding backend missing or unreachable.
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Reasoning backend call failed (after retries).
    #[error("Reasoning backend error after {attempts} attempts: {detail}")]
    TransientBackend { attempts: u32, detail: String },

    /// `save_document` was requested with no pages.
    #[error("Error: no page indices provided to save")]
    EmptySelection,

    /// The agent asked for a tool outside the fixed vocabulary.
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Tool arguments did not match the declared schema.
    #[error("Invalid arguments for {tool}: {detail}")]
    InvalidArguments { tool: String, detail: String },

    /// The operator prompt could not be answered (stdin closed, timeout).
    #[error("Human confirmation failed: {0}")]
    HumanInput(String),

    /// Page copy or file write failed.
    #[error("Error saving PDF to {path}: {detail}")]
    WriteFailed { path: String, detail: String },

    /// Target filename exists and the collision policy is `fail`.
    #[error("Refusing to overwrite existing output file {path}")]
    FilenameCollision { path: String },
}

/// Failure of a single reasoning backend call, before retry handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The call did not finish within `api_timeout_secs`.
    #[error("backend call timed out after {0}s")]
    Timeout(u64),

    /// The provider returned an error (HTTP, auth, rate limit, …).
    #[error("{0}")]
    Provider(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_display() {
        let e = ToolError::OutOfBounds { index: 7, total: 5 };
        let msg = e.to_string();
        assert!(msg.contains("7"), "got: {msg}");
        assert!(msg.contains("5 pages"), "got: {msg}");
    }

    #[test]
    fn unknown_tool_display() {
        let e = ToolError::UnknownTool("delete_everything".into());
        assert_eq!(e.to_string(), "Unknown tool: delete_everything");
    }

    #[test]
    fn backend_halted_display() {
        let e = PdfSplitError::BackendHalted {
            page: 3,
            attempts: 2,
            detail: "connection refused".into(),
        };
        let msg = e.to_string();
        assert!(msg.contains("page 3"));
        assert!(msg.contains("connection refused"));
    }

    #[test]
    fn tool_error_round_trips_through_json() {
        let e = ToolError::InvalidArguments {
            tool: "save_document".into(),
            detail: "missing field `page_indices`".into(),
        };
        let json = serde_json::to_string(&e).unwrap();
        let back: ToolError = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
    }
}
