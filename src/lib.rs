//! # edgequake-pdfsplit
//!
//! Split a scanned PDF that bundles many business letters into one PDF per
//! letter, using a tool-calling LLM agent to find the boundaries.
//!
//! ## How it works
//!
//! A controller walks the document page by page and keeps the pages of the
//! letter in progress. For every pair of consecutive pages the agent decides
//! whether the second page starts a new letter. It may read pages, search a
//! memory of earlier decisions, ask a human operator or extract metadata
//! before it commits by saving. Each saved letter is named
//! `{YYYYMMDD}-{Company}-{Title}.pdf`.
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input    validate path and %PDF magic
//!  ├─ 2. Parse    extract page text once (lopdf, spawn_blocking)
//!  ├─ 3. Walk     per page pair: agent turn → tools → continue / save
//!  ├─ 4. Write    normalize metadata, copy pages, atomic rename
//!  └─ 5. Flush    close the last letter if the agent did not
//! ```
//!
//! The controller, not the model, owns the page buffer: every page ends up
//! in exactly one output document, in order, whatever the agent replies.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfsplit::{split, SplitConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = SplitConfig::builder().output_dir("letters").build()?;
//!     let output = split("scans.pdf", &config).await?;
//!     for doc in &output.documents {
//!         println!("{:?} → {}", doc.pages, doc.path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `pdfsplit` binary (clap + anyhow + tracing-subscriber + indicatif) |
//! | `pdfium` | off     | Read and copy pages through pdfium instead of lopdf |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfsplit = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod backend;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod split;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use backend::{BackendReply, ChatTurn, EdgequakeBackend, ReasoningBackend, RequestedCall, Role, ToolSpec};
pub use config::{CollisionPolicy, OnBackendFailure, SplitConfig, SplitConfigBuilder};
pub use error::{BackendError, PdfSplitError, ToolError};
pub use output::{
    InspectReport, Metadata, PagePreview, RawMetadata, SavedDocument, SplitOutput, SplitStats,
};
pub use pipeline::human::HumanConfirmation;
pub use pipeline::memory::{CaseMemory, CaseStore, Embedder, InMemoryCaseStore, JsonlCaseStore};
pub use pipeline::pages::PageText;
pub use pipeline::writer::PageCopy;
pub use progress::{NoopProgressCallback, SplitProgressCallback};
pub use split::{inspect, split, split_sync, split_with, Phase, SplitController, SplitParts, SplitState};
