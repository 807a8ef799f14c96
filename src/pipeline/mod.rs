//! Building blocks of a split run.
//!
//! Each submodule owns one capability the controller in [`crate::split`]
//! composes. Capabilities that touch the outside world sit behind a trait so
//! the controller runs against doubles in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ pdf ──▶ pages ──▶ agent ◀──▶ tools ──▶ writer
//! (path)   (lopdf)  (pairs)   (LLM)      (dispatch)  (normalize + copy)
//!                                │
//!                        memory ─┴─ human
//! ```
//!
//! 1. [`input`]  validate the source path and `%PDF` magic
//! 2. [`pdf`]    parse once, cache page text, copy page subsets
//! 3. [`pages`]  bounds-checked page and page-pair reads
//! 4. [`agent`]  one reasoning turn with retry and timeout, metadata extraction
//! 5. [`tools`]  tool schemas and argument parsing
//! 6. [`memory`] similar-case lookup and write-back
//! 7. [`human`]  operator yes/no confirmation
//! 8. [`normalize`] + [`writer`] canonical file names and atomic writes

pub mod agent;
pub mod human;
pub mod input;
pub mod memory;
pub mod normalize;
pub mod pages;
pub mod pdf;
#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod tools;
pub mod writer;
