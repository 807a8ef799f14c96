//! Progress-callback trait for page-walk events.
//!
//! Inject an [`Arc<dyn SplitProgressCallback>`] via
//! [`crate::config::SplitConfigBuilder::progress_callback`] to follow a run
//! as the controller walks the bundle. The CLI renders these events with an
//! `indicatif` bar; library users can forward them anywhere.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfsplit::{SplitConfig, SplitProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     saved: AtomicUsize,
//! }
//!
//! impl SplitProgressCallback for CountingCallback {
//!     fn on_document_saved(&self, pages: &[usize], path: &std::path::Path) {
//!         self.saved.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("{} pages → {}", pages.len(), path.display());
//!     }
//! }
//!
//! let config = SplitConfig::builder()
//!     .progress_callback(Arc::new(CountingCallback { saved: AtomicUsize::new(0) }))
//!     .build()
//!     .unwrap();
//! ```

use std::path::Path;

/// Called by the split controller as it walks the source PDF.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Events arrive sequentially from one task, but the
/// trait is `Send + Sync` so implementations can be shared with other threads.
pub trait SplitProgressCallback: Send + Sync {
    /// Called once before the first agent turn.
    fn on_split_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called when the cursor reaches a new page.
    ///
    /// # Arguments
    /// * `page_index`  — 0-based cursor position
    /// * `total_pages` — pages in the source
    fn on_page_start(&self, page_index: usize, total_pages: usize) {
        let _ = (page_index, total_pages);
    }

    /// Called for every tool invocation the agent requested, before it runs.
    fn on_tool_call(&self, page_index: usize, tool_name: &str) {
        let _ = (page_index, tool_name);
    }

    /// Called after a document was written.
    fn on_document_saved(&self, pages: &[usize], path: &Path) {
        let _ = (pages, path);
    }

    /// Called when a backend turn failed after all retries.
    fn on_backend_error(&self, page_index: usize, error: &str) {
        let _ = (page_index, error);
    }

    /// Called once after the walk terminated normally.
    fn on_split_complete(&self, total_pages: usize, documents_saved: usize) {
        let _ = (total_pages, documents_saved);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SplitProgressCallback for NoopProgressCallback {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[derive(Default)]
    struct TrackingCallback {
        pages: AtomicUsize,
        tools: AtomicUsize,
        saved: AtomicUsize,
    }

    impl SplitProgressCallback for TrackingCallback {
        fn on_page_start(&self, _page_index: usize, _total_pages: usize) {
            self.pages.fetch_add(1, Ordering::SeqCst);
        }

        fn on_tool_call(&self, _page_index: usize, _tool_name: &str) {
            self.tools.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_saved(&self, _pages: &[usize], _path: &Path) {
            self.saved.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_split_start(3);
        cb.on_page_start(0, 3);
        cb.on_tool_call(0, "read_consecutive_pages");
        cb.on_document_saved(&[0, 1], Path::new("a.pdf"));
        cb.on_backend_error(1, "timeout");
        cb.on_split_complete(3, 1);
    }

    #[test]
    fn tracking_callback_through_arc_dyn() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: Arc<dyn SplitProgressCallback> = tracker.clone();

        cb.on_page_start(0, 2);
        cb.on_tool_call(0, "read_consecutive_pages");
        cb.on_tool_call(0, "save_document");
        cb.on_document_saved(&[0], Path::new("x.pdf"));
        cb.on_page_start(1, 2);

        assert_eq!(tracker.pages.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.tools.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.saved.load(Ordering::SeqCst), 1);
    }
}
