//! Page text access: single pages and the `(current, next)` pairs the agent reads.
//!
//! The controller never touches a PDF library directly. It goes through the
//! [`PageText`] capability so a scripted in-memory source can stand in for a
//! real document in tests, and so the lopdf and pdfium backends are
//! interchangeable.

use crate::error::ToolError;
use std::fmt;
use std::sync::Arc;

/// Marker the agent sees instead of a next page after the last one.
pub const END_OF_DOCUMENT: &str = "--- End of Document ---";

/// Extract text for one page of the source document.
pub trait PageText: Send + Sync {
    /// Number of pages in the source.
    fn page_count(&self) -> usize;

    /// Text of the 0-based page `index`. Implementations may assume
    /// `index < page_count()`; bounds are checked by [`PageTextSource`].
    fn page_text(&self, index: usize) -> Result<String, ToolError>;
}

/// Successor of the current page in a pair read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// Text of page `index + 1`.
    Text(String),
    /// `index` was the last page.
    EndOfDocument,
}

impl NextPage {
    /// Text to hand to similarity search and extraction.
    pub fn as_str(&self) -> &str {
        match self {
            NextPage::Text(t) => t,
            NextPage::EndOfDocument => END_OF_DOCUMENT,
        }
    }
}

/// Result of reading the pair starting at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagePair {
    pub index: usize,
    pub current: String,
    pub next: NextPage,
}

impl fmt::Display for PagePair {
    /// Tool-result rendering; page headers are 1-based for the model.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "--- Page {} Content ---\n{}\n\n",
            self.index + 1,
            self.current
        )?;
        match &self.next {
            NextPage::Text(t) => write!(f, "--- Page {} Content ---\n{}", self.index + 2, t),
            NextPage::EndOfDocument => f.write_str(END_OF_DOCUMENT),
        }
    }
}

/// Bounds-checked reader over a [`PageText`] capability.
#[derive(Clone)]
pub struct PageTextSource {
    inner: Arc<dyn PageText>,
}

impl fmt::Debug for PageTextSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageTextSource")
            .field("total_pages", &self.total_pages())
            .finish()
    }
}

impl PageTextSource {
    pub fn new(inner: Arc<dyn PageText>) -> Self {
        Self { inner }
    }

    pub fn total_pages(&self) -> usize {
        self.inner.page_count()
    }

    /// Text of one page, or `OutOfBounds`.
    pub fn read(&self, index: usize) -> Result<String, ToolError> {
        let total = self.total_pages();
        if index >= total {
            return Err(ToolError::OutOfBounds { index, total });
        }
        self.inner.page_text(index)
    }

    /// Read `index` and its successor. The last page pairs with
    /// [`NextPage::EndOfDocument`], which is not an error.
    pub fn read_pair(&self, index: usize) -> Result<PagePair, ToolError> {
        let current = self.read(index)?;
        let next = if index + 1 < self.total_pages() {
            NextPage::Text(self.inner.page_text(index + 1)?)
        } else {
            NextPage::EndOfDocument
        };
        Ok(PagePair {
            index,
            current,
            next,
        })
    }
}

/// In-memory page text, one string per page. Useful for tests and for
/// sources whose text was extracted elsewhere (e.g. an OCR sidecar).
#[derive(Debug, Clone, Default)]
pub struct StaticPages {
    pages: Vec<String>,
}

impl StaticPages {
    pub fn new<S: Into<String>>(pages: impl IntoIterator<Item = S>) -> Self {
        Self {
            pages: pages.into_iter().map(Into::into).collect(),
        }
    }
}

impl PageText for StaticPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ToolError> {
        self.pages
            .get(index)
            .cloned()
            .ok_or(ToolError::OutOfBounds {
                index,
                total: self.pages.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(n: usize) -> PageTextSource {
        PageTextSource::new(Arc::new(StaticPages::new(
            (0..n).map(|i| format!("text of page {i}")),
        )))
    }

    #[test]
    fn pair_in_the_middle() {
        let pair = source(3).read_pair(1).unwrap();
        assert_eq!(pair.current, "text of page 1");
        assert_eq!(pair.next, NextPage::Text("text of page 2".into()));
    }

    #[test]
    fn last_page_pairs_with_end_marker() {
        let pair = source(3).read_pair(2).unwrap();
        assert_eq!(pair.current, "text of page 2");
        assert_eq!(pair.next, NextPage::EndOfDocument);
        assert!(pair.to_string().ends_with(END_OF_DOCUMENT));
    }

    #[test]
    fn past_the_end_is_out_of_bounds() {
        let err = source(3).read_pair(3).unwrap_err();
        assert_eq!(err, ToolError::OutOfBounds { index: 3, total: 3 });
    }

    #[test]
    fn display_uses_one_based_headers() {
        let rendered = source(2).read_pair(0).unwrap().to_string();
        assert!(rendered.starts_with("--- Page 1 Content ---\ntext of page 0"));
        assert!(rendered.contains("--- Page 2 Content ---\ntext of page 1"));
    }
}
