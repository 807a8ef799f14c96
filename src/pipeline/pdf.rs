//! lopdf-backed PDF capability: page text extraction and page-subset copies.
//!
//! ## Why extract all text up front?
//!
//! The agent re-reads pages freely (`read_consecutive_pages` for any index,
//! re-reads after a human answer). Parsing a 300-page scan once and caching
//! the per-page text keeps every later read O(1). The raw bytes are kept so
//! each saved document starts from a fresh parse of the source, which is
//! never modified.

use crate::error::{PdfSplitError, ToolError};
use crate::pipeline::pages::PageText;
use crate::pipeline::writer::PageCopy;
use lopdf::{Document, Object, ObjectId};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Guard against cyclic `Parent` chains in damaged files.
const MAX_TREE_DEPTH: usize = 64;

/// A source PDF parsed with lopdf.
#[derive(Debug)]
pub struct LopdfDocument {
    path: PathBuf,
    bytes: Vec<u8>,
    texts: Vec<Result<String, String>>,
}

impl LopdfDocument {
    /// Parse the PDF at `path` and extract the text of every page.
    ///
    /// Blocking; call from `spawn_blocking` in async code.
    pub fn open(path: &Path) -> Result<Self, PdfSplitError> {
        let bytes = std::fs::read(path).map_err(|e| PdfSplitError::CorruptPdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;
        Self::from_bytes(path, bytes)
    }

    /// Same as [`LopdfDocument::open`] for bytes already in memory.
    /// `path` is only used in error messages.
    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<Self, PdfSplitError> {
        let doc = Document::load_mem(&bytes).map_err(|e| PdfSplitError::CorruptPdf {
            path: path.to_path_buf(),
            detail: e.to_string(),
        })?;

        let page_numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        if page_numbers.is_empty() {
            return Err(PdfSplitError::EmptyPdf {
                path: path.to_path_buf(),
            });
        }

        let texts = page_numbers
            .iter()
            .map(|n| {
                doc.extract_text(&[*n]).map_err(|e| {
                    warn!("Text extraction failed for page {}: {}", n, e);
                    e.to_string()
                })
            })
            .collect::<Vec<_>>();

        info!("PDF loaded: {} pages", texts.len());
        Ok(Self {
            path: path.to_path_buf(),
            bytes,
            texts,
        })
    }

    /// Path the document was opened from.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageText for LopdfDocument {
    fn page_count(&self) -> usize {
        self.texts.len()
    }

    fn page_text(&self, index: usize) -> Result<String, ToolError> {
        match self.texts.get(index) {
            Some(Ok(text)) => Ok(text.clone()),
            Some(Err(detail)) => Err(ToolError::ExtractionFailed {
                index,
                detail: detail.clone(),
            }),
            None => Err(ToolError::OutOfBounds {
                index,
                total: self.texts.len(),
            }),
        }
    }
}

impl PageCopy for LopdfDocument {
    fn write_pages(&self, indices: &[usize], dest: &Path) -> Result<(), ToolError> {
        let fail = |detail: String| ToolError::WriteFailed {
            path: dest.display().to_string(),
            detail,
        };

        let mut doc = Document::load_mem(&self.bytes).map_err(|e| fail(e.to_string()))?;
        keep_pages(&mut doc, indices).map_err(fail)?;
        doc.save(dest).map_err(|e| fail(e.to_string()))?;

        debug!("Wrote {} pages → {}", indices.len(), dest.display());
        Ok(())
    }
}

/// Reduce `doc` to exactly `indices` (0-based), in that order.
///
/// The page tree is flattened into the root `Pages` node. Inheritable
/// attributes are copied onto each page first so nothing is lost when the
/// intermediate nodes are pruned.
pub(crate) fn keep_pages(doc: &mut Document, indices: &[usize]) -> Result<(), String> {
    let page_map = doc.get_pages();
    let ids = indices
        .iter()
        .map(|&i| {
            page_map
                .get(&(i as u32 + 1))
                .copied()
                .ok_or_else(|| format!("page index {i} not in source ({} pages)", page_map.len()))
        })
        .collect::<Result<Vec<ObjectId>, String>>()?;

    let root_id = doc
        .catalog()
        .and_then(|c| c.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|e| format!("missing page tree root: {e}"))?;

    for &id in &ids {
        inherit_attributes(doc, id).map_err(|e| e.to_string())?;
        doc.get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|e| e.to_string())?
            .set("Parent", Object::Reference(root_id));
    }

    let root = doc
        .get_object_mut(root_id)
        .and_then(Object::as_dict_mut)
        .map_err(|e| e.to_string())?;
    root.set(
        "Kids",
        Object::Array(ids.iter().map(|id| Object::Reference(*id)).collect()),
    );
    root.set("Count", Object::Integer(ids.len() as i64));

    doc.prune_objects();
    Ok(())
}

fn inherit_attributes(doc: &mut Document, page_id: ObjectId) -> Result<(), lopdf::Error> {
    let mut inherited: Vec<(&[u8], Object)> = Vec::new();
    {
        let page = doc.get_dictionary(page_id)?;
        let first_parent = page.get(b"Parent").and_then(Object::as_reference).ok();

        for key in INHERITABLE.iter().copied().filter(|k| !page.has(k)) {
            let mut cursor = first_parent;
            let mut depth = 0;
            while let Some(node_id) = cursor {
                if depth >= MAX_TREE_DEPTH {
                    break;
                }
                let node = doc.get_dictionary(node_id)?;
                if let Ok(value) = node.get(key) {
                    inherited.push((key, value.clone()));
                    break;
                }
                cursor = node.get(b"Parent").and_then(Object::as_reference).ok();
                depth += 1;
            }
        }
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in inherited {
        page.set(key, value);
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Stream};

    /// Build an in-memory PDF with one text line per page. Resources and
    /// MediaBox live on the root `Pages` node so inheritance is exercised.
    pub(crate) fn sample_pdf(lines: &[&str]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });

        let mut kids: Vec<Object> = Vec::new();
        for line in lines {
            let content = Content {
                operations: vec![
                    Operation::new("BT", vec![]),
                    Operation::new("Tf", vec!["F1".into(), 24.into()]),
                    Operation::new("Td", vec![72.into(), 700.into()]),
                    Operation::new("Tj", vec![Object::string_literal(*line)]),
                    Operation::new("ET", vec![]),
                ],
            };
            let content_id =
                doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    fn open(lines: &[&str]) -> LopdfDocument {
        LopdfDocument::from_bytes(Path::new("sample.pdf"), sample_pdf(lines)).unwrap()
    }

    #[test]
    fn extracts_text_per_page() {
        let doc = open(&["Invoice ACME", "Page two", "Letter DB"]);
        assert_eq!(doc.page_count(), 3);
        assert!(doc.page_text(0).unwrap().contains("Invoice ACME"));
        assert!(doc.page_text(2).unwrap().contains("Letter DB"));
    }

    #[test]
    fn not_a_pdf_is_corrupt() {
        let err = LopdfDocument::from_bytes(Path::new("x.pdf"), b"hello".to_vec()).unwrap_err();
        assert!(matches!(err, PdfSplitError::CorruptPdf { .. }));
    }

    #[test]
    fn write_subset_keeps_count_and_order() {
        let doc = open(&["alpha", "beta", "gamma", "delta"]);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("subset.pdf");

        doc.write_pages(&[3, 1], &out).unwrap();

        let written = Document::load(&out).unwrap();
        let pages = written.get_pages();
        assert_eq!(pages.len(), 2);
        assert!(written.extract_text(&[1]).unwrap().contains("delta"));
        assert!(written.extract_text(&[2]).unwrap().contains("beta"));
    }

    #[test]
    fn write_unknown_index_fails_without_file() {
        let doc = open(&["only"]);
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("bad.pdf");

        let err = doc.write_pages(&[5], &out).unwrap_err();
        assert!(matches!(err, ToolError::WriteFailed { .. }));
        assert!(!out.exists());
    }
}
