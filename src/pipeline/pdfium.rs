//! pdfium-backed PDF capability, enabled with the `pdfium` feature.
//!
//! pdfium extracts text from some producer quirks that lopdf misses
//! (Type3 fonts, odd CMaps). It needs the pdfium shared library at runtime
//! and is not async-safe, so every call happens on the blocking pool.
//!
//! `PdfDocument` borrows the `Pdfium` binding, so nothing pdfium-owned is
//! stored: text is extracted once on open and each save reopens the source.

use crate::error::{PdfSplitError, ToolError};
use crate::pipeline::pages::PageText;
use crate::pipeline::writer::PageCopy;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// A source PDF read through pdfium.
#[derive(Debug)]
pub struct PdfiumDocument {
    path: PathBuf,
    texts: Vec<Result<String, String>>,
}

impl PdfiumDocument {
    /// Load the PDF and extract the text of every page. Blocking.
    pub fn open(path: &Path) -> Result<Self, PdfSplitError> {
        let pdfium = Pdfium::default();
        let document =
            pdfium
                .load_pdf_from_file(path, None)
                .map_err(|e| PdfSplitError::CorruptPdf {
                    path: path.to_path_buf(),
                    detail: format!("{:?}", e),
                })?;

        let pages = document.pages();
        let total_pages = pages.len() as usize;
        if total_pages == 0 {
            return Err(PdfSplitError::EmptyPdf {
                path: path.to_path_buf(),
            });
        }
        info!("PDF loaded: {} pages", total_pages);

        let texts = (0..total_pages)
            .map(|idx| {
                let page = pages.get(idx as u16).map_err(|e| format!("{:?}", e))?;
                let text = page.text().map_err(|e| format!("{:?}", e))?;
                Ok(text.all())
            })
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            texts,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PageText for PdfiumDocument {
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

impl PageCopy for PdfiumDocument {
    fn write_pages(&self, indices: &[usize], dest: &Path) -> Result<(), ToolError> {
        let fail = |detail: String| ToolError::WriteFailed {
            path: dest.display().to_string(),
            detail,
        };

        let pdfium = Pdfium::default();
        let source = pdfium
            .load_pdf_from_file(&self.path, None)
            .map_err(|e| fail(format!("{:?}", e)))?;
        let mut target = pdfium
            .create_new_pdf()
            .map_err(|e| fail(format!("{:?}", e)))?;

        for (position, &idx) in indices.iter().enumerate() {
            if idx >= self.texts.len() {
                return Err(ToolError::OutOfBounds {
                    index: idx,
                    total: self.texts.len(),
                });
            }
            target
                .pages_mut()
                .copy_page_from_document(&source, idx as u16, position as u16)
                .map_err(|e| fail(format!("page {}: {:?}", idx + 1, e)))?;
        }

        target
            .save_to_file(dest)
            .map_err(|e| fail(format!("{:?}", e)))?;
        debug!("Wrote {} pages to {}", indices.len(), dest.display());
        Ok(())
    }
}
