//! Input validation: turn a user-supplied path into a readable local PDF.
//!
//! The source bundle is only ever read. We check existence, read permission
//! and the `%PDF` magic bytes before anything is parsed so the caller gets a
//! precise error instead of a parser failure deep inside lopdf.

use crate::error::PdfSplitError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate `input` and return it as a path.
pub fn resolve_input(input: impl AsRef<Path>) -> Result<PathBuf, PdfSplitError> {
    let path = input.as_ref().to_path_buf();

    if !path.is_file() {
        return Err(PdfSplitError::FileNotFound { path });
    }

    match std::fs::File::open(&path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            match f.read_exact(&mut magic) {
                Ok(()) if &magic == b"%PDF" => {}
                Ok(()) => return Err(PdfSplitError::NotAPdf { path, magic }),
                // Shorter than four bytes: cannot be a PDF either.
                Err(_) => return Err(PdfSplitError::NotAPdf { path, magic }),
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfSplitError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(PdfSplitError::FileNotFound { path });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file() {
        let err = resolve_input("/definitely/not/here.pdf").unwrap_err();
        assert!(matches!(err, PdfSplitError::FileNotFound { .. }));
    }

    #[test]
    fn directory_is_not_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve_input(dir.path()).unwrap_err();
        assert!(matches!(err, PdfSplitError::FileNotFound { .. }));
    }

    #[test]
    fn wrong_magic() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"PK\x03\x04zip").unwrap();
        let err = resolve_input(f.path()).unwrap_err();
        match err {
            PdfSplitError::NotAPdf { magic, .. } => assert_eq!(&magic, b"PK\x03\x04"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[test]
    fn too_short() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%P").unwrap();
        assert!(matches!(
            resolve_input(f.path()).unwrap_err(),
            PdfSplitError::NotAPdf { .. }
        ));
    }

    #[test]
    fn pdf_header_accepted() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"%PDF-1.7\n").unwrap();
        assert_eq!(resolve_input(f.path()).unwrap(), f.path());
    }
}
