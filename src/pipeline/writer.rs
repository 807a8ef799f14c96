//! Document output: normalised filename, collision handling, atomic page copy.
//!
//! ## Why write to a temp file first?
//!
//! A crash or a failed page copy halfway through must never leave a truncated
//! PDF under a real letter name, where it would be indistinguishable from a
//! good one. Pages are written next to the target and renamed into place only
//! after the copy succeeded.

use crate::config::CollisionPolicy;
use crate::error::ToolError;
use crate::output::{RawMetadata, SavedDocument};
use crate::pipeline::normalize::MetadataNormalizer;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Produce a new PDF containing exactly the given source pages, in order.
pub trait PageCopy: Send + Sync {
    /// Write `indices` (0-based, in the given order) to `dest`.
    fn write_pages(&self, indices: &[usize], dest: &Path) -> Result<(), ToolError>;
}

/// Writes split documents into the output directory.
#[derive(Clone)]
pub struct DocumentWriter {
    copier: Arc<dyn PageCopy>,
    output_dir: PathBuf,
    normalizer: MetadataNormalizer,
    collision: CollisionPolicy,
}

impl fmt::Debug for DocumentWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentWriter")
            .field("output_dir", &self.output_dir)
            .field("normalizer", &self.normalizer)
            .field("collision", &self.collision)
            .finish()
    }
}

impl DocumentWriter {
    pub fn new(
        copier: Arc<dyn PageCopy>,
        output_dir: impl Into<PathBuf>,
        normalizer: MetadataNormalizer,
        collision: CollisionPolicy,
    ) -> Self {
        Self {
            copier,
            output_dir: output_dir.into(),
            normalizer,
            collision,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `page_indices` as one document named after `metadata`.
    ///
    /// Pages are written in the order given; the caller is responsible for
    /// ascending order. An empty selection fails with
    /// [`ToolError::EmptySelection`] and touches nothing on disk.
    pub fn save(
        &self,
        page_indices: &[usize],
        metadata: &RawMetadata,
    ) -> Result<SavedDocument, ToolError> {
        if page_indices.is_empty() {
            return Err(ToolError::EmptySelection);
        }

        let metadata = self.normalizer.normalize(metadata);
        let path = self.target_path(&metadata.file_stem())?;

        std::fs::create_dir_all(&self.output_dir).map_err(|e| ToolError::WriteFailed {
            path: self.output_dir.display().to_string(),
            detail: e.to_string(),
        })?;

        let tmp = tempfile::Builder::new()
            .prefix(".pdfsplit-")
            .suffix(".pdf.tmp")
            .tempfile_in(&self.output_dir)
            .map_err(|e| ToolError::WriteFailed {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;

        self.copier.write_pages(page_indices, tmp.path())?;

        tmp.persist(&path).map_err(|e| ToolError::WriteFailed {
            path: path.display().to_string(),
            detail: e.error.to_string(),
        })?;

        info!(
            "Saved pages {:?} → {}",
            page_indices,
            path.display()
        );

        Ok(SavedDocument {
            path,
            pages: page_indices.to_vec(),
            metadata,
        })
    }

    /// Resolve the output path for `stem` under the collision policy.
    fn target_path(&self, stem: &str) -> Result<PathBuf, ToolError> {
        let first = self.output_dir.join(format!("{stem}.pdf"));
        if !first.exists() {
            return Ok(first);
        }

        match self.collision {
            CollisionPolicy::Overwrite => {
                warn!("Overwriting existing output {}", first.display());
                Ok(first)
            }
            CollisionPolicy::Fail => Err(ToolError::FilenameCollision {
                path: first.display().to_string(),
            }),
            CollisionPolicy::Suffix => {
                let path = (2..)
                    .map(|n| self.output_dir.join(format!("{stem}-{n}.pdf")))
                    .find(|p| !p.exists())
                    .unwrap_or(first);
                warn!("Output name taken, using {}", path.display());
                Ok(path)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records requested copies and writes a marker file.
    #[derive(Default)]
    struct RecordingCopier {
        calls: Mutex<Vec<Vec<usize>>>,
    }

    impl PageCopy for RecordingCopier {
        fn write_pages(&self, indices: &[usize], dest: &Path) -> Result<(), ToolError> {
            self.calls.lock().unwrap().push(indices.to_vec());
            std::fs::write(dest, format!("{indices:?}")).unwrap();
            Ok(())
        }
    }

    struct FailingCopier;

    impl PageCopy for FailingCopier {
        fn write_pages(&self, _indices: &[usize], dest: &Path) -> Result<(), ToolError> {
            Err(ToolError::WriteFailed {
                path: dest.display().to_string(),
                detail: "disk full".into(),
            })
        }
    }

    fn meta() -> RawMetadata {
        RawMetadata {
            date: Some("20250101".into()),
            company: Some("ACME".into()),
            title: Some("Invoice".into()),
        }
    }

    fn writer(copier: Arc<dyn PageCopy>, dir: &Path, policy: CollisionPolicy) -> DocumentWriter {
        DocumentWriter::new(copier, dir, MetadataNormalizer::new(), policy)
    }

    #[test]
    fn saves_with_normalised_name() {
        let dir = tempfile::tempdir().unwrap();
        let copier = Arc::new(RecordingCopier::default());
        let w = writer(copier.clone(), dir.path(), CollisionPolicy::Suffix);

        let saved = w.save(&[0, 1], &meta()).unwrap();

        assert_eq!(saved.path, dir.path().join("20250101-ACME-Invoice.pdf"));
        assert_eq!(std::fs::read_to_string(&saved.path).unwrap(), "[0, 1]");
        assert_eq!(*copier.calls.lock().unwrap(), vec![vec![0, 1]]);
    }

    #[test]
    fn empty_selection_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let copier = Arc::new(RecordingCopier::default());
        let w = writer(copier.clone(), dir.path(), CollisionPolicy::Suffix);

        assert_eq!(w.save(&[], &meta()).unwrap_err(), ToolError::EmptySelection);
        assert!(copier.calls.lock().unwrap().is_empty());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn order_is_passed_through_unsorted() {
        let dir = tempfile::tempdir().unwrap();
        let copier = Arc::new(RecordingCopier::default());
        let w = writer(copier.clone(), dir.path(), CollisionPolicy::Suffix);

        w.save(&[4, 2], &meta()).unwrap();
        assert_eq!(*copier.calls.lock().unwrap(), vec![vec![4, 2]]);
    }

    #[test]
    fn collision_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(
            Arc::new(RecordingCopier::default()),
            dir.path(),
            CollisionPolicy::Suffix,
        );

        let a = w.save(&[0], &meta()).unwrap();
        let b = w.save(&[1], &meta()).unwrap();
        let c = w.save(&[2], &meta()).unwrap();

        assert_eq!(a.path.file_name().unwrap(), "20250101-ACME-Invoice.pdf");
        assert_eq!(b.path.file_name().unwrap(), "20250101-ACME-Invoice-2.pdf");
        assert_eq!(c.path.file_name().unwrap(), "20250101-ACME-Invoice-3.pdf");
        assert_eq!(std::fs::read_to_string(&a.path).unwrap(), "[0]");
    }

    #[test]
    fn collision_fail_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let copier: Arc<dyn PageCopy> = Arc::new(RecordingCopier::default());

        writer(copier.clone(), dir.path(), CollisionPolicy::Fail)
            .save(&[0], &meta())
            .unwrap();
        let err = writer(copier.clone(), dir.path(), CollisionPolicy::Fail)
            .save(&[1], &meta())
            .unwrap_err();
        assert!(matches!(err, ToolError::FilenameCollision { .. }));

        let saved = writer(copier, dir.path(), CollisionPolicy::Overwrite)
            .save(&[1], &meta())
            .unwrap();
        assert_eq!(std::fs::read_to_string(saved.path).unwrap(), "[1]");
    }

    #[test]
    fn failed_copy_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(Arc::new(FailingCopier), dir.path(), CollisionPolicy::Suffix);

        let err = w.save(&[0], &meta()).unwrap_err();
        assert!(err.to_string().contains("disk full"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn missing_metadata_uses_sentinels() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(
            Arc::new(RecordingCopier::default()),
            dir.path(),
            CollisionPolicy::Suffix,
        );
        let saved = w.save(&[0], &RawMetadata::default()).unwrap();
        assert_eq!(
            saved.path.file_name().unwrap(),
            "unknown_date-UnknownCompany-untitled.pdf"
        );
    }
}
