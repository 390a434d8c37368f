use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use sparlo_logging::sparlo_error;
use tempfile::NamedTempFile;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("export directory {path} is unusable: {reason}")]
    ExportDir { path: PathBuf, reason: String },
    #[error("{0} is a directory and cannot be replaced by an export")]
    TargetIsDir(PathBuf),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

/// Creates the export directory if needed and checks that it accepts files.
pub fn ensure_export_dir(dir: &Path) -> Result<(), PersistError> {
    let unusable = |reason: String| PersistError::ExportDir {
        path: dir.to_path_buf(),
        reason,
    };
    match fs::metadata(dir) {
        Ok(meta) if !meta.is_dir() => return Err(unusable("not a directory".into())),
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(dir).map_err(|e| unusable(e.to_string()))?;
        }
        Err(err) => return Err(unusable(err.to_string())),
    }
    NamedTempFile::new_in(dir).map_err(|e| unusable(e.to_string()))?;
    Ok(())
}

/// A set of files that are written together.
///
/// Every file is fully written and synced to a temp file beside its target
/// before any target is touched. Each temp file is then renamed over its
/// target, which replaces an earlier export in one step. Dropping a batch
/// before `commit` leaves the directory as it was.
pub struct ExportBatch {
    dir: PathBuf,
    staged: Vec<(PathBuf, NamedTempFile)>,
}

impl ExportBatch {
    pub fn begin(dir: PathBuf) -> Result<Self, PersistError> {
        ensure_export_dir(&dir)?;
        Ok(Self {
            dir,
            staged: Vec::new(),
        })
    }

    pub fn stage(&mut self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        let target = self.dir.join(filename);
        if target.is_dir() {
            return Err(PersistError::TargetIsDir(target));
        }
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        self.staged.push((target.clone(), tmp));
        Ok(target)
    }

    /// Moves every staged file into place, returning the targets in staging order.
    pub fn commit(self) -> Result<Vec<PathBuf>, PersistError> {
        let total = self.staged.len();
        let mut written = Vec::with_capacity(total);
        for (target, tmp) in self.staged {
            if let Err(err) = tmp.persist(&target) {
                sparlo_error!(
                    "Export left incomplete: {} of {} files moved into {}",
                    written.len(),
                    total,
                    self.dir.display()
                );
                return Err(PersistError::Io(err.error));
            }
            written.push(target);
        }
        Ok(written)
    }
}
