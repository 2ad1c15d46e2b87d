//! Atomically-applicable bundles of file edits.
//!
//! A [`ChangeSet`] is the only thing the engine hands back for a move or
//! rename: full-file rewrites with before-text verification, plus file
//! moves. Application validates every operation against the current file
//! system first, then commits with a rollback journal, so a failed apply
//! leaves the project as it was.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

use crate::engine::errors::EngineError;

/// Verification of what a rewrite expects to find before applying.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteVerification {
    /// Exact text match required.
    Exact(String),
    /// xxh3 hash of the expected text (cheaper for large files).
    Hash(u64),
}

impl WriteVerification {
    /// Create verification from text, hashing anything over 1KB.
    pub fn from_text(text: &str) -> Self {
        if text.len() > 1024 {
            WriteVerification::Hash(xxh3_64(text.as_bytes()))
        } else {
            WriteVerification::Exact(text.to_string())
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            WriteVerification::Exact(expected) => text == expected,
            WriteVerification::Hash(expected) => xxh3_64(text.as_bytes()) == *expected,
        }
    }
}

/// A single constituent file mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOp {
    /// Replace a file's entire contents.
    Rewrite {
        path: PathBuf,
        new_text: String,
        expected: WriteVerification,
    },
    /// Move or rename a file. The destination must not exist.
    MoveFile { from: PathBuf, to: PathBuf },
}

/// An ordered collection of file edits that applies all-or-nothing.
#[derive(Debug, Clone, Default)]
#[must_use = "a ChangeSet does nothing until apply() is called"]
pub struct ChangeSet {
    ops: Vec<ChangeOp>,
}

enum Undo {
    Restore { path: PathBuf, original: String },
    MoveBack { from: PathBuf, to: PathBuf },
}

impl ChangeSet {
    pub fn new() -> Self {
        ChangeSet { ops: Vec::new() }
    }

    pub fn rewrite(&mut self, path: PathBuf, original: &str, new_text: String) {
        self.ops.push(ChangeOp::Rewrite {
            path,
            new_text,
            expected: WriteVerification::from_text(original),
        });
    }

    pub fn move_file(&mut self, from: PathBuf, to: PathBuf) {
        self.ops.push(ChangeOp::MoveFile { from, to });
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Files whose contents this change set rewrites, in operation order.
    pub fn rewrite_targets(&self) -> Vec<&Path> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                ChangeOp::Rewrite { path, .. } => Some(path.as_path()),
                ChangeOp::MoveFile { .. } => None,
            })
            .collect()
    }

    /// Apply every operation, or leave the project unmodified.
    ///
    /// Validation reads each rewrite target and checks its before-text, and
    /// checks move sources and destinations, before anything is written.
    /// The commit phase keeps a rollback journal; on failure the journal is
    /// unwound in reverse, best-effort, before the error is returned.
    pub fn apply(&self) -> Result<(), EngineError> {
        let mut originals: Vec<Option<String>> = Vec::with_capacity(self.ops.len());

        for op in &self.ops {
            match op {
                ChangeOp::Rewrite {
                    path,
                    new_text,
                    expected,
                } => {
                    let current = fs::read_to_string(path)
                        .map_err(|source| EngineError::io(path.clone(), source))?;
                    if &current != new_text && !expected.matches(&current) {
                        return Err(EngineError::ChangeConflict { path: path.clone() });
                    }
                    originals.push(Some(current));
                }
                ChangeOp::MoveFile { from, to } => {
                    if !from.exists() {
                        return Err(EngineError::io(
                            from.clone(),
                            std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
                        ));
                    }
                    if to.exists() {
                        return Err(EngineError::NameCollision { path: to.clone() });
                    }
                    originals.push(None);
                }
            }
        }

        let mut journal: Vec<Undo> = Vec::with_capacity(self.ops.len());

        for (op, original) in self.ops.iter().zip(originals) {
            let committed = match op {
                ChangeOp::Rewrite { path, new_text, .. } => {
                    let original = original.unwrap_or_default();
                    if original == *new_text {
                        // Already in the target state.
                        continue;
                    }
                    atomic_write(path, new_text.as_bytes())
                        .map_err(|source| EngineError::io(path.clone(), source))
                        .map(|()| Undo::Restore {
                            path: path.clone(),
                            original,
                        })
                }
                ChangeOp::MoveFile { from, to } => fs::rename(from, to)
                    .map_err(|source| EngineError::io(from.clone(), source))
                    .map(|()| Undo::MoveBack {
                        from: from.clone(),
                        to: to.clone(),
                    }),
            };

            match committed {
                Ok(undo) => journal.push(undo),
                Err(err) => {
                    unwind(journal);
                    return Err(err);
                }
            }
        }

        Ok(())
    }
}

/// Best-effort rollback of already-committed operations, newest first.
fn unwind(journal: Vec<Undo>) {
    for undo in journal.into_iter().rev() {
        match undo {
            Undo::Restore { path, original } => {
                let _ = atomic_write(&path, original.as_bytes());
            }
            Undo::MoveBack { from, to } => {
                let _ = fs::rename(&to, &from);
            }
        }
    }
}

/// Atomic file write: tempfile + fsync + rename.
///
/// Either the full write succeeds or the original file is untouched. The
/// mtime touch afterwards makes sure editors and file watchers notice.
pub(crate) fn atomic_write(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(std::io::ErrorKind::InvalidInput, "path has no parent directory")
    })?;

    let mut temp = tempfile::NamedTempFile::new_in(parent)?;
    temp.write_all(content)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| e.error)?;

    filetime::set_file_mtime(path, filetime::FileTime::now())?;

    Ok(())
}
