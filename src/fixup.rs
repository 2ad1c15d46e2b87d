//! The import fixup pass.
//!
//! After a symbol moves, call sites that reach it through a fully-qualified
//! `module.symbol` path keep working only if something rewrites them. This
//! pass finds every file containing the literal pattern and, per file,
//! prepends a direct import and replaces each qualified occurrence with the
//! bare name.
//!
//! The pass is deliberately literal. The import line is inserted
//! unconditionally — it does not check whether an equivalent import already
//! exists, so running the pass against a file that somehow still matches
//! would duplicate the line. That duplication risk is a documented property
//! of the pass, not something it second-guesses; import ordering and
//! deduplication belong to downstream formatting tools.
//!
//! Each file is an independent unit of work: its two rewrites are its own
//! commit point, and a failure on one file is reported without stopping the
//! rest.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Pluggable file discovery for the fixup pass.
pub trait FileSearch {
    /// The deduplicated set of files under `root` containing the literal
    /// pattern.
    fn find_files_containing(&self, root: &Path, pattern: &str)
        -> io::Result<BTreeSet<PathBuf>>;
}

/// Native recursive scan with literal substring matching.
///
/// Hidden directories are skipped; files that cannot be read as UTF-8 are
/// not candidates.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkSearch;

impl FileSearch for WalkSearch {
    fn find_files_containing(
        &self,
        root: &Path,
        pattern: &str,
    ) -> io::Result<BTreeSet<PathBuf>> {
        let mut matches = BTreeSet::new();

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || !entry
                    .file_name()
                    .to_string_lossy()
                    .starts_with('.')
        });

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(content) = fs::read_to_string(entry.path()) {
                if content.contains(pattern) {
                    matches.insert(entry.path().to_path_buf());
                }
            }
        }

        Ok(matches)
    }
}

/// What one file's fixup accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixupStats {
    /// Qualified occurrences replaced with the bare name.
    pub replaced: usize,
}

/// Per-file outcome of one fixup pass, in file order.
pub type FixupReport = Vec<(PathBuf, Result<FixupStats, io::Error>)>;

/// Rewrite every file under `root` that references `module.symbol` into a
/// direct import plus bare-name references.
///
/// Discovery failure aborts the pass before anything is written; a per-file
/// read or write failure is recorded in the report and the remaining files
/// still run.
pub fn fixup_imports(
    root: &Path,
    module: &str,
    symbol: &str,
    search: &dyn FileSearch,
) -> io::Result<FixupReport> {
    let pattern = format!("{module}.{symbol}");
    let import_line = format!("from {module} import {symbol}");

    let files = search.find_files_containing(root, &pattern)?;

    let mut report = Vec::with_capacity(files.len());
    for file in files {
        let result = prepend_import(&file, &import_line)
            .and_then(|()| replace_qualified(&file, &pattern, symbol));
        report.push((file, result.map(|replaced| FixupStats { replaced })));
    }

    Ok(report)
}

/// Insert `line` as the file's new first line.
fn prepend_import(path: &Path, line: &str) -> io::Result<()> {
    let content = fs::read_to_string(path)?;
    fs::write(path, format!("{line}\n{content}"))
}

/// Replace every literal occurrence of `pattern` with `replacement`,
/// returning how many were rewritten.
fn replace_qualified(path: &Path, pattern: &str, replacement: &str) -> io::Result<usize> {
    let content = fs::read_to_string(path)?;
    let replaced = content.matches(pattern).count();
    fs::write(path, content.replace(pattern, replacement))?;
    Ok(replaced)
}
