//! Fixup pass behavior against real directory trees.

use modshift::{fixup_imports, FileSearch, WalkSearch};
use proptest::prelude::*;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

#[test]
fn test_fixup_reference_rewrite() {
    let dir = TempDir::new().unwrap();
    let file = dir.path().join("use.py");
    fs::write(&file, "x = module.symbol + 1\ny = module.symbol\n").unwrap();

    fixup_imports(dir.path(), "module", "symbol", &WalkSearch).unwrap();

    assert_eq!(
        fs::read_to_string(&file).unwrap(),
        "from module import symbol\nx = symbol + 1\ny = symbol\n"
    );
}

#[test]
fn test_fixup_covers_whole_tree() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("pkg/inner")).unwrap();
    fs::write(dir.path().join("top.py"), "a = util.scale(1)\n").unwrap();
    fs::write(dir.path().join("pkg/mid.py"), "b = util.scale(2)\n").unwrap();
    fs::write(
        dir.path().join("pkg/inner/deep.py"),
        "c = util.scale(3)\n",
    )
    .unwrap();
    fs::write(dir.path().join("pkg/clean.py"), "d = 4\n").unwrap();

    let report = fixup_imports(dir.path(), "util", "scale", &WalkSearch).unwrap();

    assert_eq!(report.len(), 3);
    assert!(report.iter().all(|(_, result)| result.is_ok()));
    assert_eq!(
        fs::read_to_string(dir.path().join("pkg/clean.py")).unwrap(),
        "d = 4\n"
    );
    for path in ["top.py", "pkg/mid.py", "pkg/inner/deep.py"] {
        let content = fs::read_to_string(dir.path().join(path)).unwrap();
        assert!(content.starts_with("from util import scale\n"));
        assert!(!content.contains("util.scale"));
    }
}

/// A search oracle scripted to return a fixed file set, so failures can be
/// injected without touching the file system walk.
struct ScriptedSearch(Vec<PathBuf>);

impl FileSearch for ScriptedSearch {
    fn find_files_containing(
        &self,
        _root: &Path,
        _pattern: &str,
    ) -> io::Result<BTreeSet<PathBuf>> {
        Ok(self.0.iter().cloned().collect())
    }
}

#[test]
fn test_per_file_failure_does_not_stop_the_rest() {
    let dir = TempDir::new().unwrap();
    let good = dir.path().join("good.py");
    let missing = dir.path().join("missing.py");
    fs::write(&good, "x = module.symbol\n").unwrap();

    let search = ScriptedSearch(vec![missing.clone(), good.clone()]);
    let report = fixup_imports(dir.path(), "module", "symbol", &search).unwrap();

    assert_eq!(report.len(), 2);
    let failed = report.iter().find(|(path, _)| path == &missing).unwrap();
    assert!(failed.1.is_err());
    let fixed = report.iter().find(|(path, _)| path == &good).unwrap();
    assert!(fixed.1.is_ok());

    assert_eq!(
        fs::read_to_string(&good).unwrap(),
        "from module import symbol\nx = symbol\n"
    );
}

proptest! {
    /// One pass leaves zero qualified occurrences and exactly one new
    /// import line at the top, whatever the occurrence count.
    #[test]
    fn prop_fixup_is_complete_within_a_run(
        module in "[a-z][a-z0-9]{0,6}",
        symbol in "[a-z][a-z0-9]{0,6}",
        uses in 1usize..6,
    ) {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("use.py");
        let body: String = (0..uses)
            .map(|i| format!("value{i} = {module}.{symbol} + {i}\n"))
            .collect();
        fs::write(&file, &body).unwrap();

        let report = fixup_imports(dir.path(), &module, &symbol, &WalkSearch).unwrap();
        prop_assert_eq!(report.len(), 1);
        prop_assert_eq!(report[0].1.as_ref().unwrap().replaced, uses);

        let content = fs::read_to_string(&file).unwrap();
        let pattern = format!("{module}.{symbol}");
        let import_line = format!("from {module} import {symbol}\n");
        prop_assert_eq!(content.matches(&pattern).count(), 0);
        prop_assert!(content.starts_with(&import_line));
        prop_assert_eq!(content.matches(import_line.trim_end()).count(), 1);
    }
}
