//! Textual model of Python import statements and dotted module paths.
//!
//! Everything here works line-by-line on single-line statements. Multi-line
//! (parenthesized) import lists are left untouched by the rewriters; the
//! fixup pass exists to clean up whatever static rewriting does not catch.

use std::path::{Path, PathBuf};

/// Dotted module path for a project-relative `.py` file.
///
/// `pkg/a.py` → `pkg.a`, `pkg/__init__.py` → `pkg`. Returns `None` for
/// anything that is not a Python source file.
pub fn module_path(relative: &Path) -> Option<String> {
    if relative.extension().and_then(|e| e.to_str()) != Some("py") {
        return None;
    }

    let stem = relative.with_extension("");
    let mut segments: Vec<&str> = Vec::new();
    for component in stem.components() {
        segments.push(component.as_os_str().to_str()?);
    }
    if segments.last() == Some(&"__init__") {
        segments.pop();
    }
    if segments.is_empty() {
        return None;
    }
    Some(segments.join("."))
}

/// Candidate project-relative files for a dotted module path.
pub fn module_file_candidates(dotted: &str) -> [PathBuf; 2] {
    let base: PathBuf = dotted.split('.').collect();
    [base.with_extension("py"), base.join("__init__.py")]
}

pub fn is_import_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("import ") || trimmed.starts_with("from ")
}

pub fn is_valid_module_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace dotted-path occurrences of `old` with `new` within one line.
///
/// A match must not touch a longer dotted path on its left (`x.old` and
/// `xold` never match). When `qualifier_only` is set, the match must be
/// followed by a `.` — the form a fully-qualified reference takes outside
/// import statements.
fn replace_dotted(line: &str, old: &str, new: &str, qualifier_only: bool) -> (String, usize) {
    let mut out = String::with_capacity(line.len());
    let mut count = 0;
    let mut cursor = 0;

    while let Some(pos) = line[cursor..].find(old) {
        let start = cursor + pos;
        let end = start + old.len();
        let left_ok = line[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !is_ident_char(c) && c != '.');
        let right_ok = match line[end..].chars().next() {
            Some(c) if is_ident_char(c) => false,
            Some('.') => true,
            _ => !qualifier_only,
        };

        out.push_str(&line[cursor..start]);
        if left_ok && right_ok {
            out.push_str(new);
            count += 1;
        } else {
            out.push_str(old);
        }
        cursor = end;
    }
    out.push_str(&line[cursor..]);

    (out, count)
}

/// Rewrite references to a module throughout a file's text.
///
/// Import lines get full dotted-path replacement; everywhere else only
/// qualified references (`old.attr`) are rewritten. When the module lives in
/// a package, `from <parent> import <name>` statements are repointed too.
pub fn rewrite_module_references(content: &str, old: &str, new: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut total = 0;

    let from_import = old
        .rsplit_once('.')
        .zip(new.rsplit_once('.'))
        .filter(|((_, old_last), (_, new_last))| old_last == new_last);

    for line in split_lines(content) {
        let (body, newline) = split_newline(line);

        if is_import_line(body) {
            if let Some(((old_parent, name), (new_parent, _))) = from_import {
                if let Some(rewritten) = repoint_from_import(body, old_parent, new_parent, name) {
                    total += 1;
                    out.push_str(&rewritten);
                    out.push_str(newline);
                    continue;
                }
            }
            let (rewritten, n) = replace_dotted(body, old, new, false);
            total += n;
            out.push_str(&rewritten);
        } else {
            let (rewritten, n) = replace_dotted(body, old, new, true);
            total += n;
            out.push_str(&rewritten);
        }
        out.push_str(newline);
    }

    (out, total)
}

/// Repoint one name in a `from <module> import …` list at a new module.
///
/// `from old import sym, other` becomes `from old import other` plus a new
/// `from new import sym` line. Returns `None` if the line is not a matching
/// single-line from-import.
pub fn repoint_from_import(line: &str, old_module: &str, new_module: &str, symbol: &str) -> Option<String> {
    let parsed = parse_from_import(line, old_module, symbol)?;

    let indent = &line[..line.len() - line.trim_start().len()];
    let moved = format!("{indent}from {new_module} import {}", parsed.item);

    if parsed.remaining.is_empty() {
        Some(moved)
    } else {
        Some(format!(
            "{indent}from {old_module} import {}\n{moved}",
            parsed.remaining.join(", ")
        ))
    }
}

/// Drop one name from a `from <module> import …` list.
///
/// Returns `None` if the line does not import `symbol` from `module`;
/// `Some(None)` if the whole line should be removed.
pub fn drop_from_import(line: &str, module: &str, symbol: &str) -> Option<Option<String>> {
    let parsed = parse_from_import(line, module, symbol)?;

    if parsed.remaining.is_empty() {
        return Some(None);
    }
    let indent = &line[..line.len() - line.trim_start().len()];
    Some(Some(format!(
        "{indent}from {module} import {}",
        parsed.remaining.join(", ")
    )))
}

/// Apply [`repoint_from_import`] across a whole file.
pub fn repoint_symbol_imports(
    content: &str,
    old_module: &str,
    new_module: &str,
    symbol: &str,
) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut count = 0;
    for line in split_lines(content) {
        let (body, newline) = split_newline(line);
        match repoint_from_import(body, old_module, new_module, symbol) {
            Some(rewritten) => {
                count += 1;
                out.push_str(&rewritten);
            }
            None => out.push_str(body),
        }
        out.push_str(newline);
    }
    (out, count)
}

/// Apply [`drop_from_import`] across a whole file.
pub fn strip_symbol_import(content: &str, module: &str, symbol: &str) -> (String, usize) {
    let mut out = String::with_capacity(content.len());
    let mut count = 0;
    for line in split_lines(content) {
        let (body, newline) = split_newline(line);
        match drop_from_import(body, module, symbol) {
            Some(None) => {
                // Whole line removed, newline included.
                count += 1;
            }
            Some(Some(rewritten)) => {
                count += 1;
                out.push_str(&rewritten);
                out.push_str(newline);
            }
            None => {
                out.push_str(body);
                out.push_str(newline);
            }
        }
    }
    (out, count)
}

struct FromImport<'a> {
    /// The matched item, alias included (`sym` or `sym as alias`).
    item: &'a str,
    remaining: Vec<&'a str>,
}

fn parse_from_import<'a>(line: &'a str, module: &str, symbol: &str) -> Option<FromImport<'a>> {
    let rest = line.trim_start().strip_prefix("from ")?;
    let (found_module, imports) = rest.split_once(" import ")?;
    if found_module.trim() != module {
        return None;
    }
    // Parenthesized, continued, or commented lists are out of reach here.
    if imports.contains(&['(', '\\', '#'][..]) {
        return None;
    }

    let mut item = None;
    let mut remaining = Vec::new();
    for candidate in imports.split(',') {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }
        if candidate.split_whitespace().next() == Some(symbol) && item.is_none() {
            item = Some(candidate);
        } else {
            remaining.push(candidate);
        }
    }

    item.map(|item| FromImport { item, remaining })
}

fn split_lines(content: &str) -> impl Iterator<Item = &str> {
    content.split_inclusive('\n')
}

fn split_newline(line: &str) -> (&str, &str) {
    match line.strip_suffix('\n') {
        Some(body) => (body, "\n"),
        None => (line, ""),
    }
}
