//! The shipped text-level engine.
//!
//! Resolution and change computation work on raw source text: occurrences
//! come from the word-boundary scanner, bindings from the import statement
//! on the binding occurrence's line, and moves from whole-file rewrites of
//! import statements and dotted qualifiers. Import statements the engine
//! can see statically are rewritten here; fully-qualified call sites it
//! cannot prove are left to the fixup pass.

use std::ops::Range;
use std::path::Path;

use crate::engine::changes::ChangeSet;
use crate::engine::errors::EngineError;
use crate::engine::imports::{
    is_valid_module_name, module_file_candidates, module_path, repoint_symbol_imports,
    rewrite_module_references, strip_symbol_import,
};
use crate::engine::occurrences::{find_occurrences, identifier_at, Occurrence};
use crate::engine::{Binding, BuiltMove, RefactoringEngine};
use crate::locate::DefinitionSite;
use crate::project::{Project, Resource, ResourceKind};

#[derive(Debug, Clone, Copy, Default)]
pub struct TextEngine;

impl TextEngine {
    pub fn new() -> Self {
        TextEngine
    }
}

fn read_resource(project: &Project, resource: &Resource) -> Result<String, EngineError> {
    project
        .read(resource)
        .map_err(|source| EngineError::io(project.absolute(resource), source))
}

impl RefactoringEngine for TextEngine {
    fn occurrences(
        &self,
        project: &Project,
        resource: &Resource,
        name: &str,
    ) -> Result<Vec<Occurrence>, EngineError> {
        let text = read_resource(project, resource)?;
        Ok(find_occurrences(&text, name))
    }

    fn build_move(
        &self,
        project: &Project,
        site: &DefinitionSite,
    ) -> Result<BuiltMove, EngineError> {
        let text = read_resource(project, &site.resource)?;
        let (start, end) = identifier_at(&text, site.offset)
            .ok_or(EngineError::NotAnIdentifier { offset: site.offset })?;
        let name = text[start..end].to_string();

        let occurrences = find_occurrences(&text, &name);
        let canonical = occurrences
            .iter()
            .find(|o| o.is_definition || o.is_write)
            .ok_or_else(|| EngineError::UnresolvableName { name: name.clone() })?;

        if !canonical.is_import {
            let binding = Binding::Definition {
                site: DefinitionSite {
                    resource: site.resource.clone(),
                    offset: canonical.offset,
                },
            };
            return Ok(BuiltMove {
                old_name: name,
                binding,
            });
        }

        let line = line_containing(&text, canonical.offset);
        let binding = resolve_import_binding(project, line, &name)?;
        Ok(BuiltMove {
            old_name: name,
            binding,
        })
    }

    fn build_module_move(
        &self,
        _project: &Project,
        module: &Resource,
    ) -> Result<BuiltMove, EngineError> {
        let dotted = module_path(&module.path).ok_or_else(|| EngineError::NotAModule {
            path: module.path.clone(),
        })?;
        Ok(BuiltMove {
            old_name: dotted,
            binding: Binding::Module,
        })
    }

    fn module_move_changes(
        &self,
        project: &Project,
        module: &Resource,
        dest_folder: &Resource,
    ) -> Result<ChangeSet, EngineError> {
        let file_name = module.path.file_name().ok_or_else(|| EngineError::NotAModule {
            path: module.path.clone(),
        })?;
        let new_rel = dest_folder.path.join(file_name);

        let old_dotted = module_path(&module.path).ok_or_else(|| EngineError::NotAModule {
            path: module.path.clone(),
        })?;
        let new_dotted = module_path(&new_rel).ok_or_else(|| EngineError::NotAModule {
            path: new_rel.clone(),
        })?;

        let to_abs = project.root().join(&new_rel);
        if new_rel == module.path || to_abs.exists() {
            return Err(EngineError::NameCollision { path: to_abs });
        }

        let mut changeset = ChangeSet::new();
        for file in project.source_files() {
            let text = read_resource(project, &file)?;
            let (rewritten, count) = rewrite_module_references(&text, &old_dotted, &new_dotted);
            if count > 0 {
                changeset.rewrite(project.absolute(&file), &text, rewritten);
            }
        }
        changeset.move_file(project.absolute(module), to_abs);

        Ok(changeset)
    }

    fn symbol_move_changes(
        &self,
        project: &Project,
        definition: &DefinitionSite,
        name: &str,
        dest_file: &Resource,
    ) -> Result<ChangeSet, EngineError> {
        let source = &definition.resource;
        if source.path == dest_file.path {
            return Err(EngineError::NameCollision {
                path: project.absolute(dest_file),
            });
        }

        let old_module = module_path(&source.path).ok_or_else(|| EngineError::NotAModule {
            path: source.path.clone(),
        })?;
        let new_module = module_path(&dest_file.path).ok_or_else(|| EngineError::NotAModule {
            path: dest_file.path.clone(),
        })?;

        let source_text = read_resource(project, source)?;
        check_single_top_level_binding(&source_text, name)?;
        let block = definition_block(&source_text, definition.offset, name)?;
        let block_text = source_text[block.clone()].trim_end().to_string();

        let dest_text = read_resource(project, dest_file)?;
        let dest_collision = find_occurrences(&dest_text, name)
            .iter()
            .any(|o| (o.is_definition || o.is_write) && !o.is_import && at_top_level(&dest_text, o));
        if dest_collision {
            return Err(EngineError::NameCollision {
                path: project.absolute(dest_file),
            });
        }

        // Remaining references in the source file now need a direct import.
        let mut new_source = String::with_capacity(source_text.len());
        new_source.push_str(&source_text[..block.start]);
        new_source.push_str(&source_text[block.end..]);
        let still_used = find_occurrences(&new_source, name)
            .iter()
            .any(|o| !o.is_import);
        if still_used {
            new_source = format!("from {new_module} import {name}\n{new_source}");
        }

        // The destination stops importing the symbol and gains its
        // definition, two blank lines after the existing content.
        let (mut new_dest, _) = strip_symbol_import(&dest_text, &old_module, name);
        new_dest = if new_dest.trim().is_empty() {
            format!("{block_text}\n")
        } else {
            format!("{}\n\n\n{block_text}\n", new_dest.trim_end())
        };

        let mut changeset = ChangeSet::new();
        for file in project.source_files() {
            if file.path == source.path || file.path == dest_file.path {
                continue;
            }
            let text = read_resource(project, &file)?;
            let (rewritten, count) = repoint_symbol_imports(&text, &old_module, &new_module, name);
            if count > 0 {
                changeset.rewrite(project.absolute(&file), &text, rewritten);
            }
        }
        changeset.rewrite(project.absolute(source), &source_text, new_source);
        changeset.rewrite(project.absolute(dest_file), &dest_text, new_dest);

        Ok(changeset)
    }

    fn rename_changes(
        &self,
        project: &Project,
        module: &Resource,
        new_name: &str,
    ) -> Result<ChangeSet, EngineError> {
        if !is_valid_module_name(new_name) {
            return Err(EngineError::InvalidName {
                name: new_name.to_string(),
            });
        }

        let old_dotted = module_path(&module.path).ok_or_else(|| EngineError::NotAModule {
            path: module.path.clone(),
        })?;
        let new_rel = match module.path.parent() {
            Some(parent) if parent != Path::new("") => parent.join(format!("{new_name}.py")),
            _ => Path::new(&format!("{new_name}.py")).to_path_buf(),
        };
        let new_dotted = module_path(&new_rel).ok_or_else(|| EngineError::NotAModule {
            path: new_rel.clone(),
        })?;

        let to_abs = project.root().join(&new_rel);
        if new_rel == module.path || to_abs.exists() {
            return Err(EngineError::NameCollision { path: to_abs });
        }

        let mut changeset = ChangeSet::new();
        for file in project.source_files() {
            let text = read_resource(project, &file)?;
            let (rewritten, count) = rewrite_module_references(&text, &old_dotted, &new_dotted);
            if count > 0 {
                changeset.rewrite(project.absolute(&file), &text, rewritten);
            }
        }
        changeset.move_file(project.absolute(module), to_abs);

        Ok(changeset)
    }
}

/// The line containing `offset`, without its newline.
fn line_containing(text: &str, offset: usize) -> &str {
    let start = text[..offset].rfind('\n').map(|i| i + 1).unwrap_or(0);
    let end = text[offset..]
        .find('\n')
        .map(|i| offset + i)
        .unwrap_or(text.len());
    &text[start..end]
}

fn at_top_level(text: &str, occurrence: &Occurrence) -> bool {
    let start = text[..occurrence.offset]
        .rfind('\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    !text[start..]
        .chars()
        .next()
        .map_or(false, |c| c == ' ' || c == '\t')
}

fn check_single_top_level_binding(text: &str, name: &str) -> Result<(), EngineError> {
    let count = find_occurrences(text, name)
        .iter()
        .filter(|o| (o.is_definition || o.is_write) && !o.is_import && at_top_level(text, o))
        .count();
    match count {
        0 => Err(EngineError::NotTopLevel {
            name: name.to_string(),
        }),
        1 => Ok(()),
        count => Err(EngineError::AmbiguousReference {
            name: name.to_string(),
            count,
        }),
    }
}

/// Resolve the binding introduced by the import statement on `line`.
fn resolve_import_binding(
    project: &Project,
    line: &str,
    name: &str,
) -> Result<Binding, EngineError> {
    let trimmed = line.trim_start();

    if let Some(list) = trimmed.strip_prefix("import ") {
        for item in list.split(',') {
            let item = item.trim();
            let (target, bound) = match item.split_once(" as ") {
                Some((target, alias)) => (target.trim(), alias.trim().to_string()),
                None => (item, item.split('.').next().unwrap_or(item).to_string()),
            };
            if bound == name {
                return Ok(Binding::ImportedModule {
                    target: target.to_string(),
                });
            }
        }
        return Err(EngineError::UnresolvableName {
            name: name.to_string(),
        });
    }

    if let Some(rest) = trimmed.strip_prefix("from ") {
        let (module, list) = rest
            .split_once(" import ")
            .ok_or_else(|| EngineError::UnresolvableName {
                name: name.to_string(),
            })?;
        let module = module.trim();

        for item in list.split(',') {
            let item = item.trim();
            let (entity, bound) = match item.split_once(" as ") {
                Some((entity, alias)) => (entity.trim(), alias.trim()),
                None => (item, item),
            };
            if bound != name {
                continue;
            }

            // A submodule import binds a module, not a symbol.
            let dotted = format!("{module}.{entity}");
            if module_exists(project, &dotted) {
                return Ok(Binding::ImportedModule { target: dotted });
            }

            // Otherwise follow the import into the module's file.
            if let Some(site) = resolve_in_module(project, module, entity)? {
                return Ok(Binding::ImportedSymbol { site });
            }
            return Err(EngineError::UnresolvableName {
                name: name.to_string(),
            });
        }
    }

    Err(EngineError::UnresolvableName {
        name: name.to_string(),
    })
}

fn module_exists(project: &Project, dotted: &str) -> bool {
    module_file_candidates(dotted)
        .iter()
        .any(|candidate| project.root().join(candidate).is_file())
}

/// Find the definition site of `entity` within the module named `dotted`.
fn resolve_in_module(
    project: &Project,
    dotted: &str,
    entity: &str,
) -> Result<Option<DefinitionSite>, EngineError> {
    for candidate in module_file_candidates(dotted) {
        let absolute = project.root().join(&candidate);
        if !absolute.is_file() {
            continue;
        }
        let text = std::fs::read_to_string(&absolute)
            .map_err(|source| EngineError::io(absolute.clone(), source))?;
        if let Some(definition) = find_occurrences(&text, entity)
            .into_iter()
            .find(|o| (o.is_definition || o.is_write) && !o.is_import)
        {
            return Ok(Some(DefinitionSite {
                resource: Resource {
                    path: candidate,
                    kind: ResourceKind::File,
                },
                offset: definition.offset,
            }));
        }
    }
    Ok(None)
}

/// Byte range of the definition block anchored at `offset`, decorators and
/// indented suite included, trailing blank lines excluded.
fn definition_block(text: &str, offset: usize, name: &str) -> Result<Range<usize>, EngineError> {
    let spans = line_spans(text);
    let anchor = spans
        .iter()
        .position(|span| span.0 <= offset && offset < span.1.max(span.0 + 1))
        .unwrap_or(spans.len().saturating_sub(1));

    let header = &text[spans[anchor].0..spans[anchor].1];
    if header.starts_with(' ') || header.starts_with('\t') {
        return Err(EngineError::NotTopLevel {
            name: name.to_string(),
        });
    }

    // Decorators belong to the definition they precede.
    let mut first = anchor;
    while first > 0 {
        let previous = &text[spans[first - 1].0..spans[first - 1].1];
        if previous.starts_with('@') {
            first -= 1;
        } else {
            break;
        }
    }

    let trimmed_header = header.trim_start();
    let is_suite = trimmed_header.starts_with("def ")
        || trimmed_header.starts_with("async def ")
        || trimmed_header.starts_with("class ");

    let last = if is_suite {
        suite_end(text, &spans, anchor)
    } else {
        statement_end(text, &spans, anchor)
    };

    Ok(spans[first].0..spans[last].1)
}

/// Last line of an indented suite starting at the header line `anchor`.
/// Trailing blank lines are left out of the block.
fn suite_end(text: &str, spans: &[(usize, usize)], anchor: usize) -> usize {
    let mut last = anchor;
    for (index, span) in spans.iter().enumerate().skip(anchor + 1) {
        let line = &text[span.0..span.1];
        if line.trim().is_empty() {
            continue;
        }
        if line.starts_with(' ') || line.starts_with('\t') {
            last = index;
        } else {
            break;
        }
    }
    last
}

/// Last line of a (possibly bracket- or backslash-continued) statement.
fn statement_end(text: &str, spans: &[(usize, usize)], anchor: usize) -> usize {
    let mut depth: i32 = 0;
    let mut last = anchor;
    for (index, span) in spans.iter().enumerate().skip(anchor) {
        let line = &text[span.0..span.1];
        for c in line.chars() {
            match c {
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' => depth -= 1,
                _ => {}
            }
        }
        last = index;
        let continued = line.trim_end().ends_with('\\');
        if depth <= 0 && !continued {
            break;
        }
    }
    last
}

/// (start, end) byte spans per line, end exclusive and newline included.
fn line_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for line in text.split_inclusive('\n') {
        spans.push((start, start + line.len()));
        start += line.len();
    }
    if spans.is_empty() {
        spans.push((0, 0));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::Project;
    use std::fs;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        project: Project,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let dir = tempfile::tempdir().unwrap();
            for (path, content) in files {
                let full = dir.path().join(path);
                if let Some(parent) = full.parent() {
                    fs::create_dir_all(parent).unwrap();
                }
                fs::write(full, content).unwrap();
            }
            let project = Project::open(dir.path(), None).unwrap();
            Fixture { _dir: dir, project }
        }

        fn resource(&self, path: &str) -> Resource {
            self.project
                .resolve(self.project.root().join(path))
                .unwrap()
        }

        fn content(&self, path: &str) -> String {
            fs::read_to_string(self.project.root().join(path)).unwrap()
        }
    }

    #[test]
    fn test_build_move_resolves_definition() {
        let fx = Fixture::new(&[("mod.py", "def area(r):\n    return r * r\n\nx = area(2)\n")]);
        let engine = TextEngine::new();
        let resource = fx.resource("mod.py");

        // Point at the *call* site; the engine resolves to the def line.
        let call_offset = fx.content("mod.py").find("area(2)").unwrap();
        let built = engine
            .build_move(
                &fx.project,
                &DefinitionSite {
                    resource: resource.clone(),
                    offset: call_offset,
                },
            )
            .unwrap();

        assert_eq!(built.old_name, "area");
        match built.binding {
            Binding::Definition { site } => assert_eq!(site.offset, 4),
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn test_build_move_flags_imported_module_alias() {
        let fx = Fixture::new(&[
            ("shapes.py", "def circle(r):\n    return r\n"),
            ("app.py", "import shapes as sh\n\ny = sh.circle(1)\n"),
        ]);
        let engine = TextEngine::new();
        let resource = fx.resource("app.py");

        let offset = fx.content("app.py").find("sh.circle").unwrap();
        let built = engine
            .build_move(&fx.project, &DefinitionSite { resource, offset })
            .unwrap();

        assert_eq!(
            built.binding,
            Binding::ImportedModule {
                target: "shapes".to_string()
            }
        );
    }

    #[test]
    fn test_build_move_follows_imported_symbol() {
        let fx = Fixture::new(&[
            ("shapes.py", "def circle(r):\n    return r\n"),
            ("app.py", "from shapes import circle\n\ny = circle(1)\n"),
        ]);
        let engine = TextEngine::new();
        let resource = fx.resource("app.py");

        let offset = fx.content("app.py").find("circle(1)").unwrap();
        let built = engine
            .build_move(&fx.project, &DefinitionSite { resource, offset })
            .unwrap();

        match built.binding {
            Binding::ImportedSymbol { site } => {
                assert_eq!(site.resource.path, PathBuf::from("shapes.py"));
                assert_eq!(site.offset, 4);
            }
            other => panic!("unexpected binding: {other:?}"),
        }
    }

    #[test]
    fn test_build_move_rejects_non_identifier_offset() {
        let fx = Fixture::new(&[("mod.py", "x = (1)\n")]);
        let engine = TextEngine::new();
        let resource = fx.resource("mod.py");

        let err = engine
            .build_move(&fx.project, &DefinitionSite { resource, offset: 4 })
            .unwrap_err();
        assert!(matches!(err, EngineError::NotAnIdentifier { .. }));
    }

    #[test]
    fn test_module_move_changes_rewrite_imports_and_move() {
        let fx = Fixture::new(&[
            ("pkg/__init__.py", ""),
            ("pkg/a.py", "def f():\n    return 1\n"),
            ("pkg/sub/__init__.py", ""),
            ("app.py", "import pkg.a\n\nprint(pkg.a.f())\n"),
        ]);
        let engine = TextEngine::new();
        let module = fx.resource("pkg/a.py");
        let dest = fx.resource("pkg/sub");

        let changes = engine
            .module_move_changes(&fx.project, &module, &dest)
            .unwrap();
        changes.apply().unwrap();

        assert!(!fx.project.root().join("pkg/a.py").exists());
        assert!(fx.project.root().join("pkg/sub/a.py").exists());
        assert_eq!(
            fx.content("app.py"),
            "import pkg.sub.a\n\nprint(pkg.sub.a.f())\n"
        );
    }

    #[test]
    fn test_module_move_rejects_collision() {
        let fx = Fixture::new(&[
            ("a.py", ""),
            ("sub/__init__.py", ""),
            ("sub/a.py", ""),
        ]);
        let engine = TextEngine::new();
        let module = fx.resource("a.py");
        let dest = fx.resource("sub");

        let err = engine
            .module_move_changes(&fx.project, &module, &dest)
            .unwrap_err();
        assert!(matches!(err, EngineError::NameCollision { .. }));
    }

    #[test]
    fn test_rename_changes_rewrite_references() {
        let fx = Fixture::new(&[
            ("alpha.py", "def f():\n    return 1\n"),
            ("app.py", "from alpha import f\nimport alpha\n\nprint(alpha.f())\n"),
        ]);
        let engine = TextEngine::new();
        let module = fx.resource("alpha.py");

        let changes = engine.rename_changes(&fx.project, &module, "beta").unwrap();
        changes.apply().unwrap();

        assert!(!fx.project.root().join("alpha.py").exists());
        assert!(fx.project.root().join("beta.py").exists());
        assert_eq!(
            fx.content("app.py"),
            "from beta import f\nimport beta\n\nprint(beta.f())\n"
        );
    }

    #[test]
    fn test_rename_rejects_invalid_name() {
        let fx = Fixture::new(&[("alpha.py", "")]);
        let engine = TextEngine::new();
        let module = fx.resource("alpha.py");

        let err = engine
            .rename_changes(&fx.project, &module, "not.a.name")
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidName { .. }));
    }

    #[test]
    fn test_symbol_move_relocates_definition_block() {
        let fx = Fixture::new(&[
            (
                "geometry.py",
                "def area(r):\n    return r * r\n\n\ndef keep():\n    pass\n",
            ),
            ("util.py", "x = 1\n"),
            ("app.py", "from geometry import area\n\nprint(area(2))\n"),
        ]);
        let engine = TextEngine::new();
        let source = fx.resource("geometry.py");
        let dest = fx.resource("util.py");

        let changes = engine
            .symbol_move_changes(
                &fx.project,
                &DefinitionSite {
                    resource: source,
                    offset: 4,
                },
                "area",
                &dest,
            )
            .unwrap();
        changes.apply().unwrap();

        let geometry = fx.content("geometry.py");
        assert!(!geometry.contains("def area"));
        assert!(geometry.contains("def keep"));

        let util = fx.content("util.py");
        assert!(util.starts_with("x = 1\n"));
        assert!(util.contains("def area(r):\n    return r * r"));

        assert_eq!(fx.content("app.py"), "from util import area\n\nprint(area(2))\n");
    }

    #[test]
    fn test_symbol_move_adds_import_when_source_still_uses_it() {
        let fx = Fixture::new(&[
            (
                "geometry.py",
                "def area(r):\n    return r * r\n\n\ndef twice(r):\n    return area(r) * 2\n",
            ),
            ("util.py", ""),
        ]);
        let engine = TextEngine::new();
        let source = fx.resource("geometry.py");
        let dest = fx.resource("util.py");

        let changes = engine
            .symbol_move_changes(
                &fx.project,
                &DefinitionSite {
                    resource: source,
                    offset: 4,
                },
                "area",
                &dest,
            )
            .unwrap();
        changes.apply().unwrap();

        let geometry = fx.content("geometry.py");
        assert!(geometry.starts_with("from util import area\n"));
        assert!(geometry.contains("def twice"));
    }

    #[test]
    fn test_symbol_move_rejects_destination_collision() {
        let fx = Fixture::new(&[
            ("geometry.py", "def area(r):\n    return r\n"),
            ("util.py", "def area(r):\n    return 0\n"),
        ]);
        let engine = TextEngine::new();
        let source = fx.resource("geometry.py");
        let dest = fx.resource("util.py");

        let err = engine
            .symbol_move_changes(
                &fx.project,
                &DefinitionSite {
                    resource: source,
                    offset: 4,
                },
                "area",
                &dest,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::NameCollision { .. }));
    }

    #[test]
    fn test_symbol_move_rejects_ambiguous_binding() {
        let fx = Fixture::new(&[
            ("geometry.py", "area = 1\narea = 2\n"),
            ("util.py", ""),
        ]);
        let engine = TextEngine::new();
        let source = fx.resource("geometry.py");
        let dest = fx.resource("util.py");

        let err = engine
            .symbol_move_changes(
                &fx.project,
                &DefinitionSite {
                    resource: source,
                    offset: 0,
                },
                "area",
                &dest,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::AmbiguousReference { count: 2, .. }));
    }

    #[test]
    fn test_definition_block_includes_decorators() {
        let text = "@cache\ndef f(x):\n    return x\n\nrest = 1\n";
        let block = definition_block(text, text.find("f(x)").unwrap(), "f").unwrap();
        assert_eq!(&text[block], "@cache\ndef f(x):\n    return x\n");
    }

    #[test]
    fn test_definition_block_assignment_with_continuation() {
        let text = "TABLE = {\n    'a': 1,\n}\nrest = 2\n";
        let block = definition_block(text, 0, "TABLE").unwrap();
        assert_eq!(&text[block], "TABLE = {\n    'a': 1,\n}\n");
    }
}
