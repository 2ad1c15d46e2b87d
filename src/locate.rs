//! Definition location.
//!
//! Turns a user-supplied selector — an explicit byte offset or a symbol
//! name — into a [`DefinitionSite`]. Offsets are only range-checked; name
//! lookup walks the engine's occurrences in document order and takes the
//! first one classified as a definition or a write. Reads never qualify,
//! because targeting a reference would produce the wrong change set.

use std::fmt;
use std::path::PathBuf;

use crate::engine::occurrences::identifiers;
use crate::engine::{EngineError, RefactoringEngine};
use crate::project::{Project, Resource};

/// Where a symbol is declared or first written: a resource plus the byte
/// offset of the occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSite {
    pub resource: Resource,
    pub offset: usize,
}

/// How the user pointed at a definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selector<'a> {
    /// An explicit byte offset within the resource.
    Offset(usize),
    /// A symbol name to look up in the resource.
    Name(&'a str),
}

#[derive(Debug)]
pub enum LocateError {
    /// No definition or write occurrence of the name exists in the resource.
    SymbolNotFound {
        name: String,
        resource: PathBuf,
        suggestion: Option<String>,
    },
    /// The offset selector does not fall within the resource's text.
    OffsetOutOfRange { offset: usize, length: usize },
    Engine(EngineError),
}

impl fmt::Display for LocateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocateError::SymbolNotFound {
                name,
                resource,
                suggestion,
            } => {
                write!(
                    f,
                    "no definition of `{}` found in {}",
                    name,
                    resource.display()
                )?;
                if let Some(suggestion) = suggestion {
                    write!(f, " (did you mean `{}`?)", suggestion)?;
                }
                Ok(())
            }
            LocateError::OffsetOutOfRange { offset, length } => {
                write!(
                    f,
                    "offset {} is outside the file (length {})",
                    offset, length
                )
            }
            LocateError::Engine(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LocateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LocateError::Engine(e) => Some(e),
            _ => None,
        }
    }
}

impl From<EngineError> for LocateError {
    fn from(e: EngineError) -> Self {
        LocateError::Engine(e)
    }
}

/// Resolve a selector to a definition site within `resource`.
pub fn locate(
    engine: &dyn RefactoringEngine,
    project: &Project,
    resource: &Resource,
    selector: Selector<'_>,
) -> Result<DefinitionSite, LocateError> {
    match selector {
        Selector::Offset(offset) => {
            let text = project
                .read(resource)
                .map_err(|source| EngineError::io(project.absolute(resource), source))?;
            if offset >= text.len() {
                return Err(LocateError::OffsetOutOfRange {
                    offset,
                    length: text.len(),
                });
            }
            Ok(DefinitionSite {
                resource: resource.clone(),
                offset,
            })
        }
        Selector::Name(name) => {
            let found = engine
                .occurrences(project, resource, name)?
                .into_iter()
                .find(|occurrence| occurrence.is_definition || occurrence.is_write);

            match found {
                Some(occurrence) => Ok(DefinitionSite {
                    resource: resource.clone(),
                    offset: occurrence.offset,
                }),
                None => Err(LocateError::SymbolNotFound {
                    name: name.to_string(),
                    resource: resource.path.clone(),
                    suggestion: suggest(project, resource, name),
                }),
            }
        }
    }
}

/// Nearest identifier in the file, for the not-found message.
fn suggest(project: &Project, resource: &Resource, name: &str) -> Option<String> {
    let text = project.read(resource).ok()?;
    identifiers(&text)
        .into_iter()
        .filter(|candidate| candidate != name)
        .map(|candidate| {
            let score = strsim::jaro_winkler(&candidate, name);
            (candidate, score)
        })
        .filter(|(_, score)| *score >= 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(candidate, _)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::TextEngine;
    use crate::project::Project;
    use std::fs;

    fn fixture(content: &str) -> (tempfile::TempDir, Project, Resource) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("mod.py"), content).unwrap();
        let project = Project::open(dir.path(), None).unwrap();
        let resource = project.resolve(dir.path().join("mod.py")).unwrap();
        (dir, project, resource)
    }

    #[test]
    fn test_locate_by_name_finds_definition() {
        let (_dir, project, resource) =
            fixture("print(scale)\n\ndef scale(x):\n    return x * 2\n");
        let engine = TextEngine::new();

        let site = locate(&engine, &project, &resource, Selector::Name("scale")).unwrap();
        // The leading read does not qualify; the `def` line does.
        assert_eq!(site.offset, 18);
    }

    #[test]
    fn test_locate_by_name_accepts_assignment() {
        let (_dir, project, resource) = fixture("RATE = 3\n");
        let engine = TextEngine::new();

        let site = locate(&engine, &project, &resource, Selector::Name("RATE")).unwrap();
        assert_eq!(site.offset, 0);
    }

    #[test]
    fn test_locate_by_name_never_falls_back_to_reads() {
        let (_dir, project, resource) = fixture("print(scale)\nprint(scale)\n");
        let engine = TextEngine::new();

        let err = locate(&engine, &project, &resource, Selector::Name("scale")).unwrap_err();
        assert!(matches!(err, LocateError::SymbolNotFound { .. }));
    }

    #[test]
    fn test_symbol_not_found_suggests_near_miss() {
        let (_dir, project, resource) = fixture("def scale(x):\n    return x\n");
        let engine = TextEngine::new();

        let err = locate(&engine, &project, &resource, Selector::Name("scal")).unwrap_err();
        match err {
            LocateError::SymbolNotFound { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("scale"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_locate_by_offset_is_range_checked_only() {
        let (_dir, project, resource) = fixture("def scale(x):\n    return x\n");
        let engine = TextEngine::new();

        // Offset 20 is inside `return`, not a definition; accepted as-is.
        let site = locate(&engine, &project, &resource, Selector::Offset(20)).unwrap();
        assert_eq!(site.offset, 20);

        let err = locate(&engine, &project, &resource, Selector::Offset(999)).unwrap_err();
        assert!(matches!(err, LocateError::OffsetOutOfRange { .. }));
    }

    #[test]
    fn test_name_then_offset_round_trip() {
        let (_dir, project, resource) = fixture("def scale(x):\n    return x\n");
        let engine = TextEngine::new();

        let by_name = locate(&engine, &project, &resource, Selector::Name("scale")).unwrap();
        let by_offset = locate(
            &engine,
            &project,
            &resource,
            Selector::Offset(by_name.offset),
        )
        .unwrap();
        assert_eq!(by_name, by_offset);
    }
}
