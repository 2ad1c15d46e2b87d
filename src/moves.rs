//! Move strategy selection and change application.
//!
//! [`select_move`] turns a resolved target into a tagged [`MoveOperation`],
//! rejecting the one combination that cannot be honored: a symbol move
//! whose name is really an imported-module alias. Moving an alias would
//! silently corrupt call sites of the module it stands for, so the selector
//! fails before any change is computed. [`plan_move`] then pairs the
//! destination with the operation, checks their kinds agree, and produces a
//! committable [`MovePlan`].

use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine::{Binding, ChangeSet, EngineError, RefactoringEngine};
use crate::locate::DefinitionSite;
use crate::project::{Project, Resource, ResourceKind};

/// What the user asked to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveTarget {
    /// A whole module file.
    Module(Resource),
    /// A symbol at a resolved definition site.
    Symbol(DefinitionSite),
}

/// A classified, not-yet-applied relocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveOperation {
    ModuleMove {
        module: Resource,
        old_name: String,
    },
    SymbolMove {
        old_name: String,
        definition: DefinitionSite,
    },
}

impl MoveOperation {
    pub fn old_name(&self) -> &str {
        match self {
            MoveOperation::ModuleMove { old_name, .. } => old_name,
            MoveOperation::SymbolMove { old_name, .. } => old_name,
        }
    }

    /// Project-relative path of the definition being moved.
    pub fn current_location(&self) -> &Path {
        match self {
            MoveOperation::ModuleMove { module, .. } => &module.path,
            MoveOperation::SymbolMove { definition, .. } => &definition.resource.path,
        }
    }
}

/// The result of a committed move, for reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedMove {
    pub old_name: String,
    pub old_path: PathBuf,
    pub new_path: PathBuf,
}

/// A computed change set plus the report it will yield once committed.
#[derive(Debug)]
#[must_use = "a MovePlan does nothing until commit() is called"]
pub struct MovePlan {
    changes: ChangeSet,
    outcome: AppliedMove,
}

impl MovePlan {
    pub fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    /// Apply the change set. All-or-nothing per the engine's guarantee.
    pub fn commit(self) -> Result<AppliedMove, MoveError> {
        self.changes.apply()?;
        Ok(self.outcome)
    }
}

#[derive(Error, Debug)]
pub enum MoveError {
    #[error(
        "cannot move `{name}`: it is an imported module alias; use the move-module command instead"
    )]
    UnsupportedMove { name: String },

    #[error("destination must be a {expected}, but {path} is a {found}")]
    DestinationKind {
        expected: &'static str,
        found: &'static str,
        path: PathBuf,
    },

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Classify a move target into the operation that will honor it.
pub fn select_move(
    engine: &dyn RefactoringEngine,
    project: &Project,
    target: MoveTarget,
) -> Result<MoveOperation, MoveError> {
    match target {
        MoveTarget::Module(module) => {
            let built = engine.build_module_move(project, &module)?;
            Ok(MoveOperation::ModuleMove {
                module,
                old_name: built.old_name,
            })
        }
        MoveTarget::Symbol(site) => {
            let built = engine.build_move(project, &site)?;
            match built.binding {
                Binding::ImportedModule { .. } => Err(MoveError::UnsupportedMove {
                    name: built.old_name,
                }),
                Binding::Definition { site } | Binding::ImportedSymbol { site } => {
                    Ok(MoveOperation::SymbolMove {
                        old_name: built.old_name,
                        definition: site,
                    })
                }
                // The engine only reports Module for whole-file targets,
                // which take the MoveTarget::Module path.
                Binding::Module => Err(MoveError::UnsupportedMove {
                    name: built.old_name,
                }),
            }
        }
    }
}

/// Compute the change set for an operation against a destination.
///
/// Module moves go into folders; symbol moves into files. A mismatch fails
/// here, before the engine computes anything.
pub fn plan_move(
    engine: &dyn RefactoringEngine,
    project: &Project,
    operation: &MoveOperation,
    destination: &Resource,
) -> Result<MovePlan, MoveError> {
    match operation {
        MoveOperation::ModuleMove { module, old_name } => {
            expect_kind(destination, ResourceKind::Folder)?;
            let changes = engine.module_move_changes(project, module, destination)?;
            let file_name = module.path.file_name().unwrap_or(module.path.as_os_str());
            Ok(MovePlan {
                changes,
                outcome: AppliedMove {
                    old_name: old_name.clone(),
                    old_path: module.path.clone(),
                    new_path: destination.path.join(file_name),
                },
            })
        }
        MoveOperation::SymbolMove {
            old_name,
            definition,
        } => {
            expect_kind(destination, ResourceKind::File)?;
            let changes =
                engine.symbol_move_changes(project, definition, old_name, destination)?;
            Ok(MovePlan {
                changes,
                outcome: AppliedMove {
                    old_name: old_name.clone(),
                    old_path: definition.resource.path.clone(),
                    new_path: destination.path.clone(),
                },
            })
        }
    }
}

/// Plan and commit in one step.
pub fn apply_move(
    engine: &dyn RefactoringEngine,
    project: &Project,
    operation: &MoveOperation,
    destination: &Resource,
) -> Result<AppliedMove, MoveError> {
    plan_move(engine, project, operation, destination)?.commit()
}

/// Compute the change set that renames a module in place.
pub fn plan_rename(
    engine: &dyn RefactoringEngine,
    project: &Project,
    module: &Resource,
    new_name: &str,
) -> Result<MovePlan, MoveError> {
    let built = engine.build_module_move(project, module)?;
    let changes = engine.rename_changes(project, module, new_name)?;
    let new_path = match module.path.parent() {
        Some(parent) if parent != Path::new("") => parent.join(format!("{new_name}.py")),
        _ => PathBuf::from(format!("{new_name}.py")),
    };
    Ok(MovePlan {
        changes,
        outcome: AppliedMove {
            old_name: built.old_name,
            old_path: module.path.clone(),
            new_path,
        },
    })
}

/// Plan and commit a rename in one step.
pub fn rename_module(
    engine: &dyn RefactoringEngine,
    project: &Project,
    module: &Resource,
    new_name: &str,
) -> Result<AppliedMove, MoveError> {
    plan_rename(engine, project, module, new_name)?.commit()
}

fn expect_kind(destination: &Resource, expected: ResourceKind) -> Result<(), MoveError> {
    if destination.kind == expected {
        return Ok(());
    }
    Err(MoveError::DestinationKind {
        expected: expected.describe(),
        found: destination.kind.describe(),
        path: destination.path.clone(),
    })
}
