//! The refactoring engine seam.
//!
//! The orchestration core never mutates files on its own; it asks an engine
//! to find occurrences, resolve a definition site into a move intent, and
//! compute the [`ChangeSet`] implementing a move or rename. The trait keeps
//! the core testable against scripted engines, and [`TextEngine`] is the
//! shipped implementation: a text-level engine that understands Python just
//! well enough for whole-module operations and top-level symbol moves.

pub mod changes;
pub mod errors;
pub mod imports;
pub mod occurrences;
pub mod text;

pub use changes::{ChangeOp, ChangeSet, WriteVerification};
pub use errors::EngineError;
pub use occurrences::Occurrence;
pub use text::TextEngine;

use crate::locate::DefinitionSite;
use crate::project::{Project, Resource};

/// A computed intent to relocate a definition, before any change exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltMove {
    /// Human-readable name of what would move (symbol or dotted module).
    pub old_name: String,
    pub binding: Binding,
}

/// What the name at a move's origin actually binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Binding {
    /// The origin is a whole module file.
    Module,
    /// A genuine definition or top-level assignment in this project.
    Definition { site: DefinitionSite },
    /// A name bound by importing a module (`import m`, `import m as a`,
    /// `from p import sub` where `sub` is a module). Not movable as a
    /// symbol.
    ImportedModule { target: String },
    /// A name imported from another module, resolved to its definition
    /// site there.
    ImportedSymbol { site: DefinitionSite },
}

/// The engine capabilities the orchestration core depends on.
pub trait RefactoringEngine {
    /// Every occurrence of `name` within `resource`, in document order.
    fn occurrences(
        &self,
        project: &Project,
        resource: &Resource,
        name: &str,
    ) -> Result<Vec<Occurrence>, EngineError>;

    /// Build a move intent for the symbol at a definition site, resolving
    /// the name there to its binding.
    fn build_move(
        &self,
        project: &Project,
        site: &DefinitionSite,
    ) -> Result<BuiltMove, EngineError>;

    /// Build a move intent for a whole module file.
    fn build_module_move(
        &self,
        project: &Project,
        module: &Resource,
    ) -> Result<BuiltMove, EngineError>;

    /// Compute the changes that move a module file into a folder.
    fn module_move_changes(
        &self,
        project: &Project,
        module: &Resource,
        dest_folder: &Resource,
    ) -> Result<ChangeSet, EngineError>;

    /// Compute the changes that relocate a top-level symbol's definition
    /// into another file.
    fn symbol_move_changes(
        &self,
        project: &Project,
        definition: &DefinitionSite,
        name: &str,
        dest_file: &Resource,
    ) -> Result<ChangeSet, EngineError>;

    /// Compute the changes that rename a module file.
    fn rename_changes(
        &self,
        project: &Project,
        module: &Resource,
        new_name: &str,
    ) -> Result<ChangeSet, EngineError>;
}
