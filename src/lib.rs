//! Modshift: move and rename refactorings for Python codebases.
//!
//! Relocates module files, renames modules, and moves top-level symbol
//! definitions between files, rewriting the import statements the engine
//! can see statically. A separate fixup pass rewrites fully-qualified
//! `module.symbol` call sites across a tree into a direct import plus the
//! bare name.
//!
//! # Architecture
//!
//! The orchestration core makes the decisions: resolving user input to a
//! [`project::Resource`] and a [`locate::DefinitionSite`], classifying the
//! move ([`moves::select_move`]), and applying the resulting
//! [`engine::ChangeSet`]. All analysis and change computation sits behind
//! the [`engine::RefactoringEngine`] seam; [`engine::TextEngine`] is the
//! shipped text-level implementation.
//!
//! # Safety
//!
//! - Every path resolves through the project boundary before use
//! - Rewrites verify expected before-text before applying
//! - Change sets apply all-or-nothing with a rollback journal
//! - Atomic file writes (tempfile + fsync + rename)

pub mod config;
pub mod engine;
pub mod fixup;
pub mod locate;
pub mod moves;
pub mod project;

// Re-exports
pub use config::{ConfigError, EngineConfig};
pub use engine::{
    Binding, BuiltMove, ChangeOp, ChangeSet, EngineError, Occurrence, RefactoringEngine,
    TextEngine, WriteVerification,
};
pub use fixup::{fixup_imports, FileSearch, FixupReport, FixupStats, WalkSearch};
pub use locate::{locate, DefinitionSite, LocateError, Selector};
pub use moves::{
    apply_move, plan_move, plan_rename, rename_module, select_move, AppliedMove, MoveError,
    MoveOperation, MovePlan, MoveTarget,
};
pub use project::{Project, ProjectError, Resource, ResolutionError, ResourceKind};
