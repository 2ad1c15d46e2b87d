use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use modshift::{
    fixup_imports, locate, plan_move, plan_rename, select_move, ChangeSet, MoveTarget, Project,
    Resource, Selector, TextEngine, WalkSearch,
};
use similar::{ChangeTag, TextDiff};
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(Parser)]
#[command(name = "modshift")]
#[command(about = "Move and rename refactorings for Python codebases", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ProjectOpts {
    /// The project to work on
    #[arg(long, value_name = "DIR", default_value = ".")]
    project: PathBuf,

    /// The location of the engine's metadata folder relative to the project root
    #[arg(long, value_name = "NAME")]
    ropefolder: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Move a module into another folder
    MoveModule {
        /// The path to the module file
        source_file: PathBuf,

        /// The destination folder path
        dest_folder: PathBuf,

        #[command(flatten)]
        opts: ProjectOpts,

        /// Show unified diffs of rewritten files
        #[arg(long)]
        diff: bool,
    },

    /// Rename a module
    RenameModule {
        /// The path to the module file
        module_file: PathBuf,

        /// The new name of the module
        new_name: String,

        #[command(flatten)]
        opts: ProjectOpts,

        /// Show unified diffs of rewritten files
        #[arg(long)]
        diff: bool,
    },

    /// Move the definition of a global symbol to another file, located by byte offset
    MoveSymbolByOffset {
        /// The path to the file containing the symbol to move
        source_file: PathBuf,

        /// The byte offset of the symbol within the file
        offset: usize,

        /// The destination file path
        dest_file: PathBuf,

        #[command(flatten)]
        opts: ProjectOpts,

        /// Show unified diffs of rewritten files
        #[arg(long)]
        diff: bool,
    },

    /// Move the definition of a global symbol to another file, located by name
    MoveSymbolByName {
        /// The path to the file containing the symbol to move
        source_file: PathBuf,

        /// The name of the symbol to move
        name: String,

        /// The destination file path
        dest_file: PathBuf,

        #[command(flatten)]
        opts: ProjectOpts,

        /// Show unified diffs of rewritten files
        #[arg(long)]
        diff: bool,
    },

    /// Rewrite fully-qualified references to a symbol into direct imports
    FixupImports {
        /// The module the symbol now lives in
        module: String,

        /// The symbol name
        symbol: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::MoveModule {
            source_file,
            dest_folder,
            opts,
            diff,
        } => cmd_move_module(source_file, dest_folder, opts, diff),

        Commands::RenameModule {
            module_file,
            new_name,
            opts,
            diff,
        } => cmd_rename_module(module_file, new_name, opts, diff),

        Commands::MoveSymbolByOffset {
            source_file,
            offset,
            dest_file,
            opts,
            diff,
        } => cmd_move_symbol(
            source_file,
            SymbolSelector::Offset(offset),
            dest_file,
            opts,
            diff,
        ),

        Commands::MoveSymbolByName {
            source_file,
            name,
            dest_file,
            opts,
            diff,
        } => cmd_move_symbol(
            source_file,
            SymbolSelector::Name(name),
            dest_file,
            opts,
            diff,
        ),

        Commands::FixupImports { module, symbol } => cmd_fixup_imports(module, symbol),
    }
}

/// Abort before anything was written.
fn fail_unchanged(err: impl fmt::Display) -> ! {
    eprintln!("{} {}", "error:".red().bold(), err);
    eprintln!("{}", "No files were modified.".dimmed());
    process::exit(1);
}

/// Abort after change application started.
fn fail_mid_apply(err: impl fmt::Display) -> ! {
    eprintln!("{} {}", "error:".red().bold(), err);
    eprintln!(
        "{}",
        "Some files may have been left modified; check your working tree.".yellow()
    );
    process::exit(1);
}

fn open_project(opts: &ProjectOpts) -> Project {
    match Project::open(&opts.project, opts.ropefolder.as_deref()) {
        Ok(project) => project,
        Err(err) => fail_unchanged(err),
    }
}

fn resolve(project: &Project, path: &Path) -> Resource {
    match project.resolve(path) {
        Ok(resource) => resource,
        Err(err) => fail_unchanged(err),
    }
}

fn cmd_move_module(
    source_file: PathBuf,
    dest_folder: PathBuf,
    opts: ProjectOpts,
    diff: bool,
) -> Result<()> {
    let project = open_project(&opts);
    let source = resolve(&project, &source_file);
    let dest = resolve(&project, &dest_folder);
    let engine = TextEngine::new();

    let operation = match select_move(&engine, &project, MoveTarget::Module(source)) {
        Ok(operation) => operation,
        Err(err) => fail_unchanged(err),
    };
    println!("Moving definition of `{}`", operation.old_name());
    println!(
        "Definition is currently at: {}",
        operation.current_location().display()
    );

    let plan = match plan_move(&engine, &project, &operation, &dest) {
        Ok(plan) => plan,
        Err(err) => fail_unchanged(err),
    };
    let before = capture_before(diff, plan.changes());

    let applied = match plan.commit() {
        Ok(applied) => applied,
        Err(err) => fail_mid_apply(err),
    };
    println!(
        "Module `{}` moved to: {}",
        applied.old_path.display(),
        dest.path.display()
    );

    show_diffs(before);
    Ok(())
}

fn cmd_rename_module(
    module_file: PathBuf,
    new_name: String,
    opts: ProjectOpts,
    diff: bool,
) -> Result<()> {
    let project = open_project(&opts);
    let module = resolve(&project, &module_file);
    let engine = TextEngine::new();

    let plan = match plan_rename(&engine, &project, &module, &new_name) {
        Ok(plan) => plan,
        Err(err) => fail_unchanged(err),
    };
    let before = capture_before(diff, plan.changes());

    let applied = match plan.commit() {
        Ok(applied) => applied,
        Err(err) => fail_mid_apply(err),
    };
    println!(
        "Module `{}` renamed to: {}",
        applied.old_path.display(),
        applied.new_path.display()
    );

    show_diffs(before);
    Ok(())
}

enum SymbolSelector {
    Offset(usize),
    Name(String),
}

fn cmd_move_symbol(
    source_file: PathBuf,
    selector: SymbolSelector,
    dest_file: PathBuf,
    opts: ProjectOpts,
    diff: bool,
) -> Result<()> {
    let project = open_project(&opts);
    let source = resolve(&project, &source_file);
    let dest = resolve(&project, &dest_file);
    let engine = TextEngine::new();

    let selector = match &selector {
        SymbolSelector::Offset(offset) => Selector::Offset(*offset),
        SymbolSelector::Name(name) => Selector::Name(name),
    };
    let site = match locate(&engine, &project, &source, selector) {
        Ok(site) => site,
        Err(err) => fail_unchanged(err),
    };

    let operation = match select_move(&engine, &project, MoveTarget::Symbol(site)) {
        Ok(operation) => operation,
        Err(err) => fail_unchanged(err),
    };
    println!("Moving definition of `{}`", operation.old_name());
    println!(
        "Definition is currently at: {}",
        operation.current_location().display()
    );

    let plan = match plan_move(&engine, &project, &operation, &dest) {
        Ok(plan) => plan,
        Err(err) => fail_unchanged(err),
    };
    let before = capture_before(diff, plan.changes());

    let applied = match plan.commit() {
        Ok(applied) => applied,
        Err(err) => fail_mid_apply(err),
    };
    println!(
        "Definition of `{}` moved to: {}",
        applied.old_name,
        applied.new_path.display()
    );

    show_diffs(before);
    Ok(())
}

fn cmd_fixup_imports(module: String, symbol: String) -> Result<()> {
    let root = env::current_dir()?;
    let report = match fixup_imports(&root, &module, &symbol, &WalkSearch) {
        Ok(report) => report,
        Err(err) => fail_unchanged(err),
    };

    if report.is_empty() {
        println!("No files reference `{module}.{symbol}`.");
        return Ok(());
    }

    let mut fixed = 0;
    let mut failed = 0;
    for (path, result) in &report {
        match result {
            Ok(stats) => {
                println!(
                    "{} {}: {} reference(s) rewritten",
                    "✓".green(),
                    path.display(),
                    stats.replaced
                );
                fixed += 1;
            }
            Err(err) => {
                eprintln!("{} {}: {}", "✗".red(), path.display(), err);
                failed += 1;
            }
        }
    }

    println!();
    println!("{}", "Summary:".bold());
    println!("  {} fixed", format!("{}", fixed).green());
    println!("  {} failed", format!("{}", failed).red());

    if failed > 0 {
        process::exit(1);
    }

    Ok(())
}

/// Capture rewrite targets' contents before the commit, for diff output.
fn capture_before(diff: bool, changes: &ChangeSet) -> HashMap<PathBuf, String> {
    let mut contents = HashMap::new();
    if !diff {
        return contents;
    }
    for path in changes.rewrite_targets() {
        if let Ok(content) = fs::read_to_string(path) {
            contents.insert(path.to_path_buf(), content);
        }
    }
    contents
}

fn show_diffs(before: HashMap<PathBuf, String>) {
    let mut paths: Vec<_> = before.keys().cloned().collect();
    paths.sort();
    for path in paths {
        // A rewritten file may have moved afterwards; skip what's gone.
        let Ok(after) = fs::read_to_string(&path) else {
            continue;
        };
        let original = &before[&path];
        if original != &after {
            display_diff(&path, original, &after);
        }
    }
}

/// Show unified diff between original and modified content.
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (rewritten)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}
