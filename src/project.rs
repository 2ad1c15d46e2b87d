//! Project context and resource resolution.
//!
//! A [`Project`] is the root for one invocation: a canonical root directory,
//! the engine's metadata folder name, and the config loaded from it. Every
//! user-supplied path is resolved through [`Project::resolve`] into a
//! project-relative [`Resource`] before anything else looks at it. The
//! resolver canonicalizes first, so symlinks cannot smuggle a path across
//! the project boundary.

use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use crate::config::{ConfigError, EngineConfig, DEFAULT_METADATA_FOLDER};

/// A project-relative handle to a file or folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Resource {
    /// Path relative to the project root.
    pub path: PathBuf,
    pub kind: ResourceKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    File,
    Folder,
}

impl ResourceKind {
    pub fn describe(self) -> &'static str {
        match self {
            ResourceKind::File => "file",
            ResourceKind::Folder => "folder",
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("path is outside the project: {path} (project: {root})")]
    OutsideProject { path: PathBuf, root: PathBuf },

    #[error("path is excluded from the project: {path}")]
    Excluded { path: PathBuf },

    #[error("cannot map {path} to a project resource: {source}")]
    Unmappable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("not a project directory: {path}")]
    NotADirectory { path: PathBuf },

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// The root context for resource resolution and change application.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    metadata_folder: String,
    config: EngineConfig,
}

impl Project {
    /// Open a project rooted at `root`.
    ///
    /// `metadata_folder` overrides where the engine keeps its metadata,
    /// relative to the project root; the engine default is used when unset.
    pub fn open(root: impl AsRef<Path>, metadata_folder: Option<&str>) -> Result<Self, ProjectError> {
        let given = root.as_ref();
        let root = given
            .canonicalize()
            .map_err(|source| ResolutionError::Unmappable {
                path: given.to_path_buf(),
                source,
            })?;
        if !root.is_dir() {
            return Err(ProjectError::NotADirectory { path: root });
        }

        let metadata_folder = metadata_folder.unwrap_or(DEFAULT_METADATA_FOLDER).to_string();
        let config = EngineConfig::load(&root.join(&metadata_folder))?;

        Ok(Project {
            root,
            metadata_folder,
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn metadata_folder(&self) -> &str {
        &self.metadata_folder
    }

    /// Resolve a user-supplied path to a project-relative resource.
    ///
    /// The path is canonicalized (resolving symlinks and `..`), required to
    /// fall inside the project root, and checked against the engine's
    /// excluded names.
    pub fn resolve(&self, user_path: impl AsRef<Path>) -> Result<Resource, ResolutionError> {
        let user_path = user_path.as_ref();
        let canonical = user_path
            .canonicalize()
            .map_err(|source| ResolutionError::Unmappable {
                path: user_path.to_path_buf(),
                source,
            })?;

        let relative = canonical
            .strip_prefix(&self.root)
            .map_err(|_| ResolutionError::OutsideProject {
                path: canonical.clone(),
                root: self.root.clone(),
            })?
            .to_path_buf();

        if self.is_excluded(&relative) {
            return Err(ResolutionError::Excluded { path: relative });
        }

        let kind = if canonical.is_dir() {
            ResourceKind::Folder
        } else {
            ResourceKind::File
        };

        Ok(Resource {
            path: relative,
            kind,
        })
    }

    /// Absolute path of a resource.
    pub fn absolute(&self, resource: &Resource) -> PathBuf {
        self.root.join(&resource.path)
    }

    /// Read a file resource's full text.
    pub fn read(&self, resource: &Resource) -> std::io::Result<String> {
        fs::read_to_string(self.absolute(resource))
    }

    /// Is a project-relative path excluded from the engine's view?
    ///
    /// Excluded: the metadata folder, hidden entries, `__pycache__`, and
    /// anything named in the config's ignore list.
    pub fn is_excluded(&self, relative: &Path) -> bool {
        relative.components().any(|component| {
            let name = component.as_os_str().to_string_lossy();
            name == self.metadata_folder.as_str()
                || name.starts_with('.')
                || name == "__pycache__"
                || self.config.ignore.iter().any(|entry| entry.as_str() == name)
        })
    }

    /// Every Python source file in the project, as resources.
    ///
    /// Unreadable directory entries are skipped rather than failing the
    /// whole walk.
    pub fn source_files(&self) -> Vec<Resource> {
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root).into_iter().filter_entry(|entry| {
            entry.depth() == 0
                || entry
                    .path()
                    .strip_prefix(&self.root)
                    .map(|rel| !self.is_excluded(rel))
                    .unwrap_or(false)
        });

        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            if entry.path().extension().and_then(|e| e.to_str()) != Some("py") {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(Resource {
                    path: relative.to_path_buf(),
                    kind: ResourceKind::File,
                });
            }
        }

        files.sort_by(|a, b| a.path.cmp(&b.path));
        files
    }
}
