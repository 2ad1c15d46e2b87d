use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("offset {offset} does not fall on an identifier")]
    NotAnIdentifier { offset: usize },

    #[error("`{name}` does not resolve to a definition the engine can follow")]
    UnresolvableName { name: String },

    #[error("`{name}` has {count} top-level bindings, expected exactly 1")]
    AmbiguousReference { name: String, count: usize },

    #[error("`{name}` is not defined at the top level of its module")]
    NotTopLevel { name: String },

    #[error("name collision at destination: {path}")]
    NameCollision { path: PathBuf },

    #[error("{path} is not a Python module")]
    NotAModule { path: PathBuf },

    #[error("`{name}` is not a valid module name")]
    InvalidName { name: String },

    #[error("file changed since the edit was computed: {path}")]
    ChangeConflict { path: PathBuf },

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }
}
