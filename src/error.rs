use std::path::PathBuf;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum CaseError {
    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("unknown case: '{name}'. Available: {}", .available.join(", "))]
    UnknownCase { name: String, available: Vec<String> },

    #[error(
        "ambiguous case name '{name}' found in multiple locations: [{}]. Use 'collection/case' format to specify",
        .sources.join(", ")
    )]
    #[diagnostic(help("pick one of the listed collections, e.g. pcase info <collection>/{name}"))]
    AmbiguousCase { name: String, sources: Vec<String> },

    #[error("manifest error in {path}: {message}")]
    Manifest { path: Utf8PathBuf, message: String },

    #[error("{0}")]
    FileNotFound(String),

    #[error("directory exists: {0}. Use overwrite to replace it")]
    AlreadyExists(Utf8PathBuf),

    #[error("cache error: {0}")]
    Cache(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("registry request failed: {0}")]
    RegistryHttp(String),

    #[error("registry returned status {status}: {message}")]
    RegistryStatus { status: u16, message: String },

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),
}

impl CaseError {
    pub(crate) fn manifest(path: impl Into<Utf8PathBuf>, message: impl Into<String>) -> Self {
        CaseError::Manifest {
            path: path.into(),
            message: message.into(),
        }
    }
}
