//! Error Types
//!
//! A single error enum shared by every module. External tool failures,
//! configuration problems and metadata lookups all surface here so the
//! binary can report them uniformly.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReleaseError>;

/// Errors raised while preparing or running a release.
#[derive(Debug, Error)]
pub enum ReleaseError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid YAML in '{path}': {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("No {kind} profile named '{profile}' in the private config")]
    MissingProfile { kind: &'static str, profile: String },

    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    #[error("'{0}' is not a valid table name")]
    InvalidTableName(String),

    #[error("Invalid assembly info '{0}': expected BUILD,ASSEMBLY_NAME,ACCESSION")]
    InvalidAssemblyInfo(String),

    #[error("Unknown collection '{0}'")]
    UnknownCollection(String),

    #[error("No target instance registered for taxonomy {0}")]
    NoTargetInstance(i32),

    #[error("Taxonomy {taxonomy_id} maps to several target instances: {instances:?}")]
    AmbiguousTargetInstance {
        taxonomy_id: i32,
        instances: Vec<String>,
    },

    #[error("{assembly} is not a release assembly of taxonomy {taxonomy_id}")]
    NotReleaseAssembly { taxonomy_id: i32, assembly: String },

    #[error("No release files to validate for {0}")]
    NoReleaseFiles(String),

    #[error("Command '{program}' exited with status {code}")]
    CommandFailed { program: String, code: i32 },

    #[error("Failed to signal process {pid}: {reason}")]
    Signal { pid: u32, reason: String },

    #[error("No free local port at or above {0}")]
    NoFreePort(u16),

    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),
}

impl ReleaseError {
    pub fn command_failed(program: impl Into<String>, code: i32) -> Self {
        Self::CommandFailed {
            program: program.into(),
            code,
        }
    }
}
