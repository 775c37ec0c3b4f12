use thiserror::Error;

/// Extension of LESS sources (without dot)
pub const LESS_EXTENSION: &str = "less";

/// Extension of compiled output files (without dot)
pub const CSS_EXTENSION: &str = "css";

/// Settings files looked up in the project root, in order
pub const DEFAULT_CONFIG_FILES: &[&str] = &["lesswatch.json", "lesswatch.jsonc"];

/// Directories never descended into when expanding a selection
pub const SKIPPED_DIRECTORIES: &[&str] = &["node_modules"];

/// Stable profile identifier, never reused within a project
pub type ProfileId = u32;

/// Profile configuration rejected at commit time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Profile name must not be empty")]
    EmptyName,

    #[error("A profile named '{0}' already exists")]
    DuplicateName(String),

    #[error("Profile id {0} appears more than once")]
    DuplicateId(ProfileId),

    #[error("Malformed path: {0:?}")]
    MalformedPath(String),

    #[error("Invalid {field} pattern '{pattern}': {reason}")]
    InvalidPattern { field: &'static str, pattern: String, reason: String },
}

/// Error types for lesswatch operations
#[derive(Error, Debug)]
pub enum LesswatchError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("Invalid working directory: {0}")]
    InvalidCwd(#[from] std::io::Error),

    #[error("Failed to start compile workers: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),
}
