use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The work-unit factory could not build a unit. Aborts the whole batch.
    #[error("Setup error for task '{task}': {message}")]
    Setup { task: String, message: String },

    /// A unit's run failed. Never escapes a batch call.
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("invalid dependency graph: {0}")]
    InvalidGraph(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Task join error: {0}")]
    TaskJoin(String),
}

impl Error {
    /// Build a setup error for the task whose unit could not be created.
    pub fn setup(task: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Setup {
            task: task.into(),
            message: message.to_string(),
        }
    }

    /// True for the errors that mean a batch never validly started.
    pub fn is_batch_error(&self) -> bool {
        matches!(
            self,
            Error::Setup { .. } | Error::InvalidGraph(_) | Error::Validation(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
