//! Error types for the regression harness

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegressError {
    #[error("baseline directory already exists: {}", .0.display())]
    ConfigConflict(PathBuf),

    #[error("cannot specify both --minimal and --full")]
    ConflictingModes,

    #[error("baseline input images missing in {} (run with \"baseline\" first)", .dir.display())]
    NoBaselineInputs { dir: PathBuf, feature: String },

    #[error("baseline input image missing: {}", .0.display())]
    MissingFeatureFile(PathBuf),

    #[error("baseline output image missing: {} (run with \"baseline\" first)", .0.display())]
    MissingReferenceImage(PathBuf),

    #[error("{}", process_failure_message(.log.as_deref()))]
    ProcessFailure {
        command: String,
        log: Option<PathBuf>,
    },

    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid feature set: {0}")]
    InvalidFeatureSet(String),

    #[error("invalid suite file {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("invalid scan pattern: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn process_failure_message(log: Option<&std::path::Path>) -> String {
    match log {
        Some(log) => format!("test failed, see \"{}\" for details", log.display()),
        None => "test failed".to_string(),
    }
}

impl RegressError {
    /// Process exit status the harness reports for this failure.
    pub fn exit_code(&self) -> u8 {
        1
    }

    /// The offending command, when the failure came from an external process.
    pub fn command(&self) -> Option<&str> {
        match self {
            RegressError::ProcessFailure { command, .. } | RegressError::Spawn { command, .. } => {
                Some(command)
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RegressError>;
