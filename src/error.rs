//! Error types for the triage pipeline.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TriageError {
    #[error("no report URL found in {path:?}")]
    MissingUrl { path: PathBuf },

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("malformed report page for {assignment}: {reason}")]
    MalformedPage { assignment: String, reason: String },

    #[error("invalid match percentage {value:?} in {assignment}")]
    InvalidPercent { assignment: String, value: String },

    #[error("failed to render {target}: {reason}")]
    Render { target: String, reason: String },

    #[error("submission script {path:?} exited with {status}")]
    ScriptFailed { path: PathBuf, status: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to move export into place: {0}")]
    Persist(#[from] tempfile::PersistError),
}

pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    pub fn malformed(assignment: &str, reason: impl Into<String>) -> Self {
        TriageError::MalformedPage {
            assignment: assignment.to_string(),
            reason: reason.into(),
        }
    }

    pub fn render(target: impl Into<String>, reason: impl ToString) -> Self {
        TriageError::Render {
            target: target.into(),
            reason: reason.to_string(),
        }
    }
}
