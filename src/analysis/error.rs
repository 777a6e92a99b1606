//! Fatal errors. Everything recoverable goes through diagnostics instead.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unreadable input: {reason}")]
    UnreadableInput { reason: String },

    #[error("failed to read log file {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown entity '{identifier}'")]
    UnknownEntity { identifier: String },
}

impl AnalysisError {
    pub fn unreadable(reason: impl Into<String>) -> Self {
        Self::UnreadableInput {
            reason: reason.into(),
        }
    }
}
