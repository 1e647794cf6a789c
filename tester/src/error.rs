//! Harness error types

use std::time::Duration;
use thiserror::Error;

use cluster::ClusterError;
use shared::{SharedError, SourceKind};

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Source server setup failed ({kind}): {reason}")]
    ServerSetup { kind: SourceKind, reason: String },

    #[error("Source transport failed: {reason}")]
    Transport { reason: String },

    #[error("Job submission failed: {0}")]
    Submission(#[source] ClusterError),

    #[error("Sink did not go quiet within {waited:?}")]
    SinkTimeout { waited: Duration },

    #[error("Output of '{case}' does not conform: {reason}")]
    ComparisonFailure { case: String, reason: String },

    #[error("Job cancellation failed for {job_id}: {reason}")]
    Cancellation { job_id: String, reason: String },

    #[error("Fixture error at {path}: {reason}")]
    Fixture { path: String, reason: String },

    #[error("Configuration error: {field}: {reason}")]
    Config { field: String, reason: String },

    #[error("Shared component error: {0}")]
    Shared(#[from] SharedError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport { reason: reason.into() }
    }

    pub fn config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Config {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn fixture(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fixture {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
