//! Shared error types for the conformance harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SharedError {
    #[error("Unknown source kind: {input}")]
    UnknownSourceKind { input: String },

    #[error("Unknown post-process mode: {input}")]
    UnknownPostProcessMode { input: String },
}

pub type SharedResult<T> = Result<T, SharedError>;
