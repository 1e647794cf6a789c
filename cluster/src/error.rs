//! Cluster-specific error types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClusterError {
    #[error("Job definition rejected: {reason}")]
    Rejected { reason: String },

    #[error("Cluster unreachable: {reason}")]
    Unreachable { reason: String },

    #[error("Unknown job: {job_id}")]
    UnknownJob { job_id: String },

    #[error("Topic already exists: {topic}")]
    TopicExists { topic: String },

    #[error("Unknown topic: {topic}")]
    UnknownTopic { topic: String },

    #[error("Topic closed: {topic}")]
    TopicClosed { topic: String },

    #[error("Source read failed: {message}")]
    SourceError { message: String },
}

impl ClusterError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected { reason: reason.into() }
    }

    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self::Unreachable { reason: reason.into() }
    }
}

pub type ClusterResult<T> = Result<T, ClusterError>;
