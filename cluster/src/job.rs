//! Job model: what gets submitted and what comes back

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::PostProcessMode;
use std::fmt;
use std::net::SocketAddr;
use uuid::Uuid;

/// Opaque identifier the cluster assigns to an accepted job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Where a job reads its input from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceEndpoint {
    /// Connect to a TCP server and read newline-delimited records
    Tcp(SocketAddr),
    /// Subscribe to a broker topic from its first record
    Topic(String),
}

impl fmt::Display for SourceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceEndpoint::Tcp(addr) => write!(f, "tcp://{addr}"),
            SourceEndpoint::Topic(topic) => write!(f, "topic://{topic}"),
        }
    }
}

/// Streaming job submitted to the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub name: String,
    pub source: SourceEndpoint,
    pub post_process: PostProcessMode,
}

impl JobDefinition {
    pub fn new(name: impl Into<String>, source: SourceEndpoint, post_process: PostProcessMode) -> Self {
        Self {
            name: name.into(),
            source,
            post_process,
        }
    }
}

/// Handle to an accepted job; only obtainable from a resolved submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobHandle {
    pub id: JobId,
    pub submitted_at: DateTime<Utc>,
}

impl JobHandle {
    pub fn new(id: JobId) -> Self {
        Self {
            id,
            submitted_at: Utc::now(),
        }
    }
}

/// Lifecycle state of a job on the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Running,
    /// Source reached end-of-stream and every record was emitted
    Finished,
    Cancelled,
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Running)
    }
}
