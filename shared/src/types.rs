//! Domain types shared between the harness and the cluster

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tokio::time::Instant;

use crate::errors::SharedError;

const SAMPLE_INPUT: &str = include_str!("../fixtures/sample/input.nt");
const SAMPLE_OUTPUT: &str = include_str!("../fixtures/sample/output.nt");

/// Component that emits a log line
///
/// Always passed explicitly to the logging macros; there is no process-wide
/// "current component".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    /// Test case orchestrator and run driver
    Orchestrator,
    /// Quiet-period sink
    Sink,
    /// Cluster job controller and the local cluster
    Cluster,
    /// A source server of the given protocol
    Source(SourceKind),
    /// Standalone line relay
    Relay,
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComponentId::Orchestrator => write!(f, "orchestrator"),
            ComponentId::Sink => write!(f, "sink"),
            ComponentId::Cluster => write!(f, "cluster"),
            ComponentId::Source(kind) => write!(f, "source_{kind}"),
            ComponentId::Relay => write!(f, "relay"),
        }
    }
}

/// Protocol used to feed recorded input into the job under test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Plain TCP socket, one record per line
    Tcp,
    /// Topic on the message broker
    #[default]
    Broker,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Tcp => write!(f, "tcp"),
            SourceKind::Broker => write!(f, "broker"),
        }
    }
}

impl FromStr for SourceKind {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tcp" => Ok(SourceKind::Tcp),
            "broker" | "kafka" => Ok(SourceKind::Broker),
            other => Err(SharedError::UnknownSourceKind { input: other.to_string() }),
        }
    }
}

/// How the job post-processes its output before it reaches the sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum PostProcessMode {
    /// Every statement is emitted as its own record
    #[default]
    None,
    /// Statements of a batch are emitted as one newline-joined record
    Bulk,
    /// Statements of a batch are emitted as one JSON-LD document
    JsonLd,
}

impl fmt::Display for PostProcessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PostProcessMode::None => write!(f, "none"),
            PostProcessMode::Bulk => write!(f, "bulk"),
            PostProcessMode::JsonLd => write!(f, "json-ld"),
        }
    }
}

impl FromStr for PostProcessMode {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(PostProcessMode::None),
            "bulk" => Ok(PostProcessMode::Bulk),
            "json-ld" | "jsonld" => Ok(PostProcessMode::JsonLd),
            other => Err(SharedError::UnknownPostProcessMode { input: other.to_string() }),
        }
    }
}

/// One conformance test case: recorded input plus the expected output set
///
/// Immutable once loaded. The run driver owns it and lends it to the
/// orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,
    pub input: Vec<String>,
    pub expected: Vec<String>,
}

impl TestCase {
    pub fn new(name: impl Into<String>, input: Vec<String>, expected: Vec<String>) -> Self {
        Self {
            name: name.into(),
            input,
            expected,
        }
    }

    /// Built-in sample case used when no fixture directory is given
    pub fn sample() -> Self {
        Self::new("sample", non_blank_lines(SAMPLE_INPUT), non_blank_lines(SAMPLE_OUTPUT))
    }
}

fn non_blank_lines(text: &str) -> Vec<String> {
    text.lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// One output unit emitted by the job and captured by the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub payload: String,
    /// Only used to drive the idle timer
    pub arrived_at: Instant,
}

impl CapturedRecord {
    pub fn new(payload: String) -> Self {
        Self {
            payload,
            arrived_at: Instant::now(),
        }
    }
}
