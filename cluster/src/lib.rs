//! Stream-processing cluster as seen by the conformance harness
//!
//! The harness only ever talks to a cluster through [`ClusterClient`]: submit a
//! job with an attached [`OutputSink`], poll its status, cancel it. This crate
//! also ships [`LocalCluster`], an in-process cluster that runs every job as a
//! task on a runtime handle supplied by the caller, together with the
//! [`EmbeddedBroker`] its topic sources read from.

pub mod broker;
pub mod error;
pub mod job;
pub mod local;
pub mod postprocess;
pub mod traits;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use broker::{EmbeddedBroker, TopicSubscription};
pub use error::{ClusterError, ClusterResult};
pub use job::{JobDefinition, JobHandle, JobId, JobStatus, SourceEndpoint};
pub use local::LocalCluster;
pub use postprocess::{PostProcessor, Term, Triple};
pub use traits::{ClusterClient, MockClusterClient, OutputSink};
