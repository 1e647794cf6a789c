//! Runtime Management
//!
//! Live components of a conformance run: the source server feeding input, the
//! quiet-period sink capturing output and the controller for the cluster job.

pub mod jobs;
pub mod sink;
pub mod source;

// Re-export main types
pub use jobs::JobController;
pub use sink::{Completion, QuietPeriodSink, Snapshot};
pub use source::{
    BrokerSourceServer, MockSourceServer, ServerState, SourceServer, TcpSourceServer, source_server_for,
};
