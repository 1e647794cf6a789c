//! Conformance harness for streaming jobs
//!
//! Feeds the recorded input of a test case into a job through a source server,
//! captures the job's output with a quiet-period sink and compares it against
//! the expected records.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use cluster::{EmbeddedBroker, LocalCluster};
//! use shared::TestCase;
//! use tester::*;
//!
//! # async fn run() -> HarnessResult<()> {
//! let config = HarnessConfig::builder().broker().try_build()?;
//! let runtime = tokio::runtime::Handle::current();
//! let broker = EmbeddedBroker::new();
//!
//! let sink = Arc::new(QuietPeriodSink::new(runtime.clone(), config.idle_period));
//! let mut server = source_server_for(config.source_kind, &config, runtime.clone(), broker.clone());
//! let orchestrator = TestCaseOrchestrator::new(LocalCluster::new(runtime, broker), sink, config);
//!
//! let verdict = orchestrator.run(&TestCase::sample(), server.as_mut()).await?;
//! assert!(verdict.is_pass());
//! # Ok(())
//! # }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod orchestrator;
pub mod relay;
pub mod runtime;
pub mod testing;

// Main interfaces - re-exported at crate root for convenience
pub use config::{HarnessConfig, HarnessConfigBuilder};
pub use error::{HarnessError, HarnessResult};
pub use orchestrator::{Stage, TestCaseOrchestrator};

// Supporting types
pub use runtime::{
    BrokerSourceServer, Completion, JobController, QuietPeriodSink, ServerState, SourceServer, TcpSourceServer,
    source_server_for,
};
pub use testing::{FailureReason, FixtureLoader, Sanitizer, Verdict, compare, sanitizer_for};
