//! Trait definitions with mockall annotations for testing
//!
//! [`ClusterClient`] is the only seam between the harness and a cluster, so the
//! harness can be driven against [`crate::LocalCluster`] or a mock.

use std::sync::Arc;

use crate::error::ClusterResult;
use crate::job::{JobDefinition, JobHandle, JobId, JobStatus};

/// Consumer of a job's output stream
///
/// Called from the job's task for every emitted record, so implementations
/// must be cheap and must not block.
pub trait OutputSink: Send + Sync {
    fn on_record(&self, record: String);
}

/// Cluster job operations
#[mockall::automock]
#[async_trait::async_trait]
pub trait ClusterClient: Send + Sync {
    /// Submit a job with its output consumer already attached
    ///
    /// Resolves once the cluster has accepted the definition, assigned an
    /// identifier and started the job.
    async fn submit(&self, job: JobDefinition, sink: Arc<dyn OutputSink>) -> ClusterResult<JobHandle>;

    /// Current status of a job
    async fn status(&self, id: &JobId) -> ClusterResult<JobStatus>;

    /// Cancel a job
    ///
    /// Cancelling a job that already finished or was already cancelled
    /// succeeds; an id the cluster never issued is `UnknownJob`.
    async fn cancel(&self, id: &JobId) -> ClusterResult<()>;
}
