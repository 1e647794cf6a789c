//! Cluster Job Controller
//!
//! Thin wrapper over a [`ClusterClient`] that gives the orchestrator the
//! guarantees it relies on: cancellation can only name a handle that a
//! resolved submission produced, and cancelling is safe to call
//! unconditionally during cleanup.

use std::sync::Arc;

use cluster::{ClusterClient, ClusterError, JobDefinition, JobHandle, JobStatus, OutputSink};
use shared::{ComponentId, component_debug, component_info, component_warn};

use crate::error::{HarnessError, HarnessResult};

const COMPONENT: ComponentId = ComponentId::Cluster;

pub struct JobController<C: ClusterClient> {
    cluster: C,
}

impl<C: ClusterClient> JobController<C> {
    pub fn new(cluster: C) -> Self {
        Self { cluster }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Submit a job with its output consumer attached
    pub async fn submit(&self, job: JobDefinition, sink: Arc<dyn OutputSink>) -> HarnessResult<JobHandle> {
        let name = job.name.clone();
        let handle = self.cluster.submit(job, sink).await.map_err(HarnessError::Submission)?;
        component_info!(COMPONENT, "📨 Job '{}' accepted as {}", name, handle.id);
        Ok(handle)
    }

    pub async fn status(&self, handle: &JobHandle) -> HarnessResult<JobStatus> {
        self.cluster.status(&handle.id).await.map_err(HarnessError::Submission)
    }

    /// Cancel the job behind `handle`, if there is one
    ///
    /// No handle means submission never resolved, so there is nothing to ask
    /// the cluster. A job the cluster no longer knows counts as already gone.
    pub async fn cancel(&self, handle: Option<&JobHandle>) -> HarnessResult<()> {
        let Some(handle) = handle else {
            component_debug!(COMPONENT, "No submitted job to cancel");
            return Ok(());
        };

        match self.cluster.cancel(&handle.id).await {
            Ok(()) => {
                component_info!(COMPONENT, "⏹️ Job {} cancelled", handle.id);
                Ok(())
            }
            Err(ClusterError::UnknownJob { job_id }) => {
                component_warn!(COMPONENT, "⚠️ Job {} unknown to the cluster, treating as gone", job_id);
                Ok(())
            }
            Err(e) => Err(HarnessError::Cancellation {
                job_id: handle.id.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}
