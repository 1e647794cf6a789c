//! In-process cluster
//!
//! Runs each submitted job as a task on the runtime handle passed to
//! [`LocalCluster::new`]. A job reads its source, applies its post-processor
//! and pushes every resulting record into the sink it was submitted with.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines};
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};

use shared::{ComponentId, component_debug, component_info, component_warn};

use crate::broker::{EmbeddedBroker, TopicSubscription};
use crate::error::{ClusterError, ClusterResult};
use crate::job::{JobDefinition, JobHandle, JobId, JobStatus, SourceEndpoint};
use crate::postprocess::PostProcessor;
use crate::traits::{ClusterClient, OutputSink};

const COMPONENT: ComponentId = ComponentId::Cluster;

/// Upper bound on the records gathered into one post-processing batch
const MAX_BATCH: usize = 256;

struct JobEntry {
    name: String,
    status: JobStatus,
    task: Option<JoinHandle<()>>,
}

type JobTable = Arc<RwLock<HashMap<JobId, JobEntry>>>;

/// In-process implementation of [`ClusterClient`]
pub struct LocalCluster {
    runtime: Handle,
    broker: EmbeddedBroker,
    jobs: JobTable,
    accepting: AtomicBool,
    connect_timeout: Duration,
    batch_linger: Duration,
}

impl LocalCluster {
    /// Create a cluster that spawns its jobs on `runtime`
    pub fn new(runtime: Handle, broker: EmbeddedBroker) -> Self {
        Self {
            runtime,
            broker,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            accepting: AtomicBool::new(true),
            connect_timeout: Duration::from_secs(5),
            batch_linger: Duration::from_millis(50),
        }
    }

    /// Configure how long a TCP source connection is retried (fluent API)
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Configure how long a batching job waits for more records (fluent API)
    pub fn with_batch_linger(mut self, batch_linger: Duration) -> Self {
        self.batch_linger = batch_linger;
        self
    }

    pub fn broker(&self) -> &EmbeddedBroker {
        &self.broker
    }

    /// Number of jobs currently running
    pub async fn running_jobs(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|entry| entry.status == JobStatus::Running)
            .count()
    }

    /// Number of jobs the cluster still tracks, whatever their status
    pub async fn tracked_jobs(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Cancel every running job, forget all jobs and refuse further submissions
    ///
    /// Until shutdown, terminal jobs stay in the table so their status can be
    /// queried and cancelling them stays idempotent.
    pub async fn shutdown(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        let mut jobs = self.jobs.write().await;
        for (id, mut entry) in jobs.drain() {
            if entry.status == JobStatus::Running {
                if let Some(task) = entry.task.take() {
                    task.abort();
                }
                component_debug!(COMPONENT, "🛑 Cancelled job '{}' ({}) on shutdown", entry.name, id);
            }
        }
        component_info!(COMPONENT, "🛑 Local cluster shut down");
    }

    async fn open_source(&self, endpoint: &SourceEndpoint) -> ClusterResult<SourceReader> {
        match endpoint {
            SourceEndpoint::Tcp(addr) => {
                let deadline = Instant::now() + self.connect_timeout;
                loop {
                    match TcpStream::connect(addr).await {
                        Ok(stream) => return Ok(SourceReader::Tcp(BufReader::new(stream).lines())),
                        Err(e) if Instant::now() >= deadline => {
                            return Err(ClusterError::rejected(format!("cannot connect to source {addr}: {e}")));
                        }
                        Err(_) => sleep(Duration::from_millis(50)).await,
                    }
                }
            }
            SourceEndpoint::Topic(topic) => self
                .broker
                .subscribe(topic)
                .map(SourceReader::Topic)
                .map_err(|e| ClusterError::rejected(format!("cannot subscribe to source: {e}"))),
        }
    }
}

#[async_trait]
impl ClusterClient for LocalCluster {
    async fn submit(&self, job: JobDefinition, sink: Arc<dyn OutputSink>) -> ClusterResult<JobHandle> {
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(ClusterError::unreachable("local cluster is shut down"));
        }
        if job.name.trim().is_empty() {
            return Err(ClusterError::rejected("job name must not be empty"));
        }

        let reader = self.open_source(&job.source).await?;
        let handle = JobHandle::new(JobId::new());
        let processor = PostProcessor::new(job.post_process);

        // Hold the table lock across spawn so the task cannot report before it is registered
        let mut jobs = self.jobs.write().await;
        let task = self.runtime.spawn(run_job(
            handle.id,
            reader,
            processor,
            sink,
            self.batch_linger,
            self.jobs.clone(),
        ));
        jobs.insert(
            handle.id,
            JobEntry {
                name: job.name.clone(),
                status: JobStatus::Running,
                task: Some(task),
            },
        );

        component_info!(
            COMPONENT,
            "▶️ Job '{}' ({}) running from {} with post-process {}",
            job.name,
            handle.id,
            job.source,
            job.post_process
        );
        Ok(handle)
    }

    async fn status(&self, id: &JobId) -> ClusterResult<JobStatus> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|entry| entry.status.clone())
            .ok_or_else(|| ClusterError::UnknownJob { job_id: id.to_string() })
    }

    async fn cancel(&self, id: &JobId) -> ClusterResult<()> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| ClusterError::UnknownJob { job_id: id.to_string() })?;

        if entry.status.is_terminal() {
            component_debug!(COMPONENT, "Job '{}' ({}) already {:?}", entry.name, id, entry.status);
            return Ok(());
        }
        if let Some(task) = entry.task.take() {
            task.abort();
        }
        entry.status = JobStatus::Cancelled;
        component_info!(COMPONENT, "⏹️ Cancelled job '{}' ({})", entry.name, id);
        Ok(())
    }
}

enum SourceReader {
    Tcp(Lines<BufReader<TcpStream>>),
    Topic(TopicSubscription),
}

impl SourceReader {
    /// Cancel safe for both variants
    async fn next(&mut self) -> ClusterResult<Option<String>> {
        match self {
            SourceReader::Tcp(lines) => lines
                .next_line()
                .await
                .map_err(|e| ClusterError::SourceError { message: e.to_string() }),
            SourceReader::Topic(subscription) => Ok(subscription.next().await),
        }
    }
}

async fn run_job(
    id: JobId,
    mut reader: SourceReader,
    processor: PostProcessor,
    sink: Arc<dyn OutputSink>,
    batch_linger: Duration,
    jobs: JobTable,
) {
    let outcome = pump(&mut reader, processor, sink.as_ref(), batch_linger).await;

    let mut jobs = jobs.write().await;
    if let Some(entry) = jobs.get_mut(&id) {
        entry.task = None;
        if entry.status == JobStatus::Running {
            entry.status = match outcome {
                Ok(emitted) => {
                    component_info!(COMPONENT, "🏁 Job '{}' ({}) finished after {} records", entry.name, id, emitted);
                    JobStatus::Finished
                }
                Err(e) => {
                    component_warn!(COMPONENT, "⚠️ Job '{}' ({}) failed: {}", entry.name, id, e);
                    JobStatus::Failed(e.to_string())
                }
            };
        }
    }
}

/// Move records from source to sink until end-of-stream; returns records emitted
async fn pump(
    reader: &mut SourceReader,
    processor: PostProcessor,
    sink: &dyn OutputSink,
    batch_linger: Duration,
) -> ClusterResult<usize> {
    let mut emitted = 0;
    loop {
        let Some(first) = reader.next().await? else {
            return Ok(emitted);
        };
        if first.trim().is_empty() {
            continue;
        }

        let mut batch = vec![first];
        let mut exhausted = false;
        let mut failure = None;
        if processor.batches() {
            while batch.len() < MAX_BATCH {
                match timeout(batch_linger, reader.next()).await {
                    Ok(Ok(Some(record))) if record.trim().is_empty() => {}
                    Ok(Ok(Some(record))) => batch.push(record),
                    Ok(Ok(None)) => {
                        exhausted = true;
                        break;
                    }
                    Ok(Err(e)) => {
                        failure = Some(e);
                        break;
                    }
                    Err(_) => break,
                }
            }
        }

        for record in processor.process(batch) {
            sink.on_record(record);
            emitted += 1;
        }

        if let Some(e) = failure {
            return Err(e);
        }
        if exhausted {
            return Ok(emitted);
        }
    }
}
