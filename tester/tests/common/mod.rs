//! Recording fakes shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

use cluster::{ClusterClient, ClusterError, ClusterResult, JobDefinition, JobHandle, JobId, JobStatus, OutputSink, SourceEndpoint};
use shared::SourceKind;
use tester::{HarnessError, HarnessResult, QuietPeriodSink, ServerState, SourceServer};

/// Ordered log of observable calls
#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub fn record(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| e.as_str() == entry).count()
    }
}

pub fn records(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|line| line.to_string()).collect()
}

/// Source server whose "job" echoes every written record straight into the sink
pub struct RecordingServer {
    journal: Journal,
    sink: Arc<QuietPeriodSink>,
    state: ServerState,
    fail_write: bool,
    panic_on_write: bool,
}

impl RecordingServer {
    pub fn new(journal: Journal, sink: Arc<QuietPeriodSink>) -> Self {
        Self {
            journal,
            sink,
            state: ServerState::Uninitialized,
            fail_write: false,
            panic_on_write: false,
        }
    }

    pub fn failing_write(mut self) -> Self {
        self.fail_write = true;
        self
    }

    pub fn panicking_write(mut self) -> Self {
        self.panic_on_write = true;
        self
    }
}

#[async_trait]
impl SourceServer for RecordingServer {
    fn kind(&self) -> SourceKind {
        SourceKind::Broker
    }

    fn state(&self) -> ServerState {
        self.state
    }

    async fn setup(&mut self) -> HarnessResult<SourceEndpoint> {
        self.journal.record("setup");
        self.state = ServerState::Ready;
        Ok(SourceEndpoint::Topic("recorded".to_string()))
    }

    async fn write_data(&mut self, records: &[String]) -> HarnessResult<()> {
        self.journal.record(format!("write armed={}", self.sink.is_armed()));
        if self.panic_on_write {
            panic!("source connector crashed");
        }
        if self.fail_write {
            return Err(HarnessError::transport("broken pipe"));
        }
        for record in records {
            self.sink.on_record(record.clone());
        }
        Ok(())
    }

    async fn tear_down(&mut self) {
        self.journal.record("tear_down");
        self.state = ServerState::Closed;
    }
}

/// Cluster that records calls and can keep a job chattering forever
#[derive(Default)]
pub struct RecordingCluster {
    journal: Journal,
    tick: Option<Duration>,
    tasks: Mutex<HashMap<JobId, JoinHandle<()>>>,
}

impl RecordingCluster {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            tick: None,
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Every submitted job emits a record each `period` until cancelled
    pub fn chattering(mut self, period: Duration) -> Self {
        self.tick = Some(period);
        self
    }
}

#[async_trait]
impl ClusterClient for RecordingCluster {
    async fn submit(&self, _job: JobDefinition, sink: Arc<dyn OutputSink>) -> ClusterResult<JobHandle> {
        self.journal.record("submit");
        let handle = JobHandle::new(JobId::new());
        if let Some(period) = self.tick {
            let task = tokio::spawn(async move {
                let mut n = 0u64;
                loop {
                    tokio::time::sleep(period).await;
                    sink.on_record(format!("tick-{n}"));
                    n += 1;
                }
            });
            self.tasks.lock().unwrap().insert(handle.id, task);
        }
        Ok(handle)
    }

    async fn status(&self, id: &JobId) -> ClusterResult<JobStatus> {
        match self.tasks.lock().unwrap().get(id) {
            Some(task) if task.is_finished() => Ok(JobStatus::Cancelled),
            Some(_) => Ok(JobStatus::Running),
            None => Err(ClusterError::UnknownJob { job_id: id.to_string() }),
        }
    }

    async fn cancel(&self, id: &JobId) -> ClusterResult<()> {
        self.journal.record("cancel");
        if let Some(task) = self.tasks.lock().unwrap().get(id) {
            task.abort();
        }
        Ok(())
    }
}
