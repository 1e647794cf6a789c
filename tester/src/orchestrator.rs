//! Test Case Orchestrator
//!
//! Drives one test case through the stages
//! `Idle → ServerReady → JobSubmitted → InputSent → AwaitingSink → Compared → TornDown`.
//! Whatever happens on the way, the run ends in `TornDown`: the job is
//! cancelled, then the source server is torn down, then the sink is reset.

use futures_util::FutureExt;
use std::fmt;
use std::panic::{AssertUnwindSafe, resume_unwind};
use std::sync::{Arc, Mutex, PoisonError};

use cluster::{ClusterClient, JobDefinition, JobHandle, OutputSink};
use shared::logging::{log_error, log_success};
use shared::{ComponentId, TestCase, component_debug, component_error, component_info, component_warn};

use crate::config::HarnessConfig;
use crate::error::{HarnessError, HarnessResult};
use crate::runtime::{JobController, QuietPeriodSink, SourceServer};
use crate::testing::comparator::{self, Verdict};
use crate::testing::sanitize::sanitizer_for;

const COMPONENT: ComponentId = ComponentId::Orchestrator;

/// Stage of a single orchestrated run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    ServerReady,
    JobSubmitted,
    InputSent,
    AwaitingSink,
    Compared,
    TornDown,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Idle => "idle",
            Stage::ServerReady => "server-ready",
            Stage::JobSubmitted => "job-submitted",
            Stage::InputSent => "input-sent",
            Stage::AwaitingSink => "awaiting-sink",
            Stage::Compared => "compared",
            Stage::TornDown => "torn-down",
        };
        write!(f, "{name}")
    }
}

pub struct TestCaseOrchestrator<C: ClusterClient> {
    jobs: JobController<C>,
    sink: Arc<QuietPeriodSink>,
    config: HarnessConfig,
    history: Mutex<Vec<Stage>>,
}

impl<C: ClusterClient> TestCaseOrchestrator<C> {
    pub fn new(cluster: C, sink: Arc<QuietPeriodSink>, config: HarnessConfig) -> Self {
        Self {
            jobs: JobController::new(cluster),
            sink,
            config,
            history: Mutex::new(Vec::new()),
        }
    }

    pub fn jobs(&self) -> &JobController<C> {
        &self.jobs
    }

    pub fn sink(&self) -> &Arc<QuietPeriodSink> {
        &self.sink
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Stages visited by the most recent run, in order
    pub fn stage_history(&self) -> Vec<Stage> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn enter(&self, stage: Stage) {
        component_debug!(COMPONENT, "➡️ {}", stage);
        self.history.lock().unwrap_or_else(PoisonError::into_inner).push(stage);
    }

    /// Run one test case against `server`
    ///
    /// Comparison outcomes come back as a [`Verdict`]; an `Err` means the run
    /// itself broke down. Cleanup has happened either way.
    pub async fn run(&self, case: &TestCase, server: &mut dyn SourceServer) -> HarnessResult<Verdict> {
        {
            let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
            history.clear();
            history.push(Stage::Idle);
        }
        component_info!(
            COMPONENT,
            "🧪 Running '{}': {} input records, {} expected, source {}, post-process {}",
            case.name,
            case.input.len(),
            case.expected.len(),
            server.kind(),
            self.config.post_process
        );

        let mut handle = None;
        let outcome = AssertUnwindSafe(self.drive(case, server, &mut handle))
            .catch_unwind()
            .await;
        self.clean_up(handle.as_ref(), server).await;
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(panic) => {
                component_error!(COMPONENT, "💥 Run of '{}' panicked, cleaned up before unwinding", case.name);
                resume_unwind(panic);
            }
        };

        match &outcome {
            Ok(Verdict::Pass) => log_success(COMPONENT, &format!("'{}' conforms", case.name)),
            Ok(verdict) => component_error!(COMPONENT, "❌ '{}' does not conform\n{}", case.name, verdict),
            Err(e) => log_error(COMPONENT, &format!("run of '{}'", case.name), e),
        }
        outcome
    }

    async fn drive(
        &self,
        case: &TestCase,
        server: &mut dyn SourceServer,
        handle: &mut Option<JobHandle>,
    ) -> HarnessResult<Verdict> {
        let endpoint = server.setup().await?;
        self.enter(Stage::ServerReady);

        let definition = JobDefinition::new(format!("conformance-{}", case.name), endpoint, self.config.post_process);
        let sink: Arc<dyn OutputSink> = self.sink.clone();
        *handle = Some(self.jobs.submit(definition, sink).await?);
        self.enter(Stage::JobSubmitted);

        // Consumer attached and countdown armed before the first record is written
        self.sink.start_countdown(self.config.idle_period);
        let completion = self.sink.completion_future();
        server.write_data(&case.input).await?;
        self.enter(Stage::InputSent);

        self.enter(Stage::AwaitingSink);
        let sanitizer = sanitizer_for(self.config.post_process);
        let verdict = match completion.wait_timeout(self.config.await_timeout).await {
            Ok(snapshot) => {
                component_info!(COMPONENT, "📥 Sink went quiet with {} records", snapshot.len());
                comparator::compare(&case.expected, &snapshot, sanitizer.as_ref())
            }
            Err(HarnessError::SinkTimeout { waited }) => {
                let partial = self.sink.snapshot();
                component_warn!(
                    COMPONENT,
                    "⏰ Sink still busy after {:?}, comparing {} partial records",
                    waited,
                    partial.len()
                );
                comparator::timed_out(&case.expected, &partial, sanitizer.as_ref(), waited)
            }
            Err(e) => return Err(e),
        };
        self.enter(Stage::Compared);
        Ok(verdict)
    }

    /// Cancel, tear down, reset; never fails
    async fn clean_up(&self, handle: Option<&JobHandle>, server: &mut dyn SourceServer) {
        if let Err(e) = self.jobs.cancel(handle).await {
            log_error(COMPONENT, "job cancellation", &e);
        }
        server.tear_down().await;
        let epoch = self.sink.reset();
        self.enter(Stage::TornDown);
        component_debug!(COMPONENT, "🧹 Cleanup done, sink at epoch {}", epoch);
    }
}
