//! Orchestrator behavior under failure injection, ordering and sink reuse

mod common;

use assert_matches::assert_matches;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use cluster::{ClusterError, JobHandle, JobId, MockClusterClient, SourceEndpoint};
use common::{Journal, RecordingCluster, RecordingServer, records};
use shared::{SourceKind, TestCase};
use tester::runtime::MockSourceServer;
use tester::{FailureReason, HarnessConfig, HarnessError, QuietPeriodSink, Stage, TestCaseOrchestrator, Verdict};

const IDLE: Duration = Duration::from_secs(1);

fn config() -> HarnessConfig {
    HarnessConfig::builder().idle_period(IDLE).build()
}

fn sink() -> Arc<QuietPeriodSink> {
    Arc::new(QuietPeriodSink::new(Handle::current(), IDLE))
}

fn case(input: &[&str], expected: &[&str]) -> TestCase {
    TestCase::new("case", records(input), records(expected))
}

/// Mock server that gets through setup; tear_down must happen exactly once
fn ready_server() -> MockSourceServer {
    let mut server = MockSourceServer::new();
    server.expect_kind().return_const(SourceKind::Broker);
    server
        .expect_setup()
        .times(1)
        .returning(|| Ok(SourceEndpoint::Topic("t".to_string())));
    server.expect_tear_down().times(1).return_const(());
    server
}

fn accepting_cluster(cancels: usize) -> MockClusterClient {
    let mut cluster = MockClusterClient::new();
    cluster
        .expect_submit()
        .times(1)
        .returning(|_, _| Ok(JobHandle::new(JobId::new())));
    cluster.expect_cancel().times(cancels).returning(|_| Ok(()));
    cluster
}

#[tokio::test(start_paused = true)]
async fn test_setup_failure_still_tears_down() {
    let mut server = MockSourceServer::new();
    server.expect_kind().return_const(SourceKind::Tcp);
    server.expect_setup().times(1).returning(|| {
        Err(HarnessError::ServerSetup {
            kind: SourceKind::Tcp,
            reason: "address in use".to_string(),
        })
    });
    server.expect_write_data().times(0);
    server.expect_tear_down().times(1).return_const(());

    let mut cluster = MockClusterClient::new();
    cluster.expect_submit().times(0);
    cluster.expect_cancel().times(0);

    let orchestrator = TestCaseOrchestrator::new(cluster, sink(), config());
    let result = orchestrator.run(&case(&["a"], &["a"]), &mut server).await;

    assert_matches!(result, Err(HarnessError::ServerSetup { .. }));
    assert_eq!(orchestrator.stage_history(), vec![Stage::Idle, Stage::TornDown]);
}

#[tokio::test(start_paused = true)]
async fn test_submission_failure_skips_cancel_but_tears_down() {
    let mut server = ready_server();
    server.expect_write_data().times(0);

    let mut cluster = MockClusterClient::new();
    cluster
        .expect_submit()
        .times(1)
        .returning(|_, _| Err(ClusterError::rejected("bad topology")));
    cluster.expect_cancel().times(0);

    let orchestrator = TestCaseOrchestrator::new(cluster, sink(), config());
    let result = orchestrator.run(&case(&["a"], &["a"]), &mut server).await;

    assert_matches!(result, Err(HarnessError::Submission(_)));
    assert_eq!(
        orchestrator.stage_history(),
        vec![Stage::Idle, Stage::ServerReady, Stage::TornDown]
    );
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_cancels_then_tears_down() {
    let mut server = ready_server();
    server
        .expect_write_data()
        .times(1)
        .returning(|_| Err(HarnessError::transport("connection reset")));

    let orchestrator = TestCaseOrchestrator::new(accepting_cluster(1), sink(), config());
    let result = orchestrator.run(&case(&["a"], &["a"]), &mut server).await;

    assert_matches!(result, Err(HarnessError::Transport { .. }));
    assert_eq!(orchestrator.stage_history().last(), Some(&Stage::TornDown));
    assert!(!orchestrator.stage_history().contains(&Stage::InputSent));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_failure_does_not_fail_the_run() {
    let mut server = ready_server();
    server.expect_write_data().times(1).returning(|_| Ok(()));

    let mut cluster = MockClusterClient::new();
    cluster
        .expect_submit()
        .times(1)
        .returning(|_, _| Ok(JobHandle::new(JobId::new())));
    cluster
        .expect_cancel()
        .times(1)
        .returning(|_| Err(ClusterError::unreachable("cluster went away")));

    let orchestrator = TestCaseOrchestrator::new(cluster, sink(), config());
    // Nothing reaches the sink and nothing is expected
    let verdict = orchestrator.run(&case(&["a"], &[]), &mut server).await.unwrap();

    assert_eq!(verdict, Verdict::Pass);
    assert_eq!(
        orchestrator.stage_history(),
        vec![
            Stage::Idle,
            Stage::ServerReady,
            Stage::JobSubmitted,
            Stage::InputSent,
            Stage::AwaitingSink,
            Stage::Compared,
            Stage::TornDown,
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_nonconforming_output_is_a_verdict_not_an_error() {
    let journal = Journal::default();
    let sink = sink();
    let mut server = RecordingServer::new(journal.clone(), sink.clone());

    let orchestrator = TestCaseOrchestrator::new(RecordingCluster::new(journal.clone()), sink, config());
    let verdict = orchestrator
        .run(&case(&["a", "z"], &["a", "b"]), &mut server)
        .await
        .unwrap();

    assert_matches!(
        verdict,
        Verdict::Fail {
            reason: FailureReason::Unexpected { .. },
            ..
        }
    );
    assert_eq!(journal.count("cancel"), 1);
    assert_eq!(journal.count("tear_down"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_input_is_written_only_after_job_and_countdown() {
    let journal = Journal::default();
    let sink = sink();
    let mut server = RecordingServer::new(journal.clone(), sink.clone());

    let orchestrator = TestCaseOrchestrator::new(RecordingCluster::new(journal.clone()), sink, config());
    let verdict = orchestrator.run(&case(&["a", "b"], &["a", "b"]), &mut server).await.unwrap();

    assert_eq!(verdict, Verdict::Pass);
    assert_eq!(
        journal.entries(),
        vec!["setup", "submit", "write armed=true", "cancel", "tear_down"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_hard_timeout_compares_partial_output_and_cleans_up() {
    let journal = Journal::default();
    let sink = sink();
    let mut server = RecordingServer::new(journal.clone(), sink.clone());
    // Chatters faster than the idle period, so the sink never goes quiet
    let cluster = RecordingCluster::new(journal.clone()).chattering(IDLE / 4);

    let config = config();
    let await_timeout = config.await_timeout;
    let orchestrator = TestCaseOrchestrator::new(cluster, sink.clone(), config);

    let started = tokio::time::Instant::now();
    let verdict = orchestrator.run(&case(&[], &["x"]), &mut server).await.unwrap();

    assert!(started.elapsed() >= await_timeout);
    assert_matches!(
        &verdict,
        Verdict::Fail {
            reason: FailureReason::SinkTimeout { waited },
            actual,
            ..
        } if *waited == await_timeout && !actual.is_empty()
    );
    assert_eq!(journal.count("cancel"), 1);
    assert_eq!(journal.count("tear_down"), 1);
    assert!(sink.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_sink_is_fresh_for_the_next_run() {
    let journal = Journal::default();
    let sink = sink();
    let orchestrator = TestCaseOrchestrator::new(RecordingCluster::new(journal.clone()), sink.clone(), config());

    let mut first = RecordingServer::new(journal.clone(), sink.clone());
    let verdict = orchestrator.run(&case(&["a"], &["a"]), &mut first).await.unwrap();
    assert_eq!(verdict, Verdict::Pass);

    let epoch_after_first = sink.epoch();
    let completion_after_first = sink.completion_future();
    assert!(sink.is_empty());

    // A leftover "a" would show up as unexpected here
    let mut second = RecordingServer::new(journal.clone(), sink.clone());
    let verdict = orchestrator.run(&case(&["b"], &["b"]), &mut second).await.unwrap();
    assert_eq!(verdict, Verdict::Pass);

    assert!(sink.epoch() > epoch_after_first);
    assert!(!sink.completion_future().same_signal(&completion_after_first));
    assert_eq!(journal.count("cancel"), 2);
    assert_eq!(journal.count("tear_down"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_with_recording_fakes_keeps_cleanup_order() {
    let journal = Journal::default();
    let sink = sink();
    let mut server = RecordingServer::new(journal.clone(), sink.clone()).failing_write();

    let orchestrator = TestCaseOrchestrator::new(RecordingCluster::new(journal.clone()), sink, config());
    let result = orchestrator.run(&case(&["a"], &["a"]), &mut server).await;

    assert_matches!(result, Err(HarnessError::Transport { .. }));
    assert_eq!(
        journal.entries(),
        vec!["setup", "submit", "write armed=true", "cancel", "tear_down"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_panicking_step_still_cleans_up_then_unwinds() {
    use futures_util::FutureExt;
    use std::panic::AssertUnwindSafe;

    let journal = Journal::default();
    let sink = sink();
    let mut server = RecordingServer::new(journal.clone(), sink.clone()).panicking_write();
    let orchestrator = TestCaseOrchestrator::new(RecordingCluster::new(journal.clone()), sink.clone(), config());

    let caught = AssertUnwindSafe(orchestrator.run(&case(&["a"], &["a"]), &mut server))
        .catch_unwind()
        .await;

    assert!(caught.is_err());
    assert_eq!(
        journal.entries(),
        vec!["setup", "submit", "write armed=true", "cancel", "tear_down"]
    );
    assert_eq!(orchestrator.stage_history().last(), Some(&Stage::TornDown));
    assert!(!sink.is_armed());
}
