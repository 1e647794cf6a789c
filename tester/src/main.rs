//! Conformance Run Driver
//!
//! Runs one test case end to end against the in-process cluster:
//! - Loads the fixture (or the bundled sample case)
//! - Starts the selected source server and the quiet-period sink
//! - Lets the orchestrator submit, feed, await and compare
//! - Maps the outcome to the exit code (0 pass, 1 fail, 2 harness error)

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

use cluster::{EmbeddedBroker, LocalCluster};
use shared::logging::{init_tracing, log_error, log_shutdown, log_startup};
use shared::{ComponentId, PostProcessMode, SourceKind, TestCase};
use tester::{
    FixtureLoader, HarnessConfig, HarnessResult, QuietPeriodSink, TestCaseOrchestrator, Verdict, source_server_for,
};

#[derive(Parser)]
#[command(name = "tester")]
#[command(about = "Conformance test runner for streaming jobs")]
struct Args {
    /// Fixture directory; the bundled sample case when omitted
    #[arg(long, env = "TESTER_PATH")]
    path: Option<PathBuf>,

    /// Source protocol (tcp, broker)
    #[arg(long = "type", env = "TESTER_TYPE", default_value = "broker")]
    source_type: SourceKind,

    /// Output post-processing (none, bulk, json-ld)
    #[arg(long, env = "TESTER_POST_PROCESS", default_value = "none")]
    post_process: PostProcessMode,

    /// Quiet period in milliseconds
    #[arg(long, env = "TESTER_IDLE_MS", default_value = "10000")]
    idle_ms: u64,

    /// Hard bound on waiting for the sink; six idle periods when omitted
    #[arg(long, env = "TESTER_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// TCP source port; ephemeral when omitted
    #[arg(long, env = "TESTER_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "TESTER_LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Shorthand for --log-level debug
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenv::dotenv();
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { args.log_level.as_str() };
    init_tracing(Some(level));
    log_startup(
        ComponentId::Orchestrator,
        &format!("conformance run ({} source, {} post-process)", args.source_type, args.post_process),
    );

    let code = match run(args).await {
        Ok(Verdict::Pass) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(1),
        Err(e) => {
            log_error(ComponentId::Orchestrator, "conformance run", &e);
            ExitCode::from(2)
        }
    };
    log_shutdown(ComponentId::Orchestrator, "run complete");
    code
}

async fn run(args: Args) -> HarnessResult<Verdict> {
    let mut builder = HarnessConfig::builder()
        .source_kind(args.source_type)
        .post_process(args.post_process)
        .idle_period(Duration::from_millis(args.idle_ms));
    if let Some(secs) = args.timeout_secs {
        builder = builder.await_timeout(Duration::from_secs(secs));
    }
    if let Some(port) = args.port {
        builder = builder.tcp_port(port);
    }
    let config = builder.try_build()?;

    let case = match &args.path {
        Some(dir) => FixtureLoader::load(dir)?,
        None => TestCase::sample(),
    };

    let runtime = Handle::current();
    let broker = EmbeddedBroker::new();
    let cluster = LocalCluster::new(runtime.clone(), broker.clone());
    let sink = Arc::new(QuietPeriodSink::new(runtime.clone(), config.idle_period));
    let mut server = source_server_for(config.source_kind, &config, runtime, broker);

    let orchestrator = TestCaseOrchestrator::new(cluster, sink, config);
    let outcome = orchestrator.run(&case, server.as_mut()).await;
    orchestrator.jobs().cluster().shutdown().await;
    outcome
}
