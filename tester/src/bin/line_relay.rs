//! Line relay
//!
//! Serves the lines of a file to the first TCP client, then exits.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use shared::ComponentId;
use shared::logging::{init_tracing, log_shutdown, log_startup};
use tester::relay::{DEFAULT_RELAY_PORT, relay_file};

#[derive(Parser)]
#[command(name = "line-relay")]
#[command(about = "Serve the lines of a file to the first client that connects")]
struct Args {
    /// File whose lines are relayed
    input: PathBuf,

    /// Listening port
    #[arg(default_value_t = DEFAULT_RELAY_PORT)]
    port: u16,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(Some(&args.log_level));

    log_startup(
        ComponentId::Relay,
        &format!("line relay for {} on port {}", args.input.display(), args.port),
    );
    let written = relay_file(&args.input, args.port)
        .await
        .with_context(|| format!("relaying {}", args.input.display()))?;
    log_shutdown(ComponentId::Relay, &format!("{written} lines relayed"));
    Ok(())
}
