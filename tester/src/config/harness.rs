//! Harness Configuration
//!
//! Timing, protocol and post-processing settings for one conformance run

use shared::{PostProcessMode, SourceKind};
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Default quiet period after which the output stream is considered complete
pub const DEFAULT_IDLE_PERIOD: Duration = Duration::from_secs(10);

/// Hard bound on the sink wait, as a multiple of the idle period
pub const AWAIT_TIMEOUT_FACTOR: u32 = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct HarnessConfig {
    pub source_kind: SourceKind,
    pub post_process: PostProcessMode,
    pub idle_period: Duration,
    /// Hard upper bound on waiting for the sink, distinct from the idle period
    pub await_timeout: Duration,
    pub tcp_host: String,
    /// 0 binds an ephemeral port
    pub tcp_port: u16,
    /// How long the TCP source waits for the job to connect
    pub accept_timeout: Duration,
    pub topic_prefix: String,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            source_kind: SourceKind::default(),
            post_process: PostProcessMode::default(),
            idle_period: DEFAULT_IDLE_PERIOD,
            await_timeout: DEFAULT_IDLE_PERIOD * AWAIT_TIMEOUT_FACTOR,
            tcp_host: "127.0.0.1".to_string(),
            tcp_port: 0,
            accept_timeout: Duration::from_secs(30),
            topic_prefix: "conformance".to_string(),
        }
    }
}

impl HarnessConfig {
    /// Create a new builder
    pub fn builder() -> crate::config::builder::HarnessConfigBuilder {
        crate::config::builder::HarnessConfigBuilder::new()
    }

    /// Validate the timing relationships the orchestrator relies on
    pub fn validate(&self) -> HarnessResult<()> {
        if self.idle_period.is_zero() {
            return Err(HarnessError::config("idle_period", "must be greater than zero"));
        }
        if self.await_timeout <= self.idle_period {
            return Err(HarnessError::config(
                "await_timeout",
                format!(
                    "{:?} must exceed the idle period {:?}",
                    self.await_timeout, self.idle_period
                ),
            ));
        }
        if self.accept_timeout.is_zero() {
            return Err(HarnessError::config("accept_timeout", "must be greater than zero"));
        }
        if self.topic_prefix.trim().is_empty() {
            return Err(HarnessError::config("topic_prefix", "must not be empty"));
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
