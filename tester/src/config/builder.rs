//! Harness Configuration Builder
//!
//! Provides a flexible builder pattern for constructing harness configurations

use super::HarnessConfig;
use super::harness::AWAIT_TIMEOUT_FACTOR;
use crate::error::HarnessResult;
use shared::{PostProcessMode, SourceKind};
use std::time::Duration;

pub struct HarnessConfigBuilder {
    config: HarnessConfig,
    explicit_await_timeout: bool,
}

impl HarnessConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: HarnessConfig::default(),
            explicit_await_timeout: false,
        }
    }

    /// Set source protocol (tcp or broker)
    pub fn source_kind(mut self, kind: SourceKind) -> Self {
        self.config.source_kind = kind;
        self
    }

    /// Use a TCP source
    pub fn tcp(self) -> Self {
        self.source_kind(SourceKind::Tcp)
    }

    /// Use a broker topic source (default)
    pub fn broker(self) -> Self {
        self.source_kind(SourceKind::Broker)
    }

    /// Set output post-processing mode
    pub fn post_process(mut self, mode: PostProcessMode) -> Self {
        self.config.post_process = mode;
        self
    }

    /// Set the quiet period
    ///
    /// Unless an await timeout was set explicitly, it follows the idle period.
    pub fn idle_period(mut self, idle: Duration) -> Self {
        self.config.idle_period = idle;
        if !self.explicit_await_timeout {
            self.config.await_timeout = idle * AWAIT_TIMEOUT_FACTOR;
        }
        self
    }

    /// Set the hard bound on the sink wait
    pub fn await_timeout(mut self, timeout: Duration) -> Self {
        self.config.await_timeout = timeout;
        self.explicit_await_timeout = true;
        self
    }

    /// Set TCP bind host
    pub fn tcp_host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.tcp_host = host.into();
        self
    }

    /// Set TCP bind port (0 = ephemeral)
    pub fn tcp_port(mut self, port: u16) -> Self {
        self.config.tcp_port = port;
        self
    }

    pub fn accept_timeout(mut self, timeout: Duration) -> Self {
        self.config.accept_timeout = timeout;
        self
    }

    pub fn topic_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.config.topic_prefix = prefix.into();
        self
    }

    /// Build the configuration without validation
    pub fn build(self) -> HarnessConfig {
        self.config
    }

    /// Build and validate the configuration
    pub fn try_build(self) -> HarnessResult<HarnessConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

impl Default for HarnessConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
