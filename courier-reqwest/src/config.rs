//! Transport configuration.

use std::time::Duration;

use crate::{ExecutorPrinter, LogLevel, LogOption};

/// Configuration for [`ReqwestTransport`](crate::ReqwestTransport).
#[derive(Debug, Clone)]
pub struct ReqwestConfig {
    /// Request timeout used when an operation declares none.
    pub timeout: Duration,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// How long idle pooled connections are kept.
    pub pool_idle_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_max_idle_per_host: usize,
    /// User agent string.
    pub user_agent: String,
    /// Enable gzip compression.
    pub gzip: bool,
    /// Enable brotli compression.
    pub brotli: bool,
    /// Follow redirects.
    pub follow_redirects: bool,
    /// Maximum redirects to follow.
    pub max_redirects: usize,
    /// Request/response logging.
    pub printer: ExecutorPrinter,
}

impl Default for ReqwestConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 32,
            user_agent: format!("courier/{}", env!("CARGO_PKG_VERSION")),
            gzip: true,
            brotli: true,
            follow_redirects: true,
            max_redirects: 10,
            printer: ExecutorPrinter::default(),
        }
    }
}

impl ReqwestConfig {
    /// Create a new configuration builder.
    pub fn builder() -> ReqwestConfigBuilder {
        ReqwestConfigBuilder::default()
    }
}

/// Builder for transport configuration.
#[derive(Debug, Default)]
pub struct ReqwestConfigBuilder {
    config: ReqwestConfig,
}

impl ReqwestConfigBuilder {
    /// Set the default request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the connection pool idle timeout.
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.pool_idle_timeout = timeout;
        self
    }

    /// Set the maximum idle connections per host.
    pub fn pool_max_idle_per_host(mut self, max: usize) -> Self {
        self.config.pool_max_idle_per_host = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Enable or disable gzip compression.
    pub fn gzip(mut self, enable: bool) -> Self {
        self.config.gzip = enable;
        self
    }

    /// Enable or disable brotli compression.
    pub fn brotli(mut self, enable: bool) -> Self {
        self.config.brotli = enable;
        self
    }

    /// Enable or disable following redirects.
    pub fn follow_redirects(mut self, enable: bool) -> Self {
        self.config.follow_redirects = enable;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the logging level and options.
    pub fn logging(mut self, level: LogLevel, options: Vec<LogOption>) -> Self {
        self.config.printer = ExecutorPrinter::new(level, options);
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ReqwestConfig {
        self.config
    }
}
