//! Engine configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::{HeaderKey, Headers, NoopPrinter, Printer};

/// Engine configuration.
#[derive(Clone)]
pub struct EngineConfig {
    /// Headers sent with every request. Lowest merge priority.
    pub default_headers: Headers,
    /// Timeout used when an operation declares none.
    pub default_timeout: Option<Duration>,
    /// Receives call logs.
    pub printer: Arc<dyn Printer>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_headers: Headers::empty(),
            default_timeout: None,
            printer: Arc::new(NoopPrinter),
        }
    }
}

impl std::fmt::Debug for EngineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineConfig")
            .field("default_headers", &self.default_headers)
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }
}

/// Builder for engine configuration.
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Add a default header for all requests.
    pub fn default_header(mut self, name: impl Into<HeaderKey>, value: impl ToString) -> Self {
        self.config.default_headers.insert(name, value);
        self
    }

    /// Replace all default headers.
    pub fn default_headers(mut self, headers: Headers) -> Self {
        self.config.default_headers = headers;
        self
    }

    /// Set the default request timeout.
    pub fn default_timeout(mut self, timeout: Duration) -> Self {
        self.config.default_timeout = Some(timeout);
        self
    }

    /// Set the printer.
    pub fn printer(mut self, printer: impl Printer + 'static) -> Self {
        self.config.printer = Arc::new(printer);
        self
    }

    /// Set a shared printer.
    pub fn shared_printer(mut self, printer: Arc<dyn Printer>) -> Self {
        self.config.printer = printer;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
