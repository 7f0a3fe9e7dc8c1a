//! Printer contract for user-facing call logs.

use std::fmt;

use crate::CallSite;

/// Which stage of a call a log line belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Request about to be sent.
    Request,
    /// Response received, or the transport failed.
    Response {
        /// Whether a response arrived.
        success: bool,
    },
    /// Outcome of validation and decoding.
    Decoding {
        /// Whether the attempt produced a value.
        success: bool,
    },
}

impl Phase {
    /// Check if this phase reports a failure.
    pub fn is_error(&self) -> bool {
        match self {
            Self::Request => false,
            Self::Response { success } | Self::Decoding { success } => !success,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Request => f.write_str("request"),
            Self::Response { .. } => f.write_str("response"),
            Self::Decoding { .. } => f.write_str("decoding"),
        }
    }
}

/// Receives log lines about calls. A side-effecting observer only: nothing
/// it does can change the outcome of a call.
pub trait Printer: Send + Sync {
    /// Record one line.
    fn print(&self, message: &str, phase: Phase, call_site: &CallSite);
}

/// Printer that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopPrinter;

impl Printer for NoopPrinter {
    fn print(&self, _message: &str, _phase: Phase, _call_site: &CallSite) {}
}

/// Printer that forwards to `tracing`: failures at `warn`, the rest at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingPrinter;

impl Printer for TracingPrinter {
    fn print(&self, message: &str, phase: Phase, call_site: &CallSite) {
        if phase.is_error() {
            tracing::warn!(target: "courier", %phase, %call_site, "{}", message);
        } else {
            tracing::info!(target: "courier", %phase, %call_site, "{}", message);
        }
    }
}
