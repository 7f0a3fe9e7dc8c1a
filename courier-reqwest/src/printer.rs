//! Request and response logging for the transport.

use std::time::Duration;

use courier_core::{CallContext, Headers, Phase, TransportError, TransportRequest};

const NULL: &str = "(null)";
const SEPARATOR: &str = "*******************************";

/// How much of each exchange is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Nothing.
    None,
    /// Request and response lines with headers and bodies.
    #[default]
    All,
    /// One line per request and per response.
    Info,
    /// Transport failures only.
    Error,
}

/// Formatting options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOption {
    /// Pretty-print JSON bodies.
    JsonPrettyPrint,
    /// Surround each entry with a separator line.
    IncludeSeparator,
}

/// What the transport observed for one request.
#[derive(Debug, Clone, Copy)]
pub struct ResponseLog<'a> {
    /// Status code, if a response arrived.
    pub status: Option<u16>,
    /// Response headers, if a response arrived.
    pub headers: Option<&'a Headers>,
    /// Response body, if one was read.
    pub body: Option<&'a [u8]>,
    /// Time from sending to completion.
    pub elapsed: Duration,
    /// The failure, if the request did not complete.
    pub error: Option<&'a TransportError>,
}

/// Formats exchanges and hands them to the call's printer.
#[derive(Debug, Clone)]
pub struct ExecutorPrinter {
    level: LogLevel,
    options: Vec<LogOption>,
}

impl Default for ExecutorPrinter {
    fn default() -> Self {
        Self::new(LogLevel::All, vec![LogOption::JsonPrettyPrint])
    }
}

impl ExecutorPrinter {
    /// Create a printer.
    pub fn new(level: LogLevel, options: Vec<LogOption>) -> Self {
        Self { level, options }
    }

    /// A printer that logs nothing.
    pub fn silent() -> Self {
        Self::new(LogLevel::None, Vec::new())
    }

    /// Configured level.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Log a request that is about to be sent.
    pub fn log_request(&self, request: &TransportRequest, context: &CallContext) {
        if let Some(message) = self.request_message(request) {
            context
                .printer
                .print(&message, Phase::Request, &context.call_site);
        }
    }

    /// Log the outcome of a request.
    pub fn log_response(
        &self,
        request: &TransportRequest,
        response: ResponseLog<'_>,
        context: &CallContext,
    ) {
        if let Some(message) = self.response_message(request, &response) {
            context.printer.print(
                &message,
                Phase::Response {
                    success: response.error.is_none(),
                },
                &context.call_site,
            );
        }
    }

    /// Format a request entry, or `None` when the level suppresses it.
    pub fn request_message(&self, request: &TransportRequest) -> Option<String> {
        let line = match self.level {
            LogLevel::All => format!(
                "[Request] {} '{}':\n\n[Headers]\n{}\n\n[Body]\n{}",
                request.method,
                request.url,
                headers_json(&request.headers),
                self.body(request.body.as_deref()),
            ),
            LogLevel::Info => format!("[Request] {} '{}'", request.method, request.url),
            LogLevel::None | LogLevel::Error => return None,
        };
        Some(self.framed(line))
    }

    /// Format a response entry, or `None` when the level suppresses it.
    pub fn response_message(
        &self,
        request: &TransportRequest,
        response: &ResponseLog<'_>,
    ) -> Option<String> {
        let title = if response.error.is_none() {
            "Response"
        } else {
            "Response Error"
        };
        let status = response.status.unwrap_or(0);
        let elapsed = format!("[{:.4} s]", response.elapsed.as_secs_f64());

        let line = match self.level {
            LogLevel::All => format!(
                "[{title}] {status} '{}' {elapsed}:\n\n[Headers]:\n{}\n\n[Body]\n{}",
                request.url,
                response.headers.map_or_else(|| NULL.to_string(), headers_json),
                self.body(response.body),
            ),
            LogLevel::Info => format!("[{title}] {status} '{}' {elapsed}", request.url),
            LogLevel::Error => {
                let error = response.error?;
                format!("[{title}] {} '{}' {elapsed}: {error}", request.method, request.url)
            }
            LogLevel::None => return None,
        };
        Some(self.framed(line))
    }

    fn framed(&self, line: String) -> String {
        if self.options.contains(&LogOption::IncludeSeparator) {
            format!("{SEPARATOR}\n{line}\n{SEPARATOR}")
        } else {
            line
        }
    }

    fn body(&self, body: Option<&[u8]>) -> String {
        let Some(body) = body else {
            return NULL.to_string();
        };
        if self.options.contains(&LogOption::JsonPrettyPrint)
            && let Ok(value) = serde_json::from_slice::<serde_json::Value>(body)
            && let Ok(pretty) = serde_json::to_string_pretty(&value)
        {
            return pretty;
        }
        String::from_utf8_lossy(body).into_owned()
    }
}

fn headers_json(headers: &Headers) -> String {
    let map: serde_json::Map<String, serde_json::Value> = headers
        .iter()
        .map(|h| (h.key.name().to_string(), serde_json::Value::from(h.value.as_str())))
        .collect();
    serde_json::to_string_pretty(&map).unwrap_or_else(|_| NULL.to_string())
}
