//! Reqwest-backed transport.

use async_trait::async_trait;
use courier_core::{CallContext, Headers, RawResponse, Transport, TransportError, TransportRequest};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::{ReqwestConfig, ResponseLog};

/// Executes requests with a pooled [`reqwest::Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    config: Arc<ReqwestConfig>,
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReqwestTransport {
    /// Create a transport with the given configuration.
    pub fn new(config: ReqwestConfig) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_max_idle_per_host)
            .user_agent(&config.user_agent)
            .gzip(config.gzip)
            .brotli(config.brotli);

        if config.follow_redirects {
            builder = builder.redirect(reqwest::redirect::Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(reqwest::redirect::Policy::none());
        }

        let client = builder
            .build()
            .map_err(|e| TransportError::Other(Box::new(e)))?;

        Ok(Self::from_client(client, config))
    }

    /// Create a transport with default configuration.
    pub fn default_transport() -> Result<Self, TransportError> {
        Self::new(ReqwestConfig::default())
    }

    /// Wrap an existing client. Connection settings in `config` are ignored.
    pub fn from_client(client: reqwest::Client, config: ReqwestConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
        }
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Get the transport configuration.
    pub fn config(&self) -> &ReqwestConfig {
        &self.config
    }

    fn build_request(
        &self,
        request: &TransportRequest,
    ) -> Result<reqwest::Request, TransportError> {
        let url = url::Url::parse(&request.url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", request.url)))?;

        let mut builder = self.client.request(http::Method::from(request.method), url);
        for header in &request.headers {
            builder = builder.header(header.key.name(), header.value.as_str());
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        builder
            .build()
            .map_err(|e| TransportError::Request(e.to_string()))
    }

    async fn send(
        &self,
        request: reqwest::Request,
        timeout: Duration,
    ) -> Result<RawResponse, TransportError> {
        let response = self
            .client
            .execute(request)
            .await
            .map_err(|e| classify(e, timeout))?;

        let status = response.status().as_u16();
        let headers = Headers::from_raw(response.headers());
        let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

        Ok(RawResponse::new(status, headers, body))
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(timeout)
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else if error.is_builder() {
        TransportError::Request(error.to_string())
    } else {
        TransportError::Other(Box::new(error))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(
        &self,
        request: TransportRequest,
        context: &CallContext,
    ) -> Result<RawResponse, TransportError> {
        let prepared = self.build_request(&request)?;
        let timeout = request.timeout.unwrap_or(self.config.timeout);

        self.config.printer.log_request(&request, context);
        debug!(method = %request.method, url = %request.url, "Executing request");

        let start = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = context.cancellation.cancelled() => Err(TransportError::Cancelled),
            result = self.send(prepared, timeout) => result,
        };

        let elapsed = start.elapsed();
        let log = match &outcome {
            Ok(response) => ResponseLog {
                status: Some(response.status),
                headers: Some(&response.headers),
                body: Some(&response.body[..]),
                elapsed,
                error: None,
            },
            Err(error) => ResponseLog {
                status: None,
                headers: None,
                body: None,
                elapsed,
                error: Some(error),
            },
        };
        self.config.printer.log_response(&request, log, context);

        match &outcome {
            Ok(response) => debug!(
                status = response.status,
                elapsed_ms = elapsed.as_millis() as u64,
                "Response received"
            ),
            Err(error) => debug!(error = %error, "Request failed"),
        }

        outcome
    }
}
