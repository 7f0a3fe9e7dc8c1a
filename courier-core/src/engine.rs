//! The execution engine.
//!
//! One logical call runs as a loop of attempts. Each attempt goes through
//! barrier, encode, header merge, transport, validation, decode and success
//! hooks in that order. A failed attempt is wrapped in an [`Exception`] and
//! offered to the recoverers; the first one that accepts starts the next
//! attempt from the barrier phase. The engine itself never stops retrying:
//! termination is up to the recoverers.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::de::IntoDeserializer;
use std::any::{Any, type_name};
use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::{
    CallContext, CallSite, CodecError, CourierError, EngineConfig, Exception, Headers, JsonCodec,
    Middleware, MiddlewareStack, Operation, OperationContext, Phase, Pipeline, RawResponse,
    RequestEncoder, ResponseDecoder, ResponseInfo, Result, Transport, TransportRequest,
};

/// A decoded value together with the response it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaResponse<T> {
    /// Decoded value.
    pub model: T,
    /// Response headers.
    pub headers: Headers,
    /// HTTP status code.
    pub status: u16,
}

impl<T> MetaResponse<T> {
    /// Transform the model, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MetaResponse<U> {
        MetaResponse {
            model: f(self.model),
            headers: self.headers,
            status: self.status,
        }
    }
}

struct EngineInner<E, D> {
    encoder: E,
    decoder: D,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    middleware: MiddlewareStack,
}

/// Executes operations through a transport and a middleware pipeline.
///
/// The engine is cheap to clone and meant to be shared across tasks.
pub struct Engine<E = JsonCodec, D = JsonCodec> {
    inner: Arc<EngineInner<E, D>>,
}

impl<E, D> Clone for Engine<E, D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E, D> std::fmt::Debug for Engine<E, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("encoder", &type_name::<E>())
            .field("decoder", &type_name::<D>())
            .field("config", &self.inner.config)
            .field("middleware", &self.inner.middleware.len())
            .finish()
    }
}

impl Engine {
    /// Create an engine with JSON codecs and no middleware.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::builder(transport).build()
    }

    /// Create a builder with JSON codecs.
    pub fn builder(transport: impl Transport + 'static) -> EngineBuilder {
        EngineBuilder::with_shared_transport(Arc::new(transport))
    }
}

impl<E, D> Engine<E, D>
where
    E: RequestEncoder + 'static,
    D: ResponseDecoder + 'static,
{
    /// Register a middleware at runtime. Calls already in flight are not
    /// affected.
    pub fn add_middleware(&self, middleware: Middleware) {
        self.inner.middleware.add(middleware);
    }

    /// Number of registered middleware.
    pub fn middleware_count(&self) -> usize {
        self.inner.middleware.len()
    }

    /// The configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Prepare a call, capturing the caller's location.
    #[track_caller]
    pub fn call<'a, O: Operation>(&'a self, operation: &'a O) -> CallBuilder<'a, E, D, O> {
        CallBuilder {
            engine: self,
            operation,
            call_site: CallSite::caller(),
            cancellation: None,
        }
    }

    /// Execute an operation and return the decoded value.
    #[track_caller]
    pub fn execute<'a, O: Operation>(
        &'a self,
        operation: &'a O,
    ) -> impl Future<Output = Result<O::Response>> + Send + 'a {
        self.call(operation).send()
    }

    /// Execute an operation and return the decoded value with the response
    /// status and headers.
    #[track_caller]
    pub fn execute_with_meta<'a, O: Operation>(
        &'a self,
        operation: &'a O,
    ) -> impl Future<Output = Result<MetaResponse<O::Response>>> + Send + 'a {
        self.call(operation).send_with_meta()
    }

    async fn run<O: Operation>(
        &self,
        operation: &O,
        call_site: CallSite,
        cancellation: CancellationToken,
    ) -> Result<MetaResponse<O::Response>> {
        let mut ctx = OperationContext::for_operation(
            operation,
            self.inner.config.default_timeout,
            call_site.clone(),
            cancellation.child_token(),
        );

        if ctx.kind.reads() && ctx.response_path.is_some() && !self.inner.decoder.supports_path()
        {
            let error = Exception::wrap(
                CourierError::DecoderCapability {
                    operation: ctx.operation,
                    decoder: type_name::<D>(),
                },
                call_site,
            );
            self.report(&ctx, &error);
            return Err(error);
        }

        let pipeline = self.inner.middleware.snapshot();
        let call = CallContext {
            printer: Arc::clone(&self.inner.config.printer),
            call_site,
            cancellation,
        };

        loop {
            let error = match self.attempt(operation, &pipeline, &ctx, &call).await {
                Ok(response) => return Ok(response),
                Err(error) => error,
            };
            self.report(&ctx, &error);

            if !error.is_recoverable() || !self.recover(&pipeline, &ctx, &call, &error).await? {
                return Err(error);
            }

            debug!(
                operation = ctx.operation,
                attempt = ctx.attempt,
                error = %error,
                "Attempt recovered, retrying"
            );
            ctx.attempt = ctx.attempt.saturating_add(1);
        }
    }

    async fn attempt<O: Operation>(
        &self,
        operation: &O,
        pipeline: &Pipeline,
        ctx: &OperationContext,
        call: &CallContext,
    ) -> Result<MetaResponse<O::Response>> {
        let fail = |cause: CourierError| Exception::wrap(cause, ctx.call_site.clone());

        for barrier in pipeline.barriers() {
            tokio::select! {
                biased;
                _ = call.cancellation.cancelled() => return Err(fail(CourierError::Cancelled)),
                _ = barrier.call(ctx) => {}
            }
        }
        if call.cancellation.is_cancelled() {
            return Err(fail(CourierError::Cancelled));
        }

        let body = if ctx.kind.writes() {
            let payload = operation
                .request()
                .ok_or_else(|| fail(CourierError::Encoding(CodecError::MissingPayload)))?;
            let encoded = self
                .inner
                .encoder
                .encode(payload)
                .map_err(|e| fail(CourierError::Encoding(e)))?;
            Some(encoded)
        } else {
            None
        };

        let mut headers = self.inner.config.default_headers.clone();
        if let Some(body) = &body {
            headers.merge(&body.headers);
        }
        headers.merge(&ctx.headers);
        headers.merge(&pipeline.contributed_headers(ctx));

        let request = TransportRequest {
            url: ctx.url.clone(),
            method: ctx.method,
            headers,
            body: body.map(|b| b.data),
            timeout: ctx.timeout,
        };

        trace!(method = %request.method, url = %request.url, attempt = ctx.attempt, "Sending request");

        let response = tokio::select! {
            biased;
            _ = call.cancellation.cancelled() => return Err(fail(CourierError::Cancelled)),
            result = self.inner.transport.execute(request, call) => {
                result.map_err(|e| fail(CourierError::Transport(e)))?
            }
        };

        for validator in pipeline.validators() {
            validator
                .call(ctx, &response)
                .map_err(|e| fail(e).with_response(response_info(&response)))?;
        }

        let model = self
            .decode::<O::Response>(ctx, &response)
            .map_err(|e| fail(CourierError::Decoding(e)).with_response(response_info(&response)))?;

        if ctx.kind.reads() {
            run_success_hooks(pipeline, ctx, Some(&model as &dyn Any));
        } else {
            run_success_hooks(pipeline, ctx, None);
        }

        call.printer.print(
            &format!(
                "[Success] {} {} decoded as {}",
                ctx.method,
                ctx.url,
                type_name::<O::Response>()
            ),
            Phase::Decoding { success: true },
            &ctx.call_site,
        );

        Ok(MetaResponse {
            model,
            headers: response.headers,
            status: response.status,
        })
    }

    fn decode<T: DeserializeOwned>(
        &self,
        ctx: &OperationContext,
        response: &RawResponse,
    ) -> std::result::Result<T, CodecError> {
        if !ctx.kind.reads() {
            return T::deserialize(IntoDeserializer::<serde::de::value::Error>::into_deserializer(()))
                .map_err(|_| CodecError::UnitResponse(type_name::<T>()));
        }

        match ctx.response_path.as_deref() {
            Some(path) => self.inner.decoder.decode_at(&response.body, path),
            None => self.inner.decoder.decode(&response.body),
        }
    }

    /// Offer `error` to each recoverer in order. `Ok(true)` when one accepted.
    async fn recover(
        &self,
        pipeline: &Pipeline,
        ctx: &OperationContext,
        call: &CallContext,
        error: &Exception,
    ) -> Result<bool> {
        for (index, recoverer) in pipeline.recoverers().enumerate() {
            tokio::select! {
                biased;
                _ = call.cancellation.cancelled() => {
                    let cancelled = Exception::wrap(CourierError::Cancelled, ctx.call_site.clone());
                    self.report(ctx, &cancelled);
                    return Err(cancelled);
                }
                outcome = recoverer.call(ctx, error) => match outcome {
                    Ok(()) => return Ok(true),
                    Err(reason) => {
                        trace!(recoverer = index, reason = %reason, "Recoverer declined");
                    }
                }
            }
        }
        Ok(false)
    }

    fn report(&self, ctx: &OperationContext, error: &Exception) {
        debug!(
            operation = ctx.operation,
            attempt = ctx.attempt,
            error = %error,
            "Attempt failed"
        );
        self.inner.config.printer.print(
            &format!("[Error] {error}"),
            Phase::Decoding { success: false },
            &ctx.call_site,
        );
    }
}

fn response_info(response: &RawResponse) -> ResponseInfo {
    ResponseInfo {
        status: response.status,
        headers: response.headers.clone(),
    }
}

fn run_success_hooks(pipeline: &Pipeline, ctx: &OperationContext, value: Option<&dyn Any>) {
    for hook in pipeline.success_hooks() {
        if let Err(e) = hook.call(ctx, value) {
            warn!(operation = ctx.operation, error = %e, "Success hook failed");
        }
    }
}

/// A prepared call. Created by [`Engine::call`].
pub struct CallBuilder<'a, E, D, O> {
    engine: &'a Engine<E, D>,
    operation: &'a O,
    call_site: CallSite,
    cancellation: Option<CancellationToken>,
}

impl<'a, E, D, O> CallBuilder<'a, E, D, O>
where
    E: RequestEncoder + 'static,
    D: ResponseDecoder + 'static,
    O: Operation,
{
    /// Replace the captured call site.
    pub fn call_site(mut self, call_site: CallSite) -> Self {
        self.call_site = call_site;
        self
    }

    /// Label the captured call site.
    pub fn label(mut self, label: impl Into<Cow<'static, str>>) -> Self {
        self.call_site = self.call_site.with_label(label);
        self
    }

    /// Cancel the call, including every retry, when `token` fires.
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Run the call and return the decoded value.
    pub async fn send(self) -> Result<O::Response> {
        self.send_with_meta().await.map(|meta| meta.model)
    }

    /// Run the call and return the value with response metadata.
    pub async fn send_with_meta(self) -> Result<MetaResponse<O::Response>> {
        let cancellation = self.cancellation.unwrap_or_default();
        self.engine
            .run(self.operation, self.call_site, cancellation)
            .await
    }
}

/// Builder for [`Engine`].
pub struct EngineBuilder<E = JsonCodec, D = JsonCodec> {
    encoder: E,
    decoder: D,
    transport: Arc<dyn Transport>,
    config: EngineConfig,
    middleware: Vec<Middleware>,
}

impl EngineBuilder {
    /// Start from a shared transport with JSON codecs.
    pub fn with_shared_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            encoder: JsonCodec::new(),
            decoder: JsonCodec::new(),
            transport,
            config: EngineConfig::default(),
            middleware: Vec::new(),
        }
    }
}

impl<E, D> EngineBuilder<E, D>
where
    E: RequestEncoder + 'static,
    D: ResponseDecoder + 'static,
{
    /// Set the request encoder.
    pub fn encoder<E2: RequestEncoder + 'static>(self, encoder: E2) -> EngineBuilder<E2, D> {
        EngineBuilder {
            encoder,
            decoder: self.decoder,
            transport: self.transport,
            config: self.config,
            middleware: self.middleware,
        }
    }

    /// Set the response decoder.
    pub fn decoder<D2: ResponseDecoder + 'static>(self, decoder: D2) -> EngineBuilder<E, D2> {
        EngineBuilder {
            encoder: self.encoder,
            decoder,
            transport: self.transport,
            config: self.config,
            middleware: self.middleware,
        }
    }

    /// Set the configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a middleware.
    pub fn middleware(mut self, middleware: Middleware) -> Self {
        self.middleware.push(middleware);
        self
    }

    /// Build the engine.
    pub fn build(self) -> Engine<E, D> {
        Engine {
            inner: Arc::new(EngineInner {
                encoder: self.encoder,
                decoder: self.decoder,
                transport: self.transport,
                config: self.config,
                middleware: self.middleware.into_iter().collect(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpMethod, OperationKind, TransportError};
    use async_trait::async_trait;
    use bytes::Bytes;
    use parking_lot::Mutex;
    use serde::Serialize;

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<TransportRequest>>,
    }

    #[async_trait]
    impl Transport for Recording {
        async fn execute(
            &self,
            request: TransportRequest,
            _context: &CallContext,
        ) -> std::result::Result<RawResponse, TransportError> {
            self.requests.lock().push(request);
            Ok(RawResponse::new(200, Headers::empty(), Bytes::from_static(b"{}")))
        }
    }

    #[derive(Serialize)]
    struct Note {
        text: String,
    }

    struct SaveNote(Note);

    impl Operation for SaveNote {
        type Request = Note;
        type Response = ();

        fn url(&self) -> String {
            "https://example.com/notes".to_string()
        }

        fn kind(&self) -> OperationKind {
            OperationKind::Write
        }

        fn method(&self) -> HttpMethod {
            HttpMethod::Put
        }

        fn request(&self) -> Option<&Note> {
            Some(&self.0)
        }
    }

    struct BadWrite;

    impl Operation for BadWrite {
        type Request = ();
        type Response = String;

        fn url(&self) -> String {
            "https://example.com/bad".to_string()
        }

        fn kind(&self) -> OperationKind {
            OperationKind::Write
        }

        fn request(&self) -> Option<&()> {
            Some(&())
        }
    }

    struct EmptyWrite;

    impl Operation for EmptyWrite {
        type Request = ();
        type Response = ();

        fn url(&self) -> String {
            "https://example.com/empty".to_string()
        }

        fn kind(&self) -> OperationKind {
            OperationKind::Write
        }
    }

    #[tokio::test]
    async fn test_write_only_sends_body_and_returns_unit() {
        let transport = Arc::new(Recording::default());
        let engine = EngineBuilder::with_shared_transport(transport.clone()).build();

        engine
            .execute(&SaveNote(Note {
                text: "hello".into(),
            }))
            .await
            .unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, HttpMethod::Put);
        assert_eq!(requests[0].headers.get("content-type"), Some("application/json"));
        assert_eq!(
            requests[0].body.as_deref(),
            Some(&br#"{"text":"hello"}"#[..])
        );
    }

    #[tokio::test]
    async fn test_write_only_requires_unit_response() {
        let engine = Engine::new(Recording::default());
        let err = engine.execute(&BadWrite).await.unwrap_err();

        assert!(matches!(
            err.cause(),
            Some(CourierError::Decoding(CodecError::UnitResponse(name))) if name.contains("String")
        ));
    }

    #[tokio::test]
    async fn test_missing_payload_never_reaches_transport() {
        let transport = Arc::new(Recording::default());
        let engine = EngineBuilder::with_shared_transport(transport.clone()).build();
        let err = engine.execute(&EmptyWrite).await.unwrap_err();

        assert!(matches!(
            err.cause(),
            Some(CourierError::Encoding(CodecError::MissingPayload))
        ));
        assert!(transport.requests.lock().is_empty());
    }

    #[tokio::test]
    async fn test_config_defaults_have_lowest_priority() {
        let transport = Arc::new(Recording::default());
        let engine = EngineBuilder::with_shared_transport(transport.clone())
            .config(
                EngineConfig::builder()
                    .default_header("Content-Type", "text/plain")
                    .default_header("Accept", "application/json")
                    .default_timeout(std::time::Duration::from_secs(3))
                    .build(),
            )
            .build();

        engine
            .execute(&SaveNote(Note { text: "x".into() }))
            .await
            .unwrap();

        let requests = transport.requests.lock();
        assert_eq!(requests[0].headers.get("Content-Type"), Some("application/json"));
        assert_eq!(requests[0].headers.get("Accept"), Some("application/json"));
        assert_eq!(requests[0].timeout, Some(std::time::Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_call_site_is_captured_at_the_caller() {
        let engine = Engine::new(Recording::default());
        let err = engine.call(&BadWrite).label("bad-write").send().await.unwrap_err();

        assert_eq!(err.call_site().label(), Some("bad-write"));
        assert!(err.call_site().file().ends_with("engine.rs"));
    }

    #[test]
    fn test_meta_response_map() {
        let meta = MetaResponse {
            model: 2,
            headers: Headers::empty(),
            status: 200,
        };
        assert_eq!(meta.map(|n| n * 2).model, 4);
    }
}
