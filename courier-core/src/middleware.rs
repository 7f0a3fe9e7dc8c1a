//! Middleware roles and the registry the engine reads them from.
//!
//! A [`Middleware`] bundles contributions for five roles. The engine
//! flattens each role across all registered middleware, in registration
//! order, and runs them at the matching point of every attempt:
//!
//! | Role | Runs | Stops early |
//! |------|------|-------------|
//! | barrier | before every attempt, sequentially | never |
//! | headers | while building the request | never, results merged |
//! | validator | on the raw response | at the first error |
//! | recoverer | after a failed attempt | at the first acceptance |
//! | success | after a decoded result | never |

use futures::future::BoxFuture;
use parking_lot::RwLock;
use std::any::Any;
use std::future::Future;
use std::sync::Arc;

use crate::{BoxError, CourierError, Exception, Headers, OperationContext, RawResponse};

type BarrierFn = dyn Fn(&OperationContext) -> BoxFuture<'static, ()> + Send + Sync;
type HeadersFn = dyn Fn(&OperationContext) -> Headers + Send + Sync;
type ValidatorFn = dyn Fn(&OperationContext, &RawResponse) -> Result<(), CourierError> + Send + Sync;
type RecoverFn =
    dyn Fn(&OperationContext, &Exception) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync;
type SuccessFn = dyn Fn(&OperationContext, Option<&dyn Any>) -> Result<(), BoxError> + Send + Sync;

/// Asynchronous gate run before every attempt. It may delay the call but
/// never fails it.
#[derive(Clone)]
pub struct Barrier(Arc<BarrierFn>);

impl Barrier {
    /// Create a barrier from an async closure.
    pub fn new<F, Fut>(barrier: F) -> Self
    where
        F: Fn(&OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self(Arc::new(
            move |ctx: &OperationContext| -> BoxFuture<'static, ()> { Box::pin(barrier(ctx)) },
        ))
    }

    /// Run the barrier.
    pub fn call(&self, ctx: &OperationContext) -> BoxFuture<'static, ()> {
        (self.0)(ctx)
    }
}

/// Contributes headers to every attempt.
#[derive(Clone)]
pub struct HeaderContributor(Arc<HeadersFn>);

impl HeaderContributor {
    /// Create a contributor from a closure.
    pub fn new<F>(headers: F) -> Self
    where
        F: Fn(&OperationContext) -> Headers + Send + Sync + 'static,
    {
        Self(Arc::new(headers))
    }

    /// Produce the headers.
    pub fn call(&self, ctx: &OperationContext) -> Headers {
        (self.0)(ctx)
    }
}

/// Synchronous check over the raw response.
#[derive(Clone)]
pub struct Validator(Arc<ValidatorFn>);

impl Validator {
    /// Create a validator from a closure.
    pub fn new<F>(validate: F) -> Self
    where
        F: Fn(&OperationContext, &RawResponse) -> Result<(), CourierError> + Send + Sync + 'static,
    {
        Self(Arc::new(validate))
    }

    /// Validate a response.
    pub fn call(&self, ctx: &OperationContext, response: &RawResponse) -> Result<(), CourierError> {
        (self.0)(ctx, response)
    }
}

/// Offered a failed attempt's error. Resolving `Ok` accepts it and triggers
/// a full retry; resolving `Err` passes it to the next recoverer.
#[derive(Clone)]
pub struct Recoverer(Arc<RecoverFn>);

impl Recoverer {
    /// Create a recoverer from an async closure.
    pub fn new<F, Fut>(recover: F) -> Self
    where
        F: Fn(&OperationContext, &Exception) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self(Arc::new(
            move |ctx: &OperationContext,
                  error: &Exception|
                  -> BoxFuture<'static, Result<(), BoxError>> {
                Box::pin(recover(ctx, error))
            },
        ))
    }

    /// Offer an error.
    pub fn call(
        &self,
        ctx: &OperationContext,
        error: &Exception,
    ) -> BoxFuture<'static, Result<(), BoxError>> {
        (self.0)(ctx, error)
    }
}

/// Observer run after a successful attempt with the decoded value, or
/// `None` for write-only operations. Errors are logged and ignored.
#[derive(Clone)]
pub struct SuccessHook(Arc<SuccessFn>);

impl SuccessHook {
    /// Create a hook from a closure.
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&OperationContext, Option<&dyn Any>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }

    /// Run the hook.
    pub fn call(&self, ctx: &OperationContext, value: Option<&dyn Any>) -> Result<(), BoxError> {
        (self.0)(ctx, value)
    }
}

/// A bundle of role contributions registered as one unit.
#[derive(Clone, Default)]
pub struct Middleware {
    name: Option<String>,
    barriers: Vec<Barrier>,
    headers: Vec<HeaderContributor>,
    validators: Vec<Validator>,
    recoverers: Vec<Recoverer>,
    success: Vec<SuccessHook>,
}

impl Middleware {
    /// Create an empty middleware.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty middleware with a name used in logs.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Name given at construction.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Add a barrier closure.
    pub fn barrier<F, Fut>(self, barrier: F) -> Self
    where
        F: Fn(&OperationContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.add_barrier(Barrier::new(barrier))
    }

    /// Add a header-contributor closure.
    pub fn headers<F>(self, headers: F) -> Self
    where
        F: Fn(&OperationContext) -> Headers + Send + Sync + 'static,
    {
        self.add_headers(HeaderContributor::new(headers))
    }

    /// Add a validator closure.
    pub fn validate<F>(self, validate: F) -> Self
    where
        F: Fn(&OperationContext, &RawResponse) -> Result<(), CourierError> + Send + Sync + 'static,
    {
        self.add_validator(Validator::new(validate))
    }

    /// Add a recoverer closure.
    pub fn recover<F, Fut>(self, recover: F) -> Self
    where
        F: Fn(&OperationContext, &Exception) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.add_recoverer(Recoverer::new(recover))
    }

    /// Add a success-hook closure.
    pub fn on_success<F>(self, hook: F) -> Self
    where
        F: Fn(&OperationContext, Option<&dyn Any>) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.add_success(SuccessHook::new(hook))
    }

    /// Add a prebuilt barrier.
    pub fn add_barrier(mut self, barrier: Barrier) -> Self {
        self.barriers.push(barrier);
        self
    }

    /// Add a prebuilt header contributor.
    pub fn add_headers(mut self, headers: HeaderContributor) -> Self {
        self.headers.push(headers);
        self
    }

    /// Add a prebuilt validator.
    pub fn add_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    /// Add a prebuilt recoverer.
    pub fn add_recoverer(mut self, recoverer: Recoverer) -> Self {
        self.recoverers.push(recoverer);
        self
    }

    /// Add a prebuilt success hook.
    pub fn add_success(mut self, hook: SuccessHook) -> Self {
        self.success.push(hook);
        self
    }
}

impl std::fmt::Debug for Middleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Middleware")
            .field("name", &self.name)
            .field("barriers", &self.barriers.len())
            .field("headers", &self.headers.len())
            .field("validators", &self.validators.len())
            .field("recoverers", &self.recoverers.len())
            .field("success", &self.success.len())
            .finish()
    }
}

/// Ordered, append-only middleware registry shared by all calls.
#[derive(Debug, Default)]
pub struct MiddlewareStack {
    middlewares: RwLock<Vec<Arc<Middleware>>>,
}

impl MiddlewareStack {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware. Calls already in flight keep the list they
    /// started with.
    pub fn add(&self, middleware: Middleware) {
        self.middlewares.write().push(Arc::new(middleware));
    }

    /// Number of registered middleware.
    pub fn len(&self) -> usize {
        self.middlewares.read().len()
    }

    /// Whether nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.middlewares.read().is_empty()
    }

    /// Take a consistent view of the current registrations.
    pub fn snapshot(&self) -> Pipeline {
        Pipeline {
            middlewares: self.middlewares.read().clone(),
        }
    }
}

impl FromIterator<Middleware> for MiddlewareStack {
    fn from_iter<I: IntoIterator<Item = Middleware>>(iter: I) -> Self {
        Self {
            middlewares: RwLock::new(iter.into_iter().map(Arc::new).collect()),
        }
    }
}

/// Flattened, role-specific view over a registry snapshot.
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    middlewares: Vec<Arc<Middleware>>,
}

impl Pipeline {
    /// All barriers in registration order.
    pub fn barriers(&self) -> impl Iterator<Item = &Barrier> {
        self.middlewares.iter().flat_map(|m| m.barriers.iter())
    }

    /// All header contributors in registration order.
    pub fn header_contributors(&self) -> impl Iterator<Item = &HeaderContributor> {
        self.middlewares.iter().flat_map(|m| m.headers.iter())
    }

    /// All validators in registration order.
    pub fn validators(&self) -> impl Iterator<Item = &Validator> {
        self.middlewares.iter().flat_map(|m| m.validators.iter())
    }

    /// All recoverers in registration order.
    pub fn recoverers(&self) -> impl Iterator<Item = &Recoverer> {
        self.middlewares.iter().flat_map(|m| m.recoverers.iter())
    }

    /// All success hooks in registration order.
    pub fn success_hooks(&self) -> impl Iterator<Item = &SuccessHook> {
        self.middlewares.iter().flat_map(|m| m.success.iter())
    }

    /// Merge every contributor's headers; later contributors win.
    pub fn contributed_headers(&self, ctx: &OperationContext) -> Headers {
        self.header_contributors()
            .fold(Headers::new(), |merged, contributor| {
                merged.merged(&contributor.call(ctx))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HttpMethod, OperationKind};

    fn ctx() -> OperationContext {
        OperationContext::new("https://example.com", HttpMethod::Get, OperationKind::Read)
    }

    #[test]
    fn test_flattening_preserves_registration_order() {
        let stack = MiddlewareStack::new();
        stack.add(
            Middleware::named("first")
                .headers(|_| Headers::from_pairs([("X-Order", "1a")]))
                .headers(|_| Headers::from_pairs([("X-Order", "1b"), ("X-First", "yes")])),
        );
        stack.add(Middleware::named("second").headers(|_| Headers::from_pairs([("x-order", "2")])));

        let pipeline = stack.snapshot();
        assert_eq!(pipeline.header_contributors().count(), 3);

        let headers = pipeline.contributed_headers(&ctx());
        assert_eq!(headers.get("X-Order"), Some("2"));
        assert_eq!(headers.get("X-First"), Some("yes"));
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_adds() {
        let stack = MiddlewareStack::new();
        stack.add(Middleware::new().validate(|_, _| Ok(())));
        let snapshot = stack.snapshot();

        stack.add(Middleware::new().validate(|_, _| Ok(())));
        assert_eq!(snapshot.validators().count(), 1);
        assert_eq!(stack.snapshot().validators().count(), 2);
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_roles_are_counted_separately() {
        let middleware = Middleware::new()
            .barrier(|_| async {})
            .recover(|_, _| async { Ok(()) })
            .on_success(|_, _| Ok(()));
        let stack: MiddlewareStack = [middleware].into_iter().collect();
        let pipeline = stack.snapshot();

        assert_eq!(pipeline.barriers().count(), 1);
        assert_eq!(pipeline.recoverers().count(), 1);
        assert_eq!(pipeline.success_hooks().count(), 1);
        assert_eq!(pipeline.validators().count(), 0);
    }

    #[tokio::test]
    async fn test_recoverer_result_is_surfaced() {
        let recoverer = Recoverer::new(|_, error: &Exception| {
            let accept = error.is_server_error();
            async move {
                if accept {
                    Ok(())
                } else {
                    Err("not mine".into())
                }
            }
        });

        let server = Exception::wrap(
            crate::HttpStatusError::Server { code: 500 },
            crate::CallSite::labeled("test"),
        );
        let client = Exception::wrap(
            crate::HttpStatusError::Client { code: 404 },
            crate::CallSite::labeled("test"),
        );

        assert!(recoverer.call(&ctx(), &server).await.is_ok());
        assert!(recoverer.call(&ctx(), &client).await.is_err());
    }
}
