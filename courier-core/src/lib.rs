//! # Courier Core
//!
//! Request orchestration for typed HTTP operations: describe a call once as
//! an [`Operation`], then run it through an [`Engine`] that applies
//! middleware, talks to a pluggable [`Transport`], validates and decodes the
//! response, and retries whenever a recoverer asks it to.
//!
//! ## Features
//!
//! - **Declarative operations**: URL, method, headers, payloads, response path and timeout
//! - **Middleware roles**: barriers, header contributors, validators, recoverers, success hooks
//! - **Path-scoped decoding**: decode `.data.items[0]` out of a larger document
//! - **Retry**: bounded retry recoverer with exponential, linear or constant backoff
//! - **Cancellation**: one token per logical call, honoured across every retry
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use courier_core::{
//!     CallContext, Engine, Middleware, Operation, OperationKind, RawResponse, Transport,
//!     TransportError, TransportRequest,
//! };
//!
//! struct MyTransport;
//!
//! #[async_trait]
//! impl Transport for MyTransport {
//!     async fn execute(
//!         &self,
//!         _request: TransportRequest,
//!         _context: &CallContext,
//!     ) -> Result<RawResponse, TransportError> {
//!         unimplemented!()
//!     }
//! }
//!
//! struct Health;
//!
//! impl Operation for Health {
//!     type Request = ();
//!     type Response = bool;
//!
//!     fn url(&self) -> String {
//!         "https://api.example.com/health".to_string()
//!     }
//!
//!     fn kind(&self) -> OperationKind {
//!         OperationKind::Read
//!     }
//!
//!     fn response_path(&self) -> Option<&str> {
//!         Some(".healthy")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder(MyTransport)
//!         .middleware(Middleware::status_validation())
//!         .build();
//!
//!     let healthy = engine.execute(&Health).await?;
//!     println!("healthy: {healthy}");
//!     Ok(())
//! }
//! ```

mod call_site;
mod codec;
mod config;
mod engine;
mod error;
mod headers;
mod middleware;
mod operation;
mod printer;
mod retry;
mod standard;
mod transport;

pub use call_site::CallSite;
pub use codec::{
    EncodedBody, FormEncoder, JsonCodec, JsonPath, PathSegment, RequestEncoder, ResponseDecoder,
    query_string, with_query,
};
pub use config::{EngineConfig, EngineConfigBuilder};
pub use engine::{CallBuilder, Engine, EngineBuilder, MetaResponse};
pub use error::{
    BoxError, CodecError, CourierError, Exception, HttpStatusError, ResponseInfo, Result,
    TransportError,
};
pub use headers::{Header, HeaderKey, Headers};
pub use middleware::{
    Barrier, HeaderContributor, Middleware, MiddlewareStack, Pipeline, Recoverer, SuccessHook,
    Validator,
};
pub use operation::{HttpMethod, Operation, OperationContext, OperationKind};
pub use printer::{NoopPrinter, Phase, Printer, TracingPrinter};
pub use retry::{BackoffStrategy, RetryConfig, RetryDeclined, RetryStrategy};
pub use transport::{CallContext, RawResponse, Transport, TransportRequest};

pub use tokio_util::sync::CancellationToken;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::{
        CallSite, CancellationToken, CourierError, Engine, Exception, HeaderKey, Headers,
        HttpMethod, JsonCodec, MetaResponse, Middleware, Operation, OperationContext,
        OperationKind, RetryConfig, Transport,
    };
}
