//! # Courier Reqwest
//!
//! A [`Transport`](courier_core::Transport) for Courier built on `reqwest`,
//! with connection pooling, compression, redirect policy and
//! request/response logging through the call's printer.
//!
//! ```rust,no_run
//! use courier_core::{Engine, Middleware};
//! use courier_reqwest::{LogLevel, ReqwestConfig, ReqwestTransport};
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new(
//!     ReqwestConfig::builder()
//!         .timeout(Duration::from_secs(10))
//!         .logging(LogLevel::Info, vec![])
//!         .build(),
//! )?;
//!
//! let engine = Engine::builder(transport)
//!     .middleware(Middleware::status_validation())
//!     .build();
//! # let _ = engine;
//! # Ok(())
//! # }
//! ```

mod config;
mod printer;
mod transport;

pub use config::{ReqwestConfig, ReqwestConfigBuilder};
pub use printer::{ExecutorPrinter, LogLevel, LogOption, ResponseLog};
pub use transport::ReqwestTransport;
