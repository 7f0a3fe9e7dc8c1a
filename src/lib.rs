// Courier - declarative HTTP operations for Rust
//
// This library runs typed operation descriptions through a middleware
// pipeline with validation, recovery and cancellation, on top of a
// pluggable transport.

// Re-export core functionality
pub use courier_core::*;

// Re-export the default transport
#[cfg(feature = "reqwest")]
pub use courier_reqwest::{
    ExecutorPrinter, LogLevel, LogOption, ReqwestConfig, ReqwestConfigBuilder, ReqwestTransport,
};

#[cfg(feature = "reqwest")]
pub use courier_reqwest;

// Prelude for common imports
pub mod prelude {
    pub use courier_core::prelude::*;

    #[cfg(feature = "reqwest")]
    pub use courier_reqwest::{ReqwestConfig, ReqwestTransport};
}
