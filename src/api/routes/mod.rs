//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`batches`] — Batch submission and status reads
//! - [`stream`] — SSE progress stream and snapshot administration
//! - [`socket`] — WebSocket progress endpoint
//! - [`system`] — Health, diagnostics, OpenAPI

mod batches;
mod socket;
mod stream;
mod system;

// Re-export all handlers so `routes::function_name` continues to work
pub use batches::*;
pub use socket::*;
pub use stream::*;
pub use system::*;
