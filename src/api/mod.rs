//! HTTP API: router, handlers, error mapping and server lifecycle.
//!
//! `api_router()` returns a composable `Router`; `start_api_server()` binds
//! it and runs it in a background task.

pub mod endpoints;
pub mod error;
pub mod form;
pub mod router;
pub mod server;
pub mod types;

pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
