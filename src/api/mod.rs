//! Migration API server module
//!
//! HTTP front end for the migration engine.
//! Run with `sheet-migrate-server`.

pub mod handlers;
pub mod server;

pub use server::{router, run_api_server, ApiConfig, AppState};
