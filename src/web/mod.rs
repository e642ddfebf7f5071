//! HTTP API.

pub mod challenge;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod status;

pub use routes::*;
