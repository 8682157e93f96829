//! Aquadash Gateway HTTP API Server
//!
//! Streams chart commentary over SSE and serves the cockpit's dashboard,
//! risk, message and WeWork login routes.

pub mod auth;
pub mod dashboard;
pub mod error;
pub mod health;
pub mod insight;
pub mod messages;
pub mod risks;
pub mod server;

pub use error::{ApiError, ApiResult};
pub use server::{build_router, serve, AppState};
