//! JSON-RPC API Layer
//!
//! Exposes the job controller over JSON-RPC 2.0 (HTTP, localhost).

pub mod error;
pub mod handler;
pub mod rate_limiter;
pub mod server;
pub mod types;

pub use handler::RpcHandler;
pub use rate_limiter::{RateLimitConfig, RateLimiter};
pub use server::{RpcServer, RpcServerConfig, ServerError};
