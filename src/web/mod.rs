//! HTTP surface for linechat.
//!
//! Lets a client read recent history and post a message without holding a
//! chat connection open.

pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::{ApiError, ErrorCode};
pub use router::{create_health_router, create_router};
pub use server::WebServer;
