//! linechat - a line-oriented multi-client chat service.
//!
//! Clients connect over TCP or a Unix socket, send text lines, and receive
//! every other client's messages live. A small HTTP surface reads recent
//! history and posts messages without a persistent connection.

pub mod chat;
pub mod config;
pub mod datetime;
pub mod error;
pub mod logging;
pub mod server;
pub mod web;

pub use chat::{Broker, ChatService};
pub use config::Config;
pub use error::{ChatError, Result};
pub use server::{ChatServer, ChatSession};
pub use web::WebServer;
