//! Chat server module.
//!
//! This module provides the stream listener and per-connection session
//! handling for chat clients.

mod listener;
mod session;

pub use listener::ChatServer;
pub use session::{welcome_banner, ChatSession, SessionEnd, GOODBYE, MAX_LINE_LENGTH};
