//! HTTP handlers.

pub mod chat;

pub use chat::*;
