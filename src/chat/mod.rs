//! Chat module for linechat.
//!
//! This module provides the broadcast/session engine:
//! - Broker fanning messages out to subscriber mailboxes
//! - User registry with names and mute sets
//! - Bounded message history and the transcript sink
//! - Chat commands (/help, /history, /name, /mute, /unmute, /quit)

mod broker;
mod command;
mod history;
mod log;
mod message;
mod registry;
mod service;

pub use broker::{Broker, Mailbox, MailboxId, MAILBOX_CAPACITY};
pub use command::{
    format_help, get_command_help, parse_command, parse_input, ChatCommand, ChatInput,
    CommandInfo, COMMAND_MARKER,
};
pub use history::{HistoryRing, HISTORY_CAPACITY};
pub use log::ChatLog;
pub use message::{format_message, ChatMessage, UserId, SYSTEM_USER_ID, SYSTEM_USER_NAME};
pub use registry::{anon_name, validate_name, Rename, RegistryError, User, UserRegistry};
pub use service::{ChatService, Outcome, UNRECOGNIZED_COMMAND};
