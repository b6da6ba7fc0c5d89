//! Chat command parser for linechat.
//!
//! Lines whose first character is `/` are commands. Recognition is by
//! exact match for argument-less commands and by `"/<name> "` prefix for
//! commands that take the rest of the line as their argument.

/// Marker that starts a command line.
pub const COMMAND_MARKER: char = '/';

/// Result of parsing a raw input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    /// Blank line, nothing to do.
    Empty,
    /// Regular chat message.
    Message(String),
    /// Parsed command.
    Command(ChatCommand),
}

/// A parsed chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    /// Show help text.
    Help,
    /// Show recent messages.
    History,
    /// Change display name.
    Name(String),
    /// Mute a user by name.
    Mute(String),
    /// Unmute a user by name.
    Unmute(String),
    /// Leave the chat.
    Quit,
    /// Anything else starting with the marker.
    Unknown(String),
}

impl ChatCommand {
    /// Get the command name.
    pub fn name(&self) -> &str {
        match self {
            ChatCommand::Help => "help",
            ChatCommand::History => "history",
            ChatCommand::Name(_) => "name",
            ChatCommand::Mute(_) => "mute",
            ChatCommand::Unmute(_) => "unmute",
            ChatCommand::Quit => "quit",
            ChatCommand::Unknown(_) => "unknown",
        }
    }
}

impl std::fmt::Display for ChatCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatCommand::Help => write!(f, "/help"),
            ChatCommand::History => write!(f, "/history"),
            ChatCommand::Name(name) => write!(f, "/name {name}"),
            ChatCommand::Mute(name) => write!(f, "/mute {name}"),
            ChatCommand::Unmute(name) => write!(f, "/unmute {name}"),
            ChatCommand::Quit => write!(f, "/quit"),
            ChatCommand::Unknown(line) => write!(f, "{line}"),
        }
    }
}

/// How a table entry matches a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    /// The whole line must equal the pattern.
    Exact,
    /// The line starts with the pattern; the remainder is the argument.
    Argument,
}

/// One dispatch table entry.
struct CommandSpec {
    pattern: &'static str,
    syntax: Syntax,
    build: fn(&str) -> ChatCommand,
}

fn history(_: &str) -> ChatCommand {
    ChatCommand::History
}

fn unmute(arg: &str) -> ChatCommand {
    ChatCommand::Unmute(arg.to_string())
}

fn mute(arg: &str) -> ChatCommand {
    ChatCommand::Mute(arg.to_string())
}

fn name(arg: &str) -> ChatCommand {
    ChatCommand::Name(arg.to_string())
}

fn help(_: &str) -> ChatCommand {
    ChatCommand::Help
}

fn quit(_: &str) -> ChatCommand {
    ChatCommand::Quit
}

/// Dispatch table, longest patterns first.
const COMMANDS: &[CommandSpec] = &[
    CommandSpec { pattern: "/history", syntax: Syntax::Exact, build: history },
    CommandSpec { pattern: "/unmute ", syntax: Syntax::Argument, build: unmute },
    CommandSpec { pattern: "/mute ", syntax: Syntax::Argument, build: mute },
    CommandSpec { pattern: "/name ", syntax: Syntax::Argument, build: name },
    CommandSpec { pattern: "/help", syntax: Syntax::Exact, build: help },
    CommandSpec { pattern: "/quit", syntax: Syntax::Exact, build: quit },
];

/// Parse a line already known to start with the command marker.
pub fn parse_command(line: &str) -> ChatCommand {
    for spec in COMMANDS {
        match spec.syntax {
            Syntax::Exact if line == spec.pattern => return (spec.build)(""),
            Syntax::Argument => {
                if let Some(arg) = line.strip_prefix(spec.pattern) {
                    return (spec.build)(arg.trim());
                }
            }
            Syntax::Exact => {}
        }
    }
    ChatCommand::Unknown(line.to_string())
}

/// Parse a raw input line into a message or command.
///
/// The trailing line terminator is removed; a line is a command only if
/// its very first character is the marker.
pub fn parse_input(input: &str) -> ChatInput {
    let line = input.trim_end_matches(['\r', '\n']);

    if line.trim().is_empty() {
        return ChatInput::Empty;
    }

    if line.starts_with(COMMAND_MARKER) {
        return ChatInput::Command(parse_command(line));
    }

    ChatInput::Message(line.to_string())
}

/// Chat command information for help display.
pub struct CommandInfo {
    /// Command syntax.
    pub syntax: &'static str,
    /// Command description.
    pub description: &'static str,
}

/// Get all available command information.
pub fn get_command_help() -> Vec<CommandInfo> {
    vec![
        CommandInfo {
            syntax: "/help",
            description: "See commands available to you",
        },
        CommandInfo {
            syntax: "/history",
            description: "See the last 30 messages",
        },
        CommandInfo {
            syntax: "/name [name]",
            description: "Change your username",
        },
        CommandInfo {
            syntax: "/mute [name]",
            description: "Mute another user",
        },
        CommandInfo {
            syntax: "/unmute [name]",
            description: "Unmute a user you have muted previously",
        },
        CommandInfo {
            syntax: "/quit",
            description: "Disconnect your client",
        },
    ]
}

/// Format the help message for display.
pub fn format_help() -> String {
    let mut text = String::from("> Commands you can run:\n");
    for info in get_command_help() {
        text.push_str(&format!("{} - {}\n", info.syntax, info.description));
    }
    text
}
