//! Chat service: the send path and command execution shared by every
//! session and by the HTTP surface.

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use super::broker::{Broker, Mailbox, MailboxId};
use super::command::{format_help, ChatCommand, ChatInput};
use super::history::HistoryRing;
use super::log::ChatLog;
use super::message::{format_message, ChatMessage, UserId, SYSTEM_USER_ID, SYSTEM_USER_NAME};
use super::registry::{RegistryError, UserRegistry};
use crate::config::Config;
use crate::datetime::now_timestamp;
use crate::{ChatError, Result};

/// Reply for lines starting with the marker that match no command.
pub const UNRECOGNIZED_COMMAND: &str = "Unrecognized command.\n";

/// What a session should do after an input line was handled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to send back to the caller.
    Done,
    /// Text for the caller only.
    Reply(String),
    /// The caller asked to leave.
    Quit,
}

/// Shared chat state: broker handle, user registry, history and transcript.
///
/// The registry sits behind one lock, so renames update the user and the
/// Name Index together. History is appended and the message published under
/// the history lock, which keeps history order equal to publish order.
pub struct ChatService {
    broker: Broker,
    registry: RwLock<UserRegistry>,
    history: Mutex<HistoryRing>,
    transcript: ChatLog,
    timezone: String,
}

impl ChatService {
    /// Create a service publishing through `broker`.
    pub fn new(broker: Broker, transcript: ChatLog, timezone: impl Into<String>) -> Self {
        Self {
            broker,
            registry: RwLock::new(UserRegistry::new()),
            history: Mutex::new(HistoryRing::new()),
            transcript,
            timezone: timezone.into(),
        }
    }

    /// Start a broker and build the service from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            Broker::start(),
            ChatLog::from_config(&config.chat.log_file),
            config.server.timezone.clone(),
        )
    }

    pub fn broker(&self) -> &Broker {
        &self.broker
    }

    /// Register a fresh anonymous user for a new connection.
    pub async fn connect(&self) -> UserId {
        self.registry.write().await.create_user()
    }

    /// Current display name of `id`.
    pub async fn display_name(&self, id: UserId) -> String {
        self.registry.read().await.display_name(id)
    }

    /// Subscribe a new mailbox to the broker.
    pub fn subscribe(&self) -> Mailbox {
        self.broker.subscribe()
    }

    /// Remove a mailbox from the broker.
    pub fn unsubscribe(&self, id: MailboxId) {
        self.broker.unsubscribe(id);
    }

    /// Whether `viewer` should see `message`: not their own and not muted.
    pub async fn should_deliver(&self, viewer: UserId, message: &ChatMessage) -> bool {
        message.author() != viewer && !self.registry.read().await.is_muted(viewer, message.author())
    }

    /// Format, record and publish a line from `author`.
    ///
    /// Returns the formatted line, or `None` when the text is blank.
    pub async fn send_message(&self, author: UserId, text: &str) -> Option<String> {
        let text = text.replace(['\r', '\n'], " ");
        let text = text.trim_end();
        if text.trim().is_empty() {
            return None;
        }

        let name = self.display_name(author).await;
        let line = format_message(&now_timestamp(&self.timezone), &name, text);

        {
            let mut history = self.history.lock().await;
            history.push(line.clone());
            self.broker.publish(ChatMessage::new(line.clone(), author));
        }

        info!(target: "chat", "{}", line.trim_end());
        self.transcript.record(&line).await;
        Some(line)
    }

    /// Publish a system announcement.
    pub async fn announce(&self, text: &str) -> Option<String> {
        self.send_message(SYSTEM_USER_ID, text).await
    }

    /// Post as the user called `username`, creating them if needed.
    ///
    /// Used by the HTTP surface.
    pub async fn post_as(&self, username: &str, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(ChatError::Validation("msg must not be empty".to_string()));
        }
        let author = self.registry.write().await.resolve_or_create(username)?;
        if author == SYSTEM_USER_ID {
            return Err(RegistryError::InvalidName(username.trim().to_string()).into());
        }
        self.send_message(author, text)
            .await
            .ok_or_else(|| ChatError::Validation("msg must not be empty".to_string()))
    }

    /// History lines, newest last.
    pub async fn history(&self) -> Vec<String> {
        self.history.lock().await.entries()
    }

    /// History as one block of text.
    pub async fn render_history(&self) -> String {
        self.history.lock().await.render()
    }

    /// Handle one parsed input line from `user`.
    pub async fn handle_input(&self, user: UserId, input: ChatInput) -> Outcome {
        match input {
            ChatInput::Empty => Outcome::Done,
            ChatInput::Message(text) => {
                self.send_message(user, &text).await;
                Outcome::Done
            }
            ChatInput::Command(command) => self.execute(user, command).await,
        }
    }

    /// Execute a command on behalf of `user`.
    pub async fn execute(&self, user: UserId, command: ChatCommand) -> Outcome {
        debug!(user, command = command.name(), "Executing command");

        match command {
            ChatCommand::Help => Outcome::Reply(format_help()),
            ChatCommand::History => {
                Outcome::Reply(format!("> Recent messages: \n{}", self.render_history().await))
            }
            ChatCommand::Name(new_name) => self.rename(user, &new_name).await,
            ChatCommand::Mute(target) => self.mute(user, &target, true).await,
            ChatCommand::Unmute(target) => self.mute(user, &target, false).await,
            ChatCommand::Quit => Outcome::Quit,
            ChatCommand::Unknown(_) => Outcome::Reply(UNRECOGNIZED_COMMAND.to_string()),
        }
    }

    async fn rename(&self, user: UserId, new_name: &str) -> Outcome {
        let result = self.registry.write().await.rename(user, new_name);
        match result {
            Ok(rename) => {
                info!(user, old = %rename.old_name, new = %rename.new_name, "User renamed");
                self.announce(&format!(
                    "{} has changed their name to {}",
                    rename.old_name, rename.new_name
                ))
                .await;
                Outcome::Done
            }
            Err(e) => {
                let text = match e {
                    RegistryError::NameTaken(name) => format!(
                        "I'm sorry. The userName [{name}] has already been taken. Try another name"
                    ),
                    RegistryError::InvalidName(name) => {
                        format!("I'm sorry. [{name}] is not a valid name. Try another name")
                    }
                    RegistryError::UnknownUser(name) => format!("No user named [{name}]"),
                };
                Outcome::Reply(self.private_system_line(&text))
            }
        }
    }

    async fn mute(&self, user: UserId, target: &str, mute: bool) -> Outcome {
        let result = {
            let mut registry = self.registry.write().await;
            let result = if mute {
                registry.mute(user, target)
            } else {
                registry.unmute(user, target)
            };
            result.map(|target_id| (registry.display_name(user), target_id))
        };

        match result {
            Ok((name, target_id)) => {
                let verb = if mute { "muted" } else { "unmuted" };
                debug!(user, target = target_id, verb, "Mute set changed");
                self.announce(&format!("{name} has {verb} {}", target.trim()))
                    .await;
                Outcome::Done
            }
            Err(_) => Outcome::Reply(format!("> No user named [{}]\n", target.trim())),
        }
    }

    /// A system-formatted line that is not published or recorded.
    fn private_system_line(&self, text: &str) -> String {
        format_message(&now_timestamp(&self.timezone), SYSTEM_USER_NAME, text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::command::parse_input;
    use std::time::Duration;
    use tokio::time::timeout;

    fn service() -> ChatService {
        ChatService::new(Broker::start(), ChatLog::disabled(), "UTC")
    }

    async fn named(service: &ChatService, name: &str) -> UserId {
        let id = service.connect().await;
        assert_eq!(
            service.execute(id, ChatCommand::Name(name.to_string())).await,
            Outcome::Done
        );
        id
    }

    async fn next(mailbox: &mut Mailbox) -> ChatMessage {
        timeout(Duration::from_secs(1), mailbox.recv())
            .await
            .expect("timed out")
            .expect("mailbox closed")
    }

    #[tokio::test]
    async fn test_connect_assigns_anon_names() {
        let service = service();
        let a = service.connect().await;
        let b = service.connect().await;
        assert_ne!(a, b);
        assert_eq!(service.display_name(a).await, format!("Anon{a}"));
    }

    #[tokio::test]
    async fn test_send_message_formats_and_publishes() {
        let service = service();
        let alice = named(&service, "alice").await;
        let mut mailbox = service.subscribe();

        let line = service.send_message(alice, "hello").await.unwrap();
        assert!(line.ends_with(" [alice] hello\n"));
        assert_eq!(&line[2..3], ":");

        let msg = next(&mut mailbox).await;
        assert_eq!(msg.text(), line);
        assert_eq!(msg.author(), alice);
        assert_eq!(service.history().await.last(), Some(&line));
    }

    #[tokio::test]
    async fn test_send_blank_message_is_ignored() {
        let service = service();
        let alice = service.connect().await;
        assert!(service.send_message(alice, "   ").await.is_none());
        assert!(service.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_send_message_flattens_newlines() {
        let service = service();
        let alice = named(&service, "alice").await;
        let line = service.send_message(alice, "one\ntwo").await.unwrap();
        assert!(line.ends_with("[alice] one two\n"));
        assert_eq!(line.matches('\n').count(), 1);
    }

    #[tokio::test]
    async fn test_should_deliver_filters_self_and_muted() {
        let service = service();
        let alice = named(&service, "alice").await;
        let bob = named(&service, "bob").await;
        let carol = named(&service, "carol").await;

        let from_alice = ChatMessage::new("x\n", alice);
        let from_bob = ChatMessage::new("y\n", bob);
        let from_carol = ChatMessage::new("z\n", carol);

        assert!(!service.should_deliver(alice, &from_alice).await);
        assert!(service.should_deliver(alice, &from_bob).await);

        service.execute(alice, ChatCommand::Mute("bob".to_string())).await;
        assert!(!service.should_deliver(alice, &from_bob).await);
        assert!(service.should_deliver(alice, &from_carol).await);

        service.execute(alice, ChatCommand::Unmute("bob".to_string())).await;
        assert!(service.should_deliver(alice, &from_bob).await);
    }

    #[tokio::test]
    async fn test_rename_broadcasts_announcement() {
        let service = service();
        let user = service.connect().await;
        let mut mailbox = service.subscribe();

        let outcome = service.execute(user, ChatCommand::Name("alice".to_string())).await;
        assert_eq!(outcome, Outcome::Done);

        let msg = next(&mut mailbox).await;
        assert!(msg.is_system());
        assert!(msg
            .text()
            .ends_with(&format!("[system] Anon{user} has changed their name to alice\n")));
    }

    #[tokio::test]
    async fn test_rename_taken_is_private() {
        let service = service();
        let _alice = named(&service, "alice").await;
        let other = service.connect().await;
        let mut mailbox = service.subscribe();

        let outcome = service.execute(other, ChatCommand::Name("alice".to_string())).await;
        match outcome {
            Outcome::Reply(text) => {
                assert!(text.contains("[system] I'm sorry. The userName [alice] has already been taken"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(service.display_name(other).await, format!("Anon{other}"));

        // Nothing was broadcast.
        service.broker().subscriber_count().await;
        assert!(mailbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_rename_invalid_is_private() {
        let service = service();
        let user = service.connect().await;
        let outcome = service.execute(user, ChatCommand::Name(String::new())).await;
        assert!(matches!(outcome, Outcome::Reply(text) if text.contains("not a valid name")));
    }

    #[tokio::test]
    async fn test_mute_announces() {
        let service = service();
        let alice = named(&service, "alice").await;
        let _bob = named(&service, "bob").await;
        let mut mailbox = service.subscribe();

        service.execute(alice, ChatCommand::Mute("bob".to_string())).await;
        assert!(next(&mut mailbox).await.text().ends_with("[system] alice has muted bob\n"));

        service.execute(alice, ChatCommand::Unmute("bob".to_string())).await;
        assert!(next(&mut mailbox).await.text().ends_with("[system] alice has unmuted bob\n"));
    }

    #[tokio::test]
    async fn test_mute_unknown_user_is_reported() {
        let service = service();
        let alice = named(&service, "alice").await;

        let outcome = service.execute(alice, ChatCommand::Mute("ghost".to_string())).await;
        assert_eq!(outcome, Outcome::Reply("> No user named [ghost]\n".to_string()));

        let system = ChatMessage::new("s\n", SYSTEM_USER_ID);
        assert!(service.should_deliver(alice, &system).await);
    }

    #[tokio::test]
    async fn test_help_and_unknown_replies() {
        let service = service();
        let user = service.connect().await;
        assert_eq!(
            service.execute(user, ChatCommand::Help).await,
            Outcome::Reply(format_help())
        );
        assert_eq!(
            service.handle_input(user, parse_input("/dance")).await,
            Outcome::Reply(UNRECOGNIZED_COMMAND.to_string())
        );
        assert_eq!(service.handle_input(user, parse_input("/quit")).await, Outcome::Quit);
        assert_eq!(service.handle_input(user, parse_input("")).await, Outcome::Done);
    }

    #[tokio::test]
    async fn test_history_keeps_last_thirty() {
        let service = service();
        let alice = named(&service, "alice").await;
        for i in 1..=31 {
            service.send_message(alice, &format!("m{i}")).await;
        }

        let history = service.history().await;
        assert_eq!(history.len(), 30);
        assert!(history[0].ends_with("[alice] m2\n"));
        assert!(history[29].ends_with("[alice] m31\n"));

        let reply = service.execute(alice, ChatCommand::History).await;
        match reply {
            Outcome::Reply(text) => {
                assert!(text.starts_with("> Recent messages: \n"));
                assert!(!text.contains("[alice] m1\n"));
                assert!(text.ends_with("[alice] m31\n"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_post_as_creates_and_reuses_user() {
        let service = service();
        let line = service.post_as("webby", "hi from http").await.unwrap();
        assert!(line.ends_with("[webby] hi from http\n"));

        service.post_as("webby", "again").await.unwrap();
        assert_eq!(service.history().await.len(), 2);
    }

    #[tokio::test]
    async fn test_post_as_rejects_bad_input() {
        let service = service();
        assert!(matches!(
            service.post_as("webby", "  ").await,
            Err(ChatError::Validation(_))
        ));
        assert!(matches!(
            service.post_as("", "hello").await,
            Err(ChatError::Registry(RegistryError::InvalidName(_)))
        ));
        assert!(matches!(
            service.post_as("system", "hello").await,
            Err(ChatError::Registry(RegistryError::InvalidName(_)))
        ));
    }

    #[tokio::test]
    async fn test_transcript_receives_every_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chat.log");
        let service = ChatService::new(Broker::start(), ChatLog::new(&path), "UTC");

        let alice = named(&service, "alice").await;
        service.send_message(alice, "hello").await;

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("has changed their name to alice\n"));
        assert!(content.contains("[alice] hello\n"));
    }
}
