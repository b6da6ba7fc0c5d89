//! Per-connection chat session.
//!
//! A session runs two activities for the lifetime of a connection: the
//! inbound loop reading lines from the client, and a spawned outbound task
//! delivering broadcast messages from the session's mailbox. Both write to
//! the client through a shared, locked writer.

use std::sync::Arc;

use tokio::io::{
    AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader, ReadHalf,
    WriteHalf,
};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::chat::{parse_input, ChatService, Mailbox, Outcome, UserId};

/// Longest accepted input line in bytes, excluding the terminator.
pub const MAX_LINE_LENGTH: usize = 4096;

/// Line sent after a `/quit`.
pub const GOODBYE: &str = "> Goodbye\n";

/// Welcome banner shown right after connecting.
pub fn welcome_banner(name: &str) -> String {
    format!(
        "> Welcome to the chat room. Type /help for a list of available commands.\n> Your username is [{name}]\n"
    )
}

/// Why the inbound loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client closed the stream.
    Disconnected,
    /// Client sent `/quit`.
    Quit,
    /// Reading from or writing to the transport failed, or the client
    /// sent a line longer than [`MAX_LINE_LENGTH`].
    TransportError,
}

type SharedWriter<S> = Arc<Mutex<WriteHalf<S>>>;

/// A chat session bound to one client stream.
pub struct ChatSession<S> {
    id: Uuid,
    peer: String,
    stream: S,
    service: Arc<ChatService>,
}

impl<S> ChatSession<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    /// Create a session for an accepted stream.
    pub fn new(stream: S, peer: impl Into<String>, service: Arc<ChatService>) -> Self {
        let id = Uuid::new_v4();
        let peer = peer.into();
        debug!("Created new session {} for {}", id, peer);
        Self {
            id,
            peer,
            stream,
            service,
        }
    }

    /// Get the session ID.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Get the peer description.
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Drive the session until the client leaves.
    pub async fn run(self) -> SessionEnd {
        let Self {
            id,
            peer,
            stream,
            service,
        } = self;

        let user = service.connect().await;
        let name = service.display_name(user).await;
        info!(session = %id, user, "Client [{}] connected from {}", name, peer);

        let (reader, writer) = tokio::io::split(stream);
        let writer: SharedWriter<S> = Arc::new(Mutex::new(writer));

        service.announce(&format!("{name} has joined")).await;
        let mailbox = service.subscribe();
        let mailbox_id = mailbox.id();

        let end = if write_line(&writer, &welcome_banner(&name)).await {
            let outbound = tokio::spawn(deliver(mailbox, writer.clone(), service.clone(), user));
            let end = read_lines(reader, &writer, &service, user).await;

            service.unsubscribe(mailbox_id);
            let name = service.display_name(user).await;
            service.announce(&format!("{name} has left")).await;
            let _ = outbound.await;
            end
        } else {
            service.unsubscribe(mailbox_id);
            service.announce(&format!("{name} has left")).await;
            SessionEnd::TransportError
        };

        let mut writer = writer.lock().await;
        if end == SessionEnd::Quit {
            let _ = writer.write_all(GOODBYE.as_bytes()).await;
        }
        let _ = writer.shutdown().await;

        info!(session = %id, user, ?end, "Client at {} disconnected", peer);
        end
    }
}

/// Inbound loop: read lines and hand them to the service.
async fn read_lines<S>(
    reader: ReadHalf<S>,
    writer: &SharedWriter<S>,
    service: &ChatService,
    user: UserId,
) -> SessionEnd
where
    S: AsyncRead + AsyncWrite,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let limit = (MAX_LINE_LENGTH + 1) as u64;
        match (&mut reader).take(limit).read_until(b'\n', &mut buf).await {
            Ok(0) => return SessionEnd::Disconnected,
            Ok(_) => {}
            Err(e) => {
                debug!(user, error = %e, "Read failed");
                return SessionEnd::TransportError;
            }
        }

        if buf.len() > MAX_LINE_LENGTH && buf.last() != Some(&b'\n') {
            warn!(user, max = MAX_LINE_LENGTH, "Input line too long; closing session");
            return SessionEnd::TransportError;
        }

        let line = String::from_utf8_lossy(&buf);
        match service.handle_input(user, parse_input(&line)).await {
            Outcome::Done => {}
            Outcome::Reply(text) => {
                if !write_line(writer, &text).await {
                    return SessionEnd::TransportError;
                }
            }
            Outcome::Quit => return SessionEnd::Quit,
        }
    }
}

/// Outbound loop: deliver mailbox messages until the mailbox closes.
async fn deliver<S>(
    mut mailbox: Mailbox,
    writer: SharedWriter<S>,
    service: Arc<ChatService>,
    user: UserId,
) where
    S: AsyncWrite,
{
    while let Some(message) = mailbox.recv().await {
        if !service.should_deliver(user, &message).await {
            continue;
        }
        if !write_line(&writer, message.text()).await {
            debug!(user, "Write failed; outbound delivery stopped");
            break;
        }
    }
}

async fn write_line<W>(writer: &Arc<Mutex<W>>, text: &str) -> bool
where
    W: AsyncWrite + Unpin,
{
    let mut writer = writer.lock().await;
    writer.write_all(text.as_bytes()).await.is_ok() && writer.flush().await.is_ok()
}
