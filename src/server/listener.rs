//! Stream listener for chat connections.

use std::net::SocketAddr;
#[cfg(unix)]
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
#[cfg(unix)]
use tokio::net::UnixListener;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, error, info};

use super::session::ChatSession;
use crate::chat::ChatService;
use crate::config::{ServerConfig, TransportKind};
use crate::{ChatError, Result};

enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

/// Chat server that accepts stream connections and runs a session for each.
pub struct ChatServer {
    listener: Listener,
    semaphore: Arc<Semaphore>,
    max_connections: usize,
}

impl ChatServer {
    /// Bind the listener described by `config`.
    pub async fn bind(config: &ServerConfig) -> Result<Self> {
        let listener = match config.transport {
            TransportKind::Tcp => {
                let addr = format!("{}:{}", config.host, config.port);
                let listener = TcpListener::bind(&addr).await?;
                info!("Chat server listening on tcp://{}", listener.local_addr()?);
                Listener::Tcp(listener)
            }
            #[cfg(unix)]
            TransportKind::Unix => {
                remove_stale_socket(Path::new(&config.socket_path))?;
                let listener = UnixListener::bind(&config.socket_path)?;
                info!("Chat server listening on unix:{}", config.socket_path);
                Listener::Unix(listener)
            }
            #[cfg(not(unix))]
            TransportKind::Unix => {
                return Err(ChatError::Config(
                    "the unix transport is not available on this platform".to_string(),
                ));
            }
        };

        Ok(Self {
            listener,
            semaphore: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Get the local TCP address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        match &self.listener {
            Listener::Tcp(listener) => listener.local_addr(),
            #[cfg(unix)]
            Listener::Unix(_) => Err(std::io::Error::other("not a TCP listener")),
        }
    }

    /// Get the maximum number of connections allowed.
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Get the number of active connections.
    pub fn active_connections(&self) -> usize {
        self.max_connections - self.semaphore.available_permits()
    }

    async fn acquire(&self) -> Result<OwnedSemaphorePermit> {
        self.semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ChatError::Io(std::io::Error::other("semaphore closed")))
    }

    /// Accept connections forever, spawning one session task per client.
    ///
    /// Accept failures are logged and the loop continues.
    pub async fn run(self, service: Arc<ChatService>) -> Result<()> {
        loop {
            // Wait for a free slot before accepting.
            let permit = self.acquire().await?;

            match &self.listener {
                Listener::Tcp(listener) => match listener.accept().await {
                    Ok((stream, addr)) => {
                        spawn_session(stream, addr.to_string(), service.clone(), permit);
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                #[cfg(unix)]
                Listener::Unix(listener) => match listener.accept().await {
                    Ok((stream, _)) => {
                        spawn_session(stream, "unix socket".to_string(), service.clone(), permit);
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
            }
        }
    }
}

/// Remove a socket file left behind by an earlier run.
///
/// Anything at `path` that is not a socket is left alone, so binding over a
/// regular file still fails.
#[cfg(unix)]
fn remove_stale_socket(path: &Path) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    match std::fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => {
            debug!("Removing stale socket {}", path.display());
            std::fs::remove_file(path)?;
            Ok(())
        }
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn spawn_session<S>(stream: S, peer: String, service: Arc<ChatService>, permit: OwnedSemaphorePermit)
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    debug!("Accepted connection from {}", peer);
    tokio::spawn(async move {
        ChatSession::new(stream, peer, service).run().await;
        // Releases the connection slot.
        drop(permit);
    });
}
