//! Test helpers for E2E tests.
//!
//! Provides TestClient and TestServer for driving a real chat listener.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use linechat::chat::{Broker, ChatLog};
use linechat::config::ServerConfig;
use linechat::{ChatServer, ChatService};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Test client for connecting to the chat server.
pub struct TestClient {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl TestClient {
    /// Connect to the server at the given address.
    pub async fn connect(addr: SocketAddr) -> Result<Self, std::io::Error> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            buffer: Vec::with_capacity(4096),
        })
    }

    /// Connect and wait for the welcome banner; returns the assigned name.
    pub async fn join(addr: SocketAddr) -> Result<(Self, String), std::io::Error> {
        let mut client = Self::connect(addr).await?;
        let banner = client.recv_until("]\n").await?;
        let name = banner
            .rsplit_once("Your username is [")
            .and_then(|(_, rest)| rest.split_once(']'))
            .map(|(name, _)| name.to_string())
            .ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "no username in banner")
            })?;
        Ok((client, name))
    }

    /// Send raw bytes to the server.
    pub async fn send_raw(&mut self, data: &[u8]) -> Result<(), std::io::Error> {
        self.stream.write_all(data).await?;
        self.stream.flush().await
    }

    /// Send a line (with LF) to the server.
    pub async fn send_line(&mut self, line: &str) -> Result<(), std::io::Error> {
        self.send_raw(line.as_bytes()).await?;
        self.send_raw(b"\n").await
    }

    /// Receive data until a pattern is found.
    ///
    /// Returns everything received since the previous call, up to and
    /// including the pattern. Bytes after the pattern stay unread.
    pub async fn recv_until(&mut self, pattern: &str) -> Result<String, std::io::Error> {
        self.recv_until_timeout(pattern, DEFAULT_TIMEOUT).await
    }

    /// Receive data until a pattern is found with custom timeout.
    pub async fn recv_until_timeout(
        &mut self,
        pattern: &str,
        duration: Duration,
    ) -> Result<String, std::io::Error> {
        self.buffer.clear();
        let mut buf = [0u8; 1];

        let result = timeout(duration, async {
            loop {
                match self.stream.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {
                        self.buffer.push(buf[0]);
                        let decoded = self.decode_buffer();
                        if decoded.contains(pattern) {
                            return Ok(decoded);
                        }
                    }
                    Err(e) => return Err(e),
                }
            }
            Ok(self.decode_buffer())
        })
        .await;

        match result {
            Ok(r) => r,
            Err(_) => Err(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("Timeout waiting for pattern: {}", pattern),
            )),
        }
    }

    /// Expect a pattern in the received data.
    pub async fn expect(&mut self, pattern: &str) -> Result<String, std::io::Error> {
        let data = self.recv_until(pattern).await?;
        if data.contains(pattern) {
            Ok(data)
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Pattern not found: {}", pattern),
            ))
        }
    }

    /// Read until the server closes the connection.
    pub async fn recv_to_end(&mut self) -> Result<String, std::io::Error> {
        let mut rest = Vec::new();
        timeout(DEFAULT_TIMEOUT, self.stream.read_to_end(&mut rest))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "no EOF"))??;
        Ok(String::from_utf8_lossy(&rest).to_string())
    }

    /// Quit the session.
    pub async fn quit(&mut self) -> Result<(), std::io::Error> {
        self.send_line("/quit").await
    }

    fn decode_buffer(&self) -> String {
        String::from_utf8_lossy(&self.buffer).to_string()
    }
}

/// Chat server bound to an ephemeral port for the duration of a test.
pub struct TestServer {
    addr: SocketAddr,
    service: Arc<ChatService>,
    handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a server with default settings.
    pub async fn new() -> Result<Self, Box<dyn std::error::Error>> {
        Self::with_service(Arc::new(ChatService::new(
            Broker::start(),
            ChatLog::disabled(),
            "UTC",
        )))
        .await
    }

    /// Start a server around an existing service.
    pub async fn with_service(
        service: Arc<ChatService>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            max_connections: 32,
            ..ServerConfig::default()
        };

        let server = ChatServer::bind(&config).await?;
        let addr = server.local_addr()?;

        let run_service = service.clone();
        let handle = tokio::spawn(async move {
            let _ = server.run(run_service).await;
        });

        Ok(Self {
            addr,
            service,
            handle,
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the shared chat service.
    pub fn service(&self) -> &Arc<ChatService> {
        &self.service
    }

    /// Connect a client and consume its welcome banner.
    pub async fn join(&self) -> Result<(TestClient, String), std::io::Error> {
        TestClient::join(self.addr).await
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
