//! Web server for the HTTP surface.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;

use super::router::create_router;
use crate::chat::ChatService;
use crate::config::WebConfig;
use crate::{ChatError, Result};

/// Web server for the chat HTTP API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
    /// Shared chat service.
    service: Arc<ChatService>,
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &WebConfig, service: Arc<ChatService>) -> Result<Self> {
        let addr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| ChatError::Config(format!("invalid web server address: {e}")))?;

        Ok(Self {
            addr,
            cors_origins: config.cors_origins.clone(),
            service,
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Bind the HTTP listener. Pass the result to [`WebServer::serve`].
    pub async fn bind(&self) -> Result<TcpListener> {
        let listener = TcpListener::bind(self.addr).await?;
        tracing::info!("Web server listening on http://{}", listener.local_addr()?);
        Ok(listener)
    }

    /// Serve requests on an already bound listener until it fails.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let router = create_router(self.service, &self.cors_origins);
        axum::serve(listener, router).await?;
        Ok(())
    }

    /// Run the web server until it fails.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;
        self.serve(listener).await
    }

    /// Bind, serve in the background and return the bound address.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let listener = self.bind().await?;
        let local_addr = listener.local_addr()?;

        tokio::spawn(async move {
            if let Err(e) = self.serve(listener).await {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{Broker, ChatLog};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn create_test_config() -> WebConfig {
        WebConfig {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec![],
        }
    }

    fn service() -> Arc<ChatService> {
        Arc::new(ChatService::new(Broker::start(), ChatLog::disabled(), "UTC"))
    }

    #[tokio::test]
    async fn test_web_server_new() {
        let server = WebServer::new(&create_test_config(), service()).unwrap();
        assert_eq!(server.addr().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_web_server_invalid_host() {
        let mut config = create_test_config();
        config.host = "not an address".to_string();
        assert!(WebServer::new(&config, service()).is_err());
    }

    #[tokio::test]
    async fn test_web_server_run() {
        let server = WebServer::new(&create_test_config(), service()).unwrap();
        let addr = server.run_with_addr().await.unwrap();

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();

        assert!(response.starts_with("HTTP/1.1 200"));
        assert!(response.ends_with("OK"));
    }

    #[tokio::test]
    async fn test_bind_taken_port_is_error() {
        let first = WebServer::new(&create_test_config(), service()).unwrap();
        let addr = first.run_with_addr().await.unwrap();

        let mut config = create_test_config();
        config.port = addr.port();
        let second = WebServer::new(&config, service()).unwrap();

        let err = second.bind().await.unwrap_err();
        assert!(matches!(err, ChatError::Io(_)));
    }
}
