use std::sync::Arc;

use tracing::{error, info};

use linechat::{ChatServer, ChatService, Config, WebServer};

#[tokio::main]
async fn main() {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());

    // A missing or malformed config is fatal.
    let config = match Config::load_with_env(&path).and_then(|c| c.validate().map(|_| c)) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {path}: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = linechat::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        linechat::logging::init_console_only(&config.logging.level);
    }

    info!("linechat starting");

    let service = Arc::new(ChatService::from_config(&config));

    if config.web.enabled {
        let web = match WebServer::new(&config.web, service.clone()) {
            Ok(web) => web,
            Err(e) => {
                eprintln!("Failed to configure web server: {e}");
                std::process::exit(1);
            }
        };
        let listener = match web.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("Failed to bind web server: {e}");
                std::process::exit(1);
            }
        };
        tokio::spawn(async move {
            if let Err(e) = web.serve(listener).await {
                error!("Web server error: {}", e);
            }
        });
    }

    let server = match ChatServer::bind(&config.server).await {
        Ok(server) => server,
        Err(e) => {
            eprintln!("Failed to bind chat server: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.run(service).await {
        error!("Chat server stopped: {}", e);
        std::process::exit(1);
    }
}
