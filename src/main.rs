/// filterdesk: admin backend for search filters
///
/// Main entry point. Loads configuration from the environment and starts the
/// HTTP server.

use filterdesk::{config::Config, server::start_server};

/// Application entry point
///
/// The server provides:
/// - Session issuance at /api/session
/// - Filter reads and edit form actions at /api/filters/*
/// - Health check at /healthz
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();

    start_server(config).await?;

    Ok(())
}
