//! Daily Auth Server binary.
//!
//! Usage: `daily-auth-server [config.toml]`. Without a path,
//! `DAILY_AUTH_CONFIG` is consulted, then built-in defaults are used.

use daily_auth_server::{init_tracing, load_config, AppConfig, DailyAuthServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("DAILY_AUTH_CONFIG").ok());
    let config = match &path {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    // Initialize tracing
    init_tracing(&config.server.log_level);
    match &path {
        Some(path) => tracing::info!(%path, "loaded configuration"),
        None => tracing::info!("no configuration file, using defaults"),
    }

    // Create and run server
    let server = DailyAuthServer::from_config(config).await?;
    server.run().await?;

    Ok(())
}
