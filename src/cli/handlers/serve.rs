//! API server handlers

use crate::cli::output::print_info;
use crate::AppConfig;
use crate::Result;

/// Start the API server; CLI arguments take priority over config
pub async fn handle_serve_api(
    config: &AppConfig,
    host: Option<String>,
    port: Option<u16>,
    cors: bool,
) -> Result<()> {
    use crate::api::serve_api;

    let mut config = config.clone();
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }
    config.server.enable_cors |= cors;

    println!("🚀 Starting LoiLibre API Server");
    println!("================================\n");
    println!("📍 Host: {}", config.server.host);
    println!("🔌 Port: {}", config.server.port);
    println!(
        "🌐 CORS: {}",
        if config.server.enable_cors {
            "Enabled"
        } else {
            "Disabled"
        }
    );
    println!(
        "🚦 Max concurrent requests: {}",
        config.server.max_concurrent_requests
    );
    println!();
    print_info("Press Ctrl+C to stop");

    serve_api(&config).await
}
