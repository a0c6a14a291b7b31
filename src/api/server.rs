//! HTTP server implementation

use std::sync::Arc;

use axum::Router;
use tower::limit::GlobalConcurrencyLimitLayer;
use tower_http::cors::Any;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::AppState;
use crate::api::routes;
use crate::config::AppConfig;
use crate::rag::ChatService;
use crate::Result;

/// Build the application router around an existing chat service
pub fn build_router(chat_service: Arc<ChatService>, config: &AppConfig) -> Router {
    let state = AppState { chat_service };

    // bounds handlers until their response head is ready; a streamed answer
    // keeps its ChatService admission permit until the body ends
    let mut app = Router::new()
        .nest("/api", routes::api_routes(state))
        .layer(GlobalConcurrencyLimitLayer::new(
            config.server.max_concurrent_requests,
        ))
        .layer(TraceLayer::new_for_http());

    // Add CORS if enabled
    if config.server.enable_cors {
        info!("✅ CORS enabled");
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    app
}

/// Start the API server
pub async fn serve_api(config: &AppConfig) -> Result<()> {
    info!("🚀 Starting LoiLibre API server...");

    let chat_service = Arc::new(ChatService::new(config)?);
    let app = build_router(chat_service, config);

    // Start server
    let addr = config.server_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("🌐 API server listening on http://{}", addr);
    info!(
        "Admitting at most {} concurrent requests",
        config.server.max_concurrent_requests
    );
    info!("Available endpoints:");
    info!("  GET  /api/health    - Health check");
    info!("  POST /api/chat      - Streamed answer (SSE)");
    info!("  POST /api/retrieve  - Selected passages only");
    info!("  POST /api/feedback  - Store user feedback");

    axum::serve(listener, app).await?;

    Ok(())
}
