pub mod handlers;
mod shutdown;
pub mod types;
mod ws;

pub use handlers::AppState;
pub use shutdown::Shutdown;

use crate::{Result, config::GatewayConfig, upstream::HttpChatCoreClient};
use axum::{Router, http::Method, routing::get};
use std::{net::SocketAddr, sync::Arc};
use tower::ServiceBuilder;
use tower_http::{
    LatencyUnit,
    cors::{Any, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/ws", get(ws::upgrade))
        .route(
            "/conversations",
            get(handlers::list_conversations).post(handlers::create_conversation),
        )
        .route(
            "/conversations/:id",
            get(handlers::get_conversation).delete(handlers::delete_conversation),
        )
        .route("/health", get(handlers::health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_request(DefaultOnRequest::new().level(Level::INFO))
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(LatencyUnit::Millis),
                        ),
                )
                .layer(cors),
        )
}

pub async fn run(config: GatewayConfig, shutdown: Arc<Shutdown>) -> Result<()> {
    let upstream = HttpChatCoreClient::new(&config.upstream)?;

    let app_state = AppState::new(Arc::new(upstream), config.bridge.clone(), shutdown.clone());
    let app = router(app_state);

    let addr = SocketAddr::new(config.server.host.parse()?, config.server.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Chat gateway listening on {}", addr);
    info!("WebSocket endpoint: ws://localhost:{}/ws", config.server.port);
    info!("HTTP API: http://localhost:{}/conversations", config.server.port);
    info!("Chat-core service URL: {}", config.upstream.base_url);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.signal())
        .await?;

    info!("Chat gateway stopped");
    Ok(())
}
