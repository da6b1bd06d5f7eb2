use axum::routing::{get, post};
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use imposter::api;
use imposter::catalog::SeedCatalog;
use imposter::engine::RoomEngine;
use imposter::store::MemoryRoomStore;

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "imposter=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting imposter room server...");

    // Store and catalog are constructed here and injected; nothing in the
    // engine reaches for process-global state.
    let store = Arc::new(MemoryRoomStore::new());
    let catalog = Arc::new(SeedCatalog::new());
    let engine = Arc::new(RoomEngine::new(store, catalog));

    let app = Router::new()
        .route("/api/games", get(api::list_games))
        .route("/api/rooms/create", post(api::create_room))
        .route("/api/rooms/join", post(api::join_room))
        .route("/api/rooms/{code}/action", post(api::room_action))
        .route("/api/rooms/{code}/sync", get(api::sync_room))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(engine);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8080);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind server address");
    axum::serve(listener, app).await.expect("server error");
}
