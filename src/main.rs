use roomstream::{
    api, room::generators::RandomIdGenerator, AppState, InMemoryMembershipStore,
    InMemoryRoomStore, IndexedEventStream, ServerConfig, StreamMux,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "roomstream=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    info!(
        bind_addr = %config.bind_addr,
        domain = %config.domain,
        max_sync_timeout_ms = config.max_sync_timeout.as_millis() as u64,
        "Starting room event server"
    );

    // Wire the core: membership feeds the stream, the stream wakes the mux
    let membership = Arc::new(InMemoryMembershipStore::new());
    let mux = Arc::new(StreamMux::new());
    let stream = Arc::new(IndexedEventStream::new(membership.clone(), mux.clone()));
    let room_store = Arc::new(InMemoryRoomStore::new(Arc::new(RandomIdGenerator::new(
        config.id_length,
    ))));

    let app_state = AppState::new(room_store, membership, stream, mux, config.clone());

    let app = api::router(app_state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(bind_addr = %config.bind_addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    info!("Server running on http://{}", config.bind_addr);

    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "Server error");
    }
}
