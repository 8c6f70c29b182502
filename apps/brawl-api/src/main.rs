use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use brawl_api::config::{Config, DrainPolicy};
use brawl_api::db::kv::{KeyValueStore, MemoryStore, RedisStore};
use brawl_api::directory::{CachedDirectory, PgUserStore};
use brawl_api::AppState;

/// Upper bound on how often lingering rooms are swept.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() {
    // Load .env file (silently skip if missing, env vars may be set externally)
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    let port = config.port;

    // Durable users store.
    let db = brawl_api::db::pool::connect(&config.database_url).await;
    let store = Arc::new(PgUserStore::new(db));

    // Name cache: Redis when configured, otherwise in-process.
    let cache: Arc<dyn KeyValueStore> = match &config.redis_url {
        Some(url) => match RedisStore::connect(url).await {
            Ok(redis) => Arc::new(redis),
            Err(e) => {
                tracing::warn!(error = %e, "redis unavailable, using in-memory name cache");
                Arc::new(MemoryStore::new())
            }
        },
        None => Arc::new(MemoryStore::new()),
    };

    let directory = Arc::new(CachedDirectory::new(
        cache,
        store,
        config.name_cache_ttl_secs,
    ));

    tracing::info!(
        capacity = config.rooms.capacity,
        overflow = ?config.rooms.overflow,
        drain = ?config.rooms.drain,
        require_known_users = config.rooms.require_known_users,
        "brawl-api configured"
    );

    let state = AppState::new(directory, config.rooms.clone());

    if config.rooms.drain == DrainPolicy::Linger {
        let rooms = state.rooms.clone();
        let every = config
            .rooms
            .empty_room_ttl
            .clamp(Duration::from_secs(1), MAX_SWEEP_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            loop {
                ticker.tick().await;
                let removed = rooms.cleanup_expired();
                if removed > 0 {
                    tracing::info!(removed, live = rooms.len(), "swept empty brawls");
                }
            }
        });
    }

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(brawl_api::routes::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "brawl-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
