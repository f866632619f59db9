use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use resonance_api::{
    config::Config,
    db::{create_listener, create_pool, create_redis_client, RedisCache},
    repositories::{
        CacheStore, PgAudioContentRepository, PgPlaybackRepository, PgUserPreferenceRepository,
        PgUserRepository, PlaybackRepository, UserRepository,
    },
    routes::{create_router, AppState},
    services::{
        BlendingEngine, CacheInvalidator, ChangeCaptureSource, EventDispatcher,
        RecommendationService, StoreBackedStrategies, MONITORED_CHANNELS,
    },
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "resonance_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let pool = create_pool(&config.database_url, config.max_db_connections).await?;
    tracing::info!("Connected to PostgreSQL");

    let redis_client = create_redis_client(&config.redis_url)?;
    let cache: Arc<dyn CacheStore> = Arc::new(RedisCache::new(redis_client).await?);
    tracing::info!("Connected to Redis");

    let users: Arc<dyn UserRepository> = Arc::new(PgUserRepository::new(pool.clone()));
    let playback: Arc<dyn PlaybackRepository> = Arc::new(PgPlaybackRepository::new(pool.clone()));
    let strategies = StoreBackedStrategies::new(
        users.clone(),
        playback.clone(),
        Arc::new(PgUserPreferenceRepository::new(pool.clone())),
        Arc::new(PgAudioContentRepository::new(pool.clone())),
    );
    let engine = BlendingEngine::new(Arc::new(strategies));
    let recommendations = RecommendationService::new(engine, cache.clone(), users);

    let mut dispatcher = EventDispatcher::new();
    Arc::new(CacheInvalidator::new(cache)).register(&mut dispatcher);

    let capture = Arc::new(ChangeCaptureSource::new(
        playback,
        Arc::new(dispatcher),
        config.poll_interval(),
        config.listener_retry_delay(),
    ));
    let shutdown = CancellationToken::new();

    // Polling alone still detects changes when LISTEN is unavailable
    let listener = match create_listener(&config.database_url, &MONITORED_CHANNELS).await {
        Ok(listener) => Some(listener),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to open change listener");
            None
        }
    };
    let mut background = capture.start(listener, shutdown.clone());

    let app = create_router(AppState::new(recommendations));

    let addr = config.bind_address();
    let tcp = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://{}", addr);

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    shutdown.cancel();
    while background.join_next().await.is_some() {}
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
