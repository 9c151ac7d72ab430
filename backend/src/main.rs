//! Inventory Administration Platform - Backend Server
//!
//! Serves the settings API and runs the low stock notification scheduler.

use std::{sync::Arc, time::Duration};

use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use inventory_backend::{
    create_app,
    services::{
        ChannelDefaults, ConfiguredChannelProvider, LowStockScheduler, PgNotificationStore,
        SchedulerDeps, SiteSettingsCache, SystemClock,
    },
    AppState, Config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "inventory_server=debug,inventory_backend=debug,tower_http=debug,sqlx=warn".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = Config::load()?;

    tracing::info!("Starting Inventory Administration Server");
    tracing::info!("Environment: {}", config.environment);

    // Create database connection pool
    tracing::info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(30))
        .connect(&config.database.url)
        .await?;

    tracing::info!("Database connection established");

    // Run migrations in development
    if config.environment == "development" {
        tracing::info!("Running database migrations...");
        sqlx::migrate!("./migrations").run(&db_pool).await?;
        tracing::info!("Migrations completed");
    }

    // Delivery channels
    let store = Arc::new(PgNotificationStore::new(db_pool.clone()));
    let site_settings = Arc::new(SiteSettingsCache::new(
        store.clone(),
        Duration::from_secs(config.scheduler.site_settings_ttl_secs),
    ));
    let channels = Arc::new(ConfiguredChannelProvider::new(
        ChannelDefaults::from_config(&config),
        site_settings.clone(),
    ));

    // Low stock scheduler
    let scheduler = LowStockScheduler::new(
        SchedulerDeps {
            preferences: store.clone(),
            inventory: store.clone(),
            history: store,
            channels: channels.clone(),
            clock: Arc::new(SystemClock),
        },
        Duration::from_secs(config.scheduler.tick_interval_secs.max(1)),
    );
    if config.scheduler.enabled {
        scheduler.start();
    } else {
        tracing::info!("Low stock scheduler disabled by configuration");
    }

    // Create application state
    let state = AppState {
        db: db_pool,
        config: Arc::new(config.clone()),
        site_settings,
        channels,
    };

    // Build application
    let app = create_app(state);

    // Start server
    let addr = config.server.socket_addr()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let deadline = Duration::from_secs(config.scheduler.shutdown_timeout_secs);
    if !scheduler.stop(deadline).await {
        tracing::warn!("Shutting down with a low stock tick still running");
    }

    tracing::info!("Server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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
