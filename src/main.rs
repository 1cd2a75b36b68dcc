use bakbak::{
    config::{
        session::{validate_production_config, SessionConfig, SESSION_TABLE},
        AppConfig,
    },
    db, router, AppState,
};

use anyhow::Context;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tower_sessions_sqlx_store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bakbak=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    validate_production_config(&config)?;

    let pool = db::create_pool(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;
    db::run_migrations(&pool).await?;

    let app_state = AppState::build(pool.clone(), &config)?;
    app_state
        .upload_store
        .ensure_dir()
        .await
        .with_context(|| format!("creating upload directory {:?}", config.upload_dir))?;

    let session_store = SqliteStore::new(pool.clone())
        .with_table_name(SESSION_TABLE)
        .map_err(anyhow::Error::msg)?;
    session_store.migrate().await?;
    let session_layer = SessionConfig::for_app(&config).create_layer(session_store);

    let app = router::build_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(session_layer),
    );

    let addr = config.socket_addr()?;
    tracing::info!(
        "BakBak Bot running on http://{} ({}, uploads up to {} MB)",
        addr,
        config.environment,
        config.max_upload_mb()
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
