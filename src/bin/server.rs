//! Server binary: read settings, introspect the database once, then serve.
//!
//! `DATABASE_URL=sqlite://app.db cargo run`

use schema_rest::{app_from_settings, introspect, AppState, Database, Settings};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("schema_rest=info,tower_http=info")),
        )
        .init();

    let settings = Settings::from_env()?;
    let db = Database::connect(settings.dialect, &settings.database_url, settings.max_connections).await?;
    let registry = introspect(db.catalog().as_ref()).await?;
    if registry.is_empty() {
        tracing::warn!("no servable tables found; only ancillary routes are available");
    }

    let state = AppState::new(db, registry, settings.statement_timeout);
    let app = app_from_settings(state, &settings);
    let listener = TcpListener::bind(settings.bind_addr).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        dialect = ?settings.dialect,
        base_path = %settings.base_path,
        "listening"
    );
    axum::serve(listener, app).await?;
    Ok(())
}
