//! Gemsetter - ring builder metadata sync backend

use anyhow::Result;
use gemsetter::config::Config;
use gemsetter::db::PgCacheStore;
use gemsetter::shopify::ShopifyAdminClient;
use gemsetter::webhooks::InMemoryGuard;
use gemsetter::{api, AppState};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;

    let nats = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Some(client),
            Err(err) => {
                tracing::warn!(error = %err, "NATS unavailable, domain events disabled");
                None
            }
        },
        None => None,
    };

    let state = AppState {
        cache: Arc::new(PgCacheStore::new(db)),
        metafields: Arc::new(ShopifyAdminClient::new(&config)),
        guard: Arc::new(InMemoryGuard::default()),
        nats,
    };
    let app = api::router(state);

    tracing::info!("gemsetter listening on 0.0.0.0:{}", config.port);
    axum::serve(
        tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?,
        app,
    )
    .await?;
    Ok(())
}
