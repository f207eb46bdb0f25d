//! Service configuration from environment variables

use anyhow::Context;

#[derive(Clone, Debug)]
pub struct Config {
    /// PostgreSQL connection URL
    pub database_url: String,
    /// HTTP listen port
    pub port: u16,
    /// Admin API token for the platform GraphQL endpoint
    pub shopify_admin_token: String,
    /// Platform API version segment, e.g. "2024-01"
    pub shopify_api_version: String,
    /// Optional NATS server for domain events
    pub nats_url: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Ok(Self {
            database_url: std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8083),
            shopify_admin_token: std::env::var("SHOPIFY_ADMIN_TOKEN")
                .context("SHOPIFY_ADMIN_TOKEN must be set")?,
            shopify_api_version: std::env::var("SHOPIFY_API_VERSION")
                .unwrap_or_else(|_| "2024-01".to_string()),
            nats_url: std::env::var("NATS_URL").ok().filter(|s| !s.is_empty()),
        })
    }
}
