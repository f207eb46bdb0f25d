//! Gemsetter - Ring Builder Backend
//!
//! Shoppers assemble priced ring configurations from two catalogs: settings
//! and stones. The metadata behind those catalogs is dual-homed: the
//! commerce platform's per-product metafields are authoritative, while a
//! local Postgres cache serves the read-heavy storefront. This crate is the
//! synchronization engine keeping the two consistent under at-least-once
//! webhook delivery, partial write failures, and manual bulk repair.
//!
//! ## Subsystems
//! - [`codec`]: reversible domain value <-> metafield translation
//! - [`db`]: the read-optimized cache, kind-exclusive per product
//! - [`webhooks`]: TTL-bounded delivery dedup + always-ack dispatch
//! - [`sync`]: write-through updates and bidirectional reconciliation

use std::sync::Arc;

pub mod api;
pub mod codec;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod shopify;
pub mod sync;
pub mod testing;
pub mod webhooks;

use db::CacheStore;
use shopify::MetafieldStore;
use webhooks::IdempotencyGuard;

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn CacheStore>,
    pub metafields: Arc<dyn MetafieldStore>,
    pub guard: Arc<dyn IdempotencyGuard>,
    pub nats: Option<async_nats::Client>,
}
