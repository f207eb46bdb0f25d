//! Read-optimized catalog cache
//!
//! Two kind-tables, `setting_cache` and `stone_cache`, keyed by
//! (shop, product_id) and mutually exclusive for a product within a shop.
//! The sync engine talks to them through [`CacheStore`] so it can run against
//! in-memory fakes in tests; [`pg::PgCacheStore`] is the real backend.

pub mod pg;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::{Metal, SettingMeta, SettingRow, StoneMeta, StoneRow, StoneShape};
use crate::error::CacheError;

pub use pg::PgCacheStore;

#[derive(Clone, Debug, Default)]
pub struct SettingFilter {
    /// Only settings compatible with this stone shape.
    pub shape: Option<StoneShape>,
    /// Only settings priced for this metal.
    pub metal: Option<Metal>,
}

#[derive(Clone, Debug, Default)]
pub struct StoneFilter {
    pub shape: Option<StoneShape>,
    pub min_carat: Option<Decimal>,
    pub max_carat: Option<Decimal>,
    pub available: Option<bool>,
}

#[derive(Clone, Copy, Debug)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

/// Platform-owned fields carried by product webhooks. `None` leaves the
/// stored value untouched.
#[derive(Clone, Debug, Default)]
pub struct PlatformUpdate {
    pub title: Option<String>,
    pub price: Option<i64>,
    pub image_url: Option<String>,
    pub available: Option<bool>,
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Atomic per-row upsert; deletes any stone row for the same product
    /// first so a product is never both kinds.
    async fn upsert_setting(
        &self,
        shop: &str,
        product_id: &str,
        title: Option<&str>,
        meta: &SettingMeta,
    ) -> Result<SettingRow, CacheError>;

    /// Atomic per-row upsert; deletes any setting row for the same product
    /// first. `price` is platform-owned: `None` preserves the stored value.
    async fn upsert_stone(
        &self,
        shop: &str,
        product_id: &str,
        title: Option<&str>,
        meta: &StoneMeta,
        price: Option<i64>,
    ) -> Result<StoneRow, CacheError>;

    async fn get_setting(
        &self,
        shop: &str,
        product_id: &str,
    ) -> Result<Option<SettingRow>, CacheError>;

    async fn get_stone(&self, shop: &str, product_id: &str)
        -> Result<Option<StoneRow>, CacheError>;

    /// Remove both kinds defensively. Zero rows affected is success.
    async fn delete_all(&self, shop: &str, product_id: &str) -> Result<u64, CacheError>;

    /// Touch platform-owned fields only; domain fields are never written by
    /// this path. Returns rows affected across both kind-tables.
    async fn update_platform_fields(
        &self,
        shop: &str,
        product_id: &str,
        update: &PlatformUpdate,
    ) -> Result<u64, CacheError>;

    async fn list_settings(
        &self,
        shop: &str,
        filter: &SettingFilter,
        page: Page,
    ) -> Result<Vec<SettingRow>, CacheError>;

    async fn count_settings(&self, shop: &str, filter: &SettingFilter)
        -> Result<i64, CacheError>;

    async fn list_stones(
        &self,
        shop: &str,
        filter: &StoneFilter,
        page: Page,
    ) -> Result<Vec<StoneRow>, CacheError>;

    async fn count_stones(&self, shop: &str, filter: &StoneFilter) -> Result<i64, CacheError>;

    /// Every product id the shop has ever tagged, both kinds. The pull job
    /// iterates this set because the authoritative store cannot list its own
    /// builder products.
    async fn product_ids(&self, shop: &str) -> Result<Vec<String>, CacheError>;

    /// Compliance erasure: drop every row owned by the shop.
    async fn purge_shop(&self, shop: &str) -> Result<u64, CacheError>;
}
