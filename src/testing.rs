//! In-memory fakes for exercising the sync engine without Postgres or the
//! platform API. Semantics mirror the production implementations, including
//! kind exclusivity and the keep-on-`None` behavior of platform-owned fields.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

use crate::codec::{MetafieldInput, MetafieldRecord};
use crate::db::{CacheStore, Page, PlatformUpdate, SettingFilter, StoneFilter};
use crate::domain::{SettingMeta, SettingRow, StoneMeta, StoneRow};
use crate::error::CacheError;
use crate::shopify::{MetafieldError, MetafieldStore};

type Key = (String, String);

fn key(shop: &str, product_id: &str) -> Key {
    (shop.to_string(), product_id.to_string())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// Cache store fake
// =============================================================================

#[derive(Default)]
pub struct MemoryCacheStore {
    settings: Mutex<HashMap<Key, SettingRow>>,
    stones: Mutex<HashMap<Key, StoneRow>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn upsert_setting(
        &self,
        shop: &str,
        product_id: &str,
        title: Option<&str>,
        meta: &SettingMeta,
    ) -> Result<SettingRow, CacheError> {
        lock(&self.stones).remove(&key(shop, product_id));
        let mut settings = lock(&self.settings);
        let now = Utc::now();
        let existing = settings.get(&key(shop, product_id));
        let row = SettingRow {
            id: existing.map(|r| r.id).unwrap_or_else(Uuid::now_v7),
            shop: shop.to_string(),
            product_id: product_id.to_string(),
            title: title
                .map(str::to_string)
                .or_else(|| existing.and_then(|r| r.title.clone())),
            style: meta.style.map(|s| s.as_str().to_string()),
            shapes: meta.shapes.iter().map(|s| s.as_str().to_string()).collect(),
            metal_prices: serde_json::Value::Object(
                meta.metal_prices
                    .iter()
                    .map(|(metal, price)| {
                        (metal.as_str().to_string(), serde_json::json!(*price))
                    })
                    .collect(),
            ),
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        settings.insert(key(shop, product_id), row.clone());
        Ok(row)
    }

    async fn upsert_stone(
        &self,
        shop: &str,
        product_id: &str,
        title: Option<&str>,
        meta: &StoneMeta,
        price: Option<i64>,
    ) -> Result<StoneRow, CacheError> {
        lock(&self.settings).remove(&key(shop, product_id));
        let mut stones = lock(&self.stones);
        let now = Utc::now();
        let existing = stones.get(&key(shop, product_id));
        let row = StoneRow {
            id: existing.map(|r| r.id).unwrap_or_else(Uuid::now_v7),
            shop: shop.to_string(),
            product_id: product_id.to_string(),
            title: title
                .map(str::to_string)
                .or_else(|| existing.and_then(|r| r.title.clone())),
            shape: meta.shape.map(|s| s.as_str().to_string()),
            carat: meta.carat,
            color: meta.color.map(|c| c.as_str().to_string()),
            clarity: meta.clarity.map(|c| c.as_str().to_string()),
            certificate: meta.certificate.clone(),
            price: price.or_else(|| existing.and_then(|r| r.price)),
            image_url: existing.and_then(|r| r.image_url.clone()),
            available: existing.map(|r| r.available).unwrap_or(true),
            created_at: existing.map(|r| r.created_at).unwrap_or(now),
            updated_at: now,
        };
        stones.insert(key(shop, product_id), row.clone());
        Ok(row)
    }

    async fn get_setting(
        &self,
        shop: &str,
        product_id: &str,
    ) -> Result<Option<SettingRow>, CacheError> {
        Ok(lock(&self.settings).get(&key(shop, product_id)).cloned())
    }

    async fn get_stone(
        &self,
        shop: &str,
        product_id: &str,
    ) -> Result<Option<StoneRow>, CacheError> {
        Ok(lock(&self.stones).get(&key(shop, product_id)).cloned())
    }

    async fn delete_all(&self, shop: &str, product_id: &str) -> Result<u64, CacheError> {
        let mut deleted = 0;
        if lock(&self.settings).remove(&key(shop, product_id)).is_some() {
            deleted += 1;
        }
        if lock(&self.stones).remove(&key(shop, product_id)).is_some() {
            deleted += 1;
        }
        Ok(deleted)
    }

    async fn update_platform_fields(
        &self,
        shop: &str,
        product_id: &str,
        update: &PlatformUpdate,
    ) -> Result<u64, CacheError> {
        let mut rows = 0;
        if let Some(row) = lock(&self.stones).get_mut(&key(shop, product_id)) {
            if let Some(title) = &update.title {
                row.title = Some(title.clone());
            }
            if let Some(price) = update.price {
                row.price = Some(price);
            }
            if let Some(image_url) = &update.image_url {
                row.image_url = Some(image_url.clone());
            }
            if let Some(available) = update.available {
                row.available = available;
            }
            row.updated_at = Utc::now();
            rows += 1;
        }
        if let Some(row) = lock(&self.settings).get_mut(&key(shop, product_id)) {
            if let Some(title) = &update.title {
                row.title = Some(title.clone());
            }
            row.updated_at = Utc::now();
            rows += 1;
        }
        Ok(rows)
    }

    async fn list_settings(
        &self,
        shop: &str,
        filter: &SettingFilter,
        page: Page,
    ) -> Result<Vec<SettingRow>, CacheError> {
        let mut rows: Vec<SettingRow> = lock(&self.settings)
            .values()
            .filter(|row| row.shop == shop && setting_matches(row, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(paginate(rows, page))
    }

    async fn count_settings(
        &self,
        shop: &str,
        filter: &SettingFilter,
    ) -> Result<i64, CacheError> {
        Ok(lock(&self.settings)
            .values()
            .filter(|row| row.shop == shop && setting_matches(row, filter))
            .count() as i64)
    }

    async fn list_stones(
        &self,
        shop: &str,
        filter: &StoneFilter,
        page: Page,
    ) -> Result<Vec<StoneRow>, CacheError> {
        let mut rows: Vec<StoneRow> = lock(&self.stones)
            .values()
            .filter(|row| row.shop == shop && stone_matches(row, filter))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(paginate(rows, page))
    }

    async fn count_stones(&self, shop: &str, filter: &StoneFilter) -> Result<i64, CacheError> {
        Ok(lock(&self.stones)
            .values()
            .filter(|row| row.shop == shop && stone_matches(row, filter))
            .count() as i64)
    }

    async fn product_ids(&self, shop: &str) -> Result<Vec<String>, CacheError> {
        let mut ids: Vec<String> = lock(&self.settings)
            .values()
            .filter(|row| row.shop == shop)
            .map(|row| row.product_id.clone())
            .chain(
                lock(&self.stones)
                    .values()
                    .filter(|row| row.shop == shop)
                    .map(|row| row.product_id.clone()),
            )
            .collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    async fn purge_shop(&self, shop: &str) -> Result<u64, CacheError> {
        let mut settings = lock(&self.settings);
        let mut stones = lock(&self.stones);
        let before = settings.len() + stones.len();
        settings.retain(|(s, _), _| s != shop);
        stones.retain(|(s, _), _| s != shop);
        Ok((before - settings.len() - stones.len()) as u64)
    }
}

fn setting_matches(row: &SettingRow, filter: &SettingFilter) -> bool {
    if let Some(shape) = filter.shape {
        if !row.shapes.iter().any(|s| s == shape.as_str()) {
            return false;
        }
    }
    if let Some(metal) = filter.metal {
        let priced = row
            .metal_prices
            .as_object()
            .is_some_and(|map| map.contains_key(metal.as_str()));
        if !priced {
            return false;
        }
    }
    true
}

fn stone_matches(row: &StoneRow, filter: &StoneFilter) -> bool {
    if let Some(shape) = filter.shape {
        if row.shape.as_deref() != Some(shape.as_str()) {
            return false;
        }
    }
    if let Some(min) = filter.min_carat {
        if !row.carat.is_some_and(|c| c >= min) {
            return false;
        }
    }
    if let Some(max) = filter.max_carat {
        if !row.carat.is_some_and(|c| c <= max) {
            return false;
        }
    }
    if let Some(available) = filter.available {
        if row.available != available {
            return false;
        }
    }
    true
}

fn paginate<T>(rows: Vec<T>, page: Page) -> Vec<T> {
    rows.into_iter()
        .skip(page.offset.max(0) as usize)
        .take(page.limit.max(0) as usize)
        .collect()
}

// =============================================================================
// Metafield store fake
// =============================================================================

#[derive(Default)]
pub struct MemoryMetafieldStore {
    fields: Mutex<HashMap<Key, Vec<MetafieldRecord>>>,
    failing: Mutex<HashSet<String>>,
    write_calls: AtomicUsize,
}

impl MemoryMetafieldStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every read or write touching this product gid fails from now on.
    pub fn fail_product(&self, product_gid: &str) {
        lock(&self.failing).insert(product_gid.to_string());
    }

    pub fn set_fields(&self, shop: &str, product_gid: &str, records: Vec<MetafieldRecord>) {
        lock(&self.fields).insert(key(shop, product_gid), records);
    }

    pub fn fields(&self, shop: &str, product_gid: &str) -> Vec<MetafieldRecord> {
        lock(&self.fields)
            .get(&key(shop, product_gid))
            .cloned()
            .unwrap_or_default()
    }

    pub fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self, product_gid: &str) -> Result<(), MetafieldError> {
        if lock(&self.failing).contains(product_gid) {
            return Err(MetafieldError::Graphql("injected failure".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl MetafieldStore for MemoryMetafieldStore {
    async fn read(
        &self,
        shop: &str,
        product_gid: &str,
    ) -> Result<Vec<MetafieldRecord>, MetafieldError> {
        self.check_failure(product_gid)?;
        Ok(self.fields(shop, product_gid))
    }

    async fn write(
        &self,
        shop: &str,
        product_gid: &str,
        inputs: &[MetafieldInput],
    ) -> Result<(), MetafieldError> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(product_gid)?;
        let mut fields = lock(&self.fields);
        let records = fields.entry(key(shop, product_gid)).or_default();
        for input in inputs {
            match records.iter_mut().find(|r| r.key == input.key) {
                Some(record) => {
                    record.value = input.value.clone();
                    record.value_type = input.value_type.clone();
                }
                None => records.push(MetafieldRecord {
                    key: input.key.clone(),
                    value: input.value.clone(),
                    value_type: input.value_type.clone(),
                }),
            }
        }
        Ok(())
    }
}
