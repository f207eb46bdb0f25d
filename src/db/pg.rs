//! PostgreSQL cache store

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::{SettingMeta, SettingRow, StoneMeta, StoneRow};
use crate::error::CacheError;

use super::{CacheStore, Page, PlatformUpdate, SettingFilter, StoneFilter};

#[derive(Clone)]
pub struct PgCacheStore {
    pool: PgPool,
}

impl PgCacheStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn prices_json(meta: &SettingMeta) -> serde_json::Value {
    serde_json::Value::Object(
        meta.metal_prices
            .iter()
            .map(|(metal, price)| (metal.as_str().to_string(), serde_json::json!(*price)))
            .collect(),
    )
}

#[async_trait]
impl CacheStore for PgCacheStore {
    async fn upsert_setting(
        &self,
        shop: &str,
        product_id: &str,
        title: Option<&str>,
        meta: &SettingMeta,
    ) -> Result<SettingRow, CacheError> {
        let shapes: Vec<String> = meta.shapes.iter().map(|s| s.as_str().to_string()).collect();
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM stone_cache WHERE shop = $1 AND product_id = $2")
            .bind(shop)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, SettingRow>(
            r#"
            INSERT INTO setting_cache (id, shop, product_id, title, style, shapes, metal_prices, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NOW(), NOW())
            ON CONFLICT (shop, product_id) DO UPDATE SET
                title = COALESCE(EXCLUDED.title, setting_cache.title),
                style = EXCLUDED.style,
                shapes = EXCLUDED.shapes,
                metal_prices = EXCLUDED.metal_prices,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(shop)
        .bind(product_id)
        .bind(title)
        .bind(meta.style.map(|s| s.as_str()))
        .bind(&shapes)
        .bind(prices_json(meta))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM setting_cache WHERE shop = $1 AND product_id = $2")
            .bind(shop)
            .bind(product_id)
            .execute(&mut *tx)
            .await?;
        let row = sqlx::query_as::<_, StoneRow>(
            r#"
            INSERT INTO stone_cache (id, shop, product_id, title, shape, carat, color, clarity, certificate, price, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, NOW(), NOW())
            ON CONFLICT (shop, product_id) DO UPDATE SET
                title = COALESCE(EXCLUDED.title, stone_cache.title),
                shape = EXCLUDED.shape,
                carat = EXCLUDED.carat,
                color = EXCLUDED.color,
                clarity = EXCLUDED.clarity,
                certificate = EXCLUDED.certificate,
                price = COALESCE(EXCLUDED.price, stone_cache.price),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(Uuid::now_v7())
        .bind(shop)
        .bind(product_id)
        .bind(title)
        .bind(meta.shape.map(|s| s.as_str()))
        .bind(meta.carat)
        .bind(meta.color.map(|c| c.as_str()))
        .bind(meta.clarity.map(|c| c.as_str()))
        .bind(meta.certificate.as_deref())
        .bind(price)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(row)
    }

    async fn get_setting(
        &self,
        shop: &str,
        product_id: &str,
    ) -> Result<Option<SettingRow>, CacheError> {
        let row = sqlx::query_as::<_, SettingRow>(
            "SELECT * FROM setting_cache WHERE shop = $1 AND product_id = $2",
        )
        .bind(shop)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_stone(
        &self,
        shop: &str,
        product_id: &str,
    ) -> Result<Option<StoneRow>, CacheError> {
        let row = sqlx::query_as::<_, StoneRow>(
            "SELECT * FROM stone_cache WHERE shop = $1 AND product_id = $2",
        )
        .bind(shop)
        .bind(product_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_all(&self, shop: &str, product_id: &str) -> Result<u64, CacheError> {
        let settings =
            sqlx::query("DELETE FROM setting_cache WHERE shop = $1 AND product_id = $2")
                .bind(shop)
                .bind(product_id)
                .execute(&self.pool)
                .await?;
        let stones = sqlx::query("DELETE FROM stone_cache WHERE shop = $1 AND product_id = $2")
            .bind(shop)
            .bind(product_id)
            .execute(&self.pool)
            .await?;
        Ok(settings.rows_affected() + stones.rows_affected())
    }

    async fn update_platform_fields(
        &self,
        shop: &str,
        product_id: &str,
        update: &PlatformUpdate,
    ) -> Result<u64, CacheError> {
        let stones = sqlx::query(
            r#"
            UPDATE stone_cache SET
                title = COALESCE($3, title),
                price = COALESCE($4, price),
                image_url = COALESCE($5, image_url),
                available = COALESCE($6, available),
                updated_at = NOW()
            WHERE shop = $1 AND product_id = $2
            "#,
        )
        .bind(shop)
        .bind(product_id)
        .bind(update.title.as_deref())
        .bind(update.price)
        .bind(update.image_url.as_deref())
        .bind(update.available)
        .execute(&self.pool)
        .await?;
        let settings = sqlx::query(
            r#"
            UPDATE setting_cache SET
                title = COALESCE($3, title),
                updated_at = NOW()
            WHERE shop = $1 AND product_id = $2
            "#,
        )
        .bind(shop)
        .bind(product_id)
        .bind(update.title.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(stones.rows_affected() + settings.rows_affected())
    }

    async fn list_settings(
        &self,
        shop: &str,
        filter: &SettingFilter,
        page: Page,
    ) -> Result<Vec<SettingRow>, CacheError> {
        let rows = sqlx::query_as::<_, SettingRow>(
            r#"
            SELECT * FROM setting_cache
            WHERE shop = $1
              AND ($2::text IS NULL OR $2 = ANY(shapes))
              AND ($3::text IS NULL OR metal_prices ->> $3 IS NOT NULL)
            ORDER BY updated_at DESC
            LIMIT $4 OFFSET $5
            "#,
        )
        .bind(shop)
        .bind(filter.shape.map(|s| s.as_str()))
        .bind(filter.metal.map(|m| m.as_str()))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_settings(
        &self,
        shop: &str,
        filter: &SettingFilter,
    ) -> Result<i64, CacheError> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM setting_cache
            WHERE shop = $1
              AND ($2::text IS NULL OR $2 = ANY(shapes))
              AND ($3::text IS NULL OR metal_prices ->> $3 IS NOT NULL)
            "#,
        )
        .bind(shop)
        .bind(filter.shape.map(|s| s.as_str()))
        .bind(filter.metal.map(|m| m.as_str()))
        .fetch_one(&self.pool)
        .await?;
        Ok(total.0)
    }

    async fn list_stones(
        &self,
        shop: &str,
        filter: &StoneFilter,
        page: Page,
    ) -> Result<Vec<StoneRow>, CacheError> {
        let rows = sqlx::query_as::<_, StoneRow>(
            r#"
            SELECT * FROM stone_cache
            WHERE shop = $1
              AND ($2::text IS NULL OR shape = $2)
              AND ($3::numeric IS NULL OR carat >= $3)
              AND ($4::numeric IS NULL OR carat <= $4)
              AND ($5::boolean IS NULL OR available = $5)
            ORDER BY updated_at DESC
            LIMIT $6 OFFSET $7
            "#,
        )
        .bind(shop)
        .bind(filter.shape.map(|s| s.as_str()))
        .bind(filter.min_carat)
        .bind(filter.max_carat)
        .bind(filter.available)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_stones(&self, shop: &str, filter: &StoneFilter) -> Result<i64, CacheError> {
        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM stone_cache
            WHERE shop = $1
              AND ($2::text IS NULL OR shape = $2)
              AND ($3::numeric IS NULL OR carat >= $3)
              AND ($4::numeric IS NULL OR carat <= $4)
              AND ($5::boolean IS NULL OR available = $5)
            "#,
        )
        .bind(shop)
        .bind(filter.shape.map(|s| s.as_str()))
        .bind(filter.min_carat)
        .bind(filter.max_carat)
        .bind(filter.available)
        .fetch_one(&self.pool)
        .await?;
        Ok(total.0)
    }

    async fn product_ids(&self, shop: &str) -> Result<Vec<String>, CacheError> {
        let ids: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT product_id FROM setting_cache WHERE shop = $1
            UNION
            SELECT product_id FROM stone_cache WHERE shop = $1
            ORDER BY product_id
            "#,
        )
        .bind(shop)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids.into_iter().map(|(id,)| id).collect())
    }

    async fn purge_shop(&self, shop: &str) -> Result<u64, CacheError> {
        let settings = sqlx::query("DELETE FROM setting_cache WHERE shop = $1")
            .bind(shop)
            .execute(&self.pool)
            .await?;
        let stones = sqlx::query("DELETE FROM stone_cache WHERE shop = $1")
            .bind(shop)
            .execute(&self.pool)
            .await?;
        Ok(settings.rows_affected() + stones.rows_affected())
    }
}
