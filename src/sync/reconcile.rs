//! Bulk reconciliation jobs
//!
//! Push repairs the authoritative store from cache rows; pull rebuilds cache
//! rows from authoritative attributes. Both are bounded by a caller-supplied
//! limit, tolerate per-item failures without aborting, and run inside the
//! triggering request, so wall clock is limit times external call latency.

use crate::codec;
use crate::db::{CacheStore, Page, SettingFilter, StoneFilter};
use crate::domain::EntityKind;
use crate::error::AppError;
use crate::shopify::MetafieldStore;

use super::ReconciliationOutcome;

/// Cache rows out to the authoritative store, settings first.
pub async fn push(
    cache: &dyn CacheStore,
    metafields: &dyn MetafieldStore,
    shop: &str,
    limit: usize,
) -> Result<ReconciliationOutcome, AppError> {
    let mut outcome = ReconciliationOutcome::default();

    let settings = cache
        .list_settings(
            shop,
            &SettingFilter::default(),
            Page {
                limit: limit as i64,
                offset: 0,
            },
        )
        .await?;
    for row in &settings {
        outcome.processed += 1;
        let inputs = codec::encode_setting(&row.meta());
        match metafields.write(shop, &row.product_id, &inputs).await {
            Ok(()) => outcome.record_success(),
            Err(err) => outcome.record_failure(
                EntityKind::Setting.as_str(),
                &row.product_id,
                err.to_string(),
            ),
        }
    }

    let remaining = limit.saturating_sub(settings.len());
    if remaining == 0 {
        return Ok(outcome);
    }
    let stones = cache
        .list_stones(
            shop,
            &StoneFilter::default(),
            Page {
                limit: remaining as i64,
                offset: 0,
            },
        )
        .await?;
    for row in &stones {
        outcome.processed += 1;
        let inputs = codec::encode_stone(&row.meta());
        match metafields.write(shop, &row.product_id, &inputs).await {
            Ok(()) => outcome.record_success(),
            Err(err) => outcome.record_failure(
                EntityKind::Stone.as_str(),
                &row.product_id,
                err.to_string(),
            ),
        }
    }

    Ok(outcome)
}

/// Authoritative attributes back into the cache. Iterates the cache's own
/// product id set since the authoritative store has no listing query for
/// builder products. Last write wins when a pull races an operator edit on
/// the same product: both funnel into the same atomic upsert.
pub async fn pull(
    cache: &dyn CacheStore,
    metafields: &dyn MetafieldStore,
    shop: &str,
    limit: usize,
) -> Result<ReconciliationOutcome, AppError> {
    let mut outcome = ReconciliationOutcome::default();

    let mut product_ids = cache.product_ids(shop).await?;
    product_ids.truncate(limit);

    for product_id in &product_ids {
        outcome.processed += 1;
        let records = match metafields.read(shop, product_id).await {
            Ok(records) => records,
            Err(err) => {
                outcome.record_failure("product", product_id, err.to_string());
                continue;
            }
        };

        match codec::classify(&records) {
            Some(EntityKind::Setting) => match codec::decode_setting(&records) {
                Ok(meta) => match cache.upsert_setting(shop, product_id, None, &meta).await {
                    Ok(_) => outcome.record_success(),
                    Err(err) => outcome.record_failure(
                        EntityKind::Setting.as_str(),
                        product_id,
                        err.to_string(),
                    ),
                },
                Err(err) => outcome.record_failure(
                    EntityKind::Setting.as_str(),
                    product_id,
                    err.to_string(),
                ),
            },
            Some(EntityKind::Stone) => match codec::decode_stone(&records) {
                Ok(meta) => match cache.upsert_stone(shop, product_id, None, &meta, None).await {
                    Ok(_) => outcome.record_success(),
                    Err(err) => outcome.record_failure(
                        EntityKind::Stone.as_str(),
                        product_id,
                        err.to_string(),
                    ),
                },
                Err(err) => outcome.record_failure(
                    EntityKind::Stone.as_str(),
                    product_id,
                    err.to_string(),
                ),
            },
            None => outcome.record_failure("product", product_id, "missing or unknown builder kind"),
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_stone, inputs_to_records, MetafieldRecord};
    use crate::domain::{SettingMeta, StoneMeta, StoneShape};
    use crate::testing::{MemoryCacheStore, MemoryMetafieldStore};
    use rust_decimal::Decimal;

    const SHOP: &str = "demo.myshopify.com";

    fn gid(n: i64) -> String {
        crate::shopify::product_gid(n)
    }

    async fn seed_stone(cache: &MemoryCacheStore, product_id: &str) {
        let meta = StoneMeta {
            shape: Some(StoneShape::Round),
            carat: Some(Decimal::new(10, 1)),
            ..StoneMeta::default()
        };
        cache
            .upsert_stone(SHOP, product_id, None, &meta, Some(100_000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_push_continues_past_item_failures() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        for n in 1..=3 {
            seed_stone(&cache, &gid(n)).await;
        }
        metafields.fail_product(&gid(2));

        let outcome = push(&cache, &metafields, SHOP, 10).await.unwrap();
        assert_eq!(outcome.processed, 3);
        assert_eq!(outcome.succeeded, 2);
        assert_eq!(outcome.failed, 1);
        assert_eq!(outcome.errors.len(), 1);
        assert!(outcome.errors[0].starts_with(&format!("stone {}:", gid(2))));
    }

    #[tokio::test]
    async fn test_push_respects_limit() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        for n in 1..=5 {
            seed_stone(&cache, &gid(n)).await;
        }

        let outcome = push(&cache, &metafields, SHOP, 2).await.unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(metafields.write_calls(), 2);
    }

    #[tokio::test]
    async fn test_pull_rebuilds_cache_from_authoritative_values() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        seed_stone(&cache, &gid(1)).await;

        // The authoritative store has newer domain fields for the product.
        let meta = StoneMeta {
            shape: Some(StoneShape::Oval),
            carat: Some(Decimal::new(152, 2)),
            ..StoneMeta::default()
        };
        metafields.set_fields(SHOP, &gid(1), inputs_to_records(&encode_stone(&meta)));

        let outcome = pull(&cache, &metafields, SHOP, 10).await.unwrap();
        assert_eq!(outcome.succeeded, 1);

        let row = cache.get_stone(SHOP, &gid(1)).await.unwrap().unwrap();
        assert_eq!(row.shape.as_deref(), Some("oval"));
        assert_eq!(row.carat, Some(Decimal::new(152, 2)));
        // Platform-owned price survives a pull.
        assert_eq!(row.price, Some(100_000));
    }

    #[tokio::test]
    async fn test_pull_reports_unclassifiable_products() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        seed_stone(&cache, &gid(1)).await;
        seed_stone(&cache, &gid(2)).await;
        metafields.set_fields(
            SHOP,
            &gid(1),
            inputs_to_records(&encode_stone(&StoneMeta::default())),
        );
        // Product 2 has no builder metafields at all.

        let outcome = pull(&cache, &metafields, SHOP, 10).await.unwrap();
        assert_eq!(outcome.processed, 2);
        assert_eq!(outcome.succeeded, 1);
        assert_eq!(outcome.failed, 1);
        assert!(outcome.errors[0].contains("missing or unknown builder kind"));
    }

    #[tokio::test]
    async fn test_pull_treats_malformed_values_as_item_failures() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        seed_stone(&cache, &gid(1)).await;
        metafields.set_fields(
            SHOP,
            &gid(1),
            vec![
                MetafieldRecord {
                    key: "kind".into(),
                    value: "stone".into(),
                    value_type: "single_line_text_field".into(),
                },
                MetafieldRecord {
                    key: "carat".into(),
                    value: "heavy".into(),
                    value_type: "number_decimal".into(),
                },
            ],
        );

        let outcome = pull(&cache, &metafields, SHOP, 10).await.unwrap();
        assert_eq!(outcome.failed, 1);
        assert!(outcome.errors[0].contains("carat"));
        // The cached row keeps its previous values.
        let row = cache.get_stone(SHOP, &gid(1)).await.unwrap().unwrap();
        assert_eq!(row.shape.as_deref(), Some("round"));
    }

    #[tokio::test]
    async fn test_pull_converts_kind_on_discriminator_change() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        seed_stone(&cache, &gid(1)).await;
        // Authoritative store now says the product is a setting.
        metafields.set_fields(
            SHOP,
            &gid(1),
            inputs_to_records(&codec::encode_setting(&SettingMeta::default())),
        );

        let outcome = pull(&cache, &metafields, SHOP, 10).await.unwrap();
        assert_eq!(outcome.succeeded, 1);
        assert!(cache.get_stone(SHOP, &gid(1)).await.unwrap().is_none());
        assert!(cache.get_setting(SHOP, &gid(1)).await.unwrap().is_some());
    }
}
