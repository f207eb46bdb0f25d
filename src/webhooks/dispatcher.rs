//! Webhook dispatcher
//!
//! Every path acknowledges receipt: an error response would make the platform
//! retry and eventually drop the subscription, which is worse than a logged
//! gap the next reconciliation pass heals. Failures therefore never escape
//! this module; they are logged with (topic, shop) context and the delivery
//! is left unmarked so a redelivery can try again.

use thiserror::Error;

use crate::db::CacheStore;
use crate::error::CacheError;
use crate::shopify::product_gid;

use super::guard::IdempotencyGuard;
use super::{ProductDeleteEvent, ProductUpdateEvent, WebhookTopic};

#[derive(Debug, Error)]
enum WebhookError {
    #[error("unreadable payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// Process one delivery. Infallible by design; the HTTP layer always acks.
pub async fn handle(
    cache: &dyn CacheStore,
    guard: &dyn IdempotencyGuard,
    topic: &str,
    shop: &str,
    delivery_id: &str,
    payload: serde_json::Value,
) {
    if guard.seen(delivery_id) {
        tracing::info!(topic, shop, delivery_id, "duplicate webhook delivery, skipping");
        return;
    }

    match dispatch(cache, topic, shop, payload).await {
        Ok(()) => guard.mark_seen(delivery_id),
        Err(err) => {
            tracing::error!(topic, shop, error = %err, "webhook handling failed");
        }
    }
}

async fn dispatch(
    cache: &dyn CacheStore,
    topic: &str,
    shop: &str,
    payload: serde_json::Value,
) -> Result<(), WebhookError> {
    match WebhookTopic::parse(topic) {
        WebhookTopic::ProductUpdate => {
            let event: ProductUpdateEvent = serde_json::from_value(payload)?;
            let gid = product_gid(event.id);
            let rows = cache
                .update_platform_fields(shop, &gid, &event.platform_update())
                .await?;
            tracing::info!(shop, product_id = %gid, rows, "applied product update");
        }
        WebhookTopic::ProductDelete => {
            let event: ProductDeleteEvent = serde_json::from_value(payload)?;
            let gid = product_gid(event.id);
            let rows = cache.delete_all(shop, &gid).await?;
            tracing::info!(shop, product_id = %gid, rows, "applied product deletion");
        }
        WebhookTopic::ShopRedact => {
            let rows = cache.purge_shop(shop).await?;
            tracing::info!(shop, rows, "purged shop data for redaction request");
        }
        WebhookTopic::CustomersRedact | WebhookTopic::CustomersDataRequest => {
            // The builder stores no customer data; acknowledging is the
            // complete response.
            tracing::info!(topic, shop, "customer compliance webhook acknowledged");
        }
        WebhookTopic::Unknown => {
            tracing::debug!(topic, shop, "unhandled webhook topic");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{StoneMeta, StoneShape};
    use crate::testing::MemoryCacheStore;
    use crate::webhooks::InMemoryGuard;
    use rust_decimal::Decimal;
    use serde_json::json;

    const SHOP: &str = "demo.myshopify.com";

    async fn seed_stone(cache: &MemoryCacheStore, id: i64) {
        let meta = StoneMeta {
            shape: Some(StoneShape::Round),
            carat: Some(Decimal::new(12, 1)),
            ..StoneMeta::default()
        };
        cache
            .upsert_stone(SHOP, &product_gid(id), None, &meta, Some(500_000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_product_update_touches_platform_fields_only() {
        let cache = MemoryCacheStore::new();
        let guard = InMemoryGuard::default();
        seed_stone(&cache, 1).await;

        let payload = json!({"id": 1, "variants": [{"price": "6000.00"}]});
        handle(&cache, &guard, "products/update", SHOP, "d-1", payload).await;

        let row = cache.get_stone(SHOP, &product_gid(1)).await.unwrap().unwrap();
        assert_eq!(row.price, Some(600_000));
        assert_eq!(row.shape.as_deref(), Some("round"));
        assert_eq!(row.carat, Some(Decimal::new(12, 1)));
    }

    #[tokio::test]
    async fn test_duplicate_delivery_mutates_once() {
        let cache = MemoryCacheStore::new();
        let guard = InMemoryGuard::default();
        seed_stone(&cache, 1).await;

        let payload = json!({"id": 1});
        handle(&cache, &guard, "products/delete", SHOP, "d-9", payload.clone()).await;
        assert!(cache.get_stone(SHOP, &product_gid(1)).await.unwrap().is_none());

        // The row reappears (operator re-marks it), then the same delivery id
        // arrives again: the guard swallows it.
        seed_stone(&cache, 1).await;
        handle(&cache, &guard, "products/delete", SHOP, "d-9", payload).await;
        assert!(cache.get_stone(SHOP, &product_gid(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_deleting_unknown_product_is_a_successful_noop() {
        let cache = MemoryCacheStore::new();
        let guard = InMemoryGuard::default();

        handle(&cache, &guard, "products/delete", SHOP, "d-2", json!({"id": 404})).await;
        // Handled successfully, so the delivery is marked.
        assert!(guard.seen("d-2"));
    }

    #[tokio::test]
    async fn test_shop_redact_purges_all_rows() {
        let cache = MemoryCacheStore::new();
        let guard = InMemoryGuard::default();
        seed_stone(&cache, 1).await;
        seed_stone(&cache, 2).await;

        handle(&cache, &guard, "shop/redact", SHOP, "d-3", json!({})).await;
        assert!(cache.product_ids(SHOP).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_payload_is_swallowed_and_left_unmarked() {
        let cache = MemoryCacheStore::new();
        let guard = InMemoryGuard::default();

        handle(&cache, &guard, "products/delete", SHOP, "d-4", json!({"id": "x"})).await;
        // Not marked, so a redelivery may retry.
        assert!(!guard.seen("d-4"));
    }

    #[tokio::test]
    async fn test_unknown_topic_is_acknowledged() {
        let cache = MemoryCacheStore::new();
        let guard = InMemoryGuard::default();

        handle(&cache, &guard, "orders/create", SHOP, "d-5", json!({})).await;
        assert!(guard.seen("d-5"));
    }
}
