//! Platform webhook ingestion
pub mod dispatcher;
pub mod guard;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::db::PlatformUpdate;

pub use dispatcher::handle;
pub use guard::{IdempotencyGuard, InMemoryGuard};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WebhookTopic {
    ProductUpdate,
    ProductDelete,
    ShopRedact,
    CustomersRedact,
    CustomersDataRequest,
    Unknown,
}

impl WebhookTopic {
    pub fn parse(topic: &str) -> Self {
        match topic {
            "products/create" | "products/update" => Self::ProductUpdate,
            "products/delete" => Self::ProductDelete,
            "shop/redact" => Self::ShopRedact,
            "customers/redact" => Self::CustomersRedact,
            "customers/data_request" => Self::CustomersDataRequest,
            _ => Self::Unknown,
        }
    }
}

/// `products/create` and `products/update` payload, reduced to the fields the
/// cache cares about.
#[derive(Clone, Debug, Deserialize)]
pub struct ProductUpdateEvent {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantPayload>,
    #[serde(default)]
    pub images: Vec<ImagePayload>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct VariantPayload {
    #[serde(default)]
    pub price: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ImagePayload {
    #[serde(default)]
    pub src: Option<String>,
}

impl ProductUpdateEvent {
    /// Platform-owned fields only; domain fields never travel this path.
    pub fn platform_update(&self) -> PlatformUpdate {
        PlatformUpdate {
            title: self.title.clone(),
            price: self
                .variants
                .first()
                .and_then(|v| v.price.as_deref())
                .and_then(price_to_minor_units),
            image_url: self.images.first().and_then(|i| i.src.clone()),
            available: self.status.as_deref().map(|s| s == "active"),
        }
    }
}

/// `products/delete` payload: a bare numeric id, mapped to the platform's
/// global identifier format before any cache lookup.
#[derive(Clone, Debug, Deserialize)]
pub struct ProductDeleteEvent {
    pub id: i64,
}

/// Platform prices arrive as decimal strings ("6000.00"); the cache stores
/// minor units.
fn price_to_minor_units(price: &str) -> Option<i64> {
    let amount: Decimal = price.parse().ok()?;
    (amount * Decimal::new(100, 0)).round().to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_topic_parsing() {
        assert_eq!(
            WebhookTopic::parse("products/update"),
            WebhookTopic::ProductUpdate
        );
        assert_eq!(
            WebhookTopic::parse("products/delete"),
            WebhookTopic::ProductDelete
        );
        assert_eq!(WebhookTopic::parse("shop/redact"), WebhookTopic::ShopRedact);
        assert_eq!(WebhookTopic::parse("orders/create"), WebhookTopic::Unknown);
    }

    #[test]
    fn test_price_to_minor_units() {
        assert_eq!(price_to_minor_units("6000.00"), Some(600_000));
        assert_eq!(price_to_minor_units("59.99"), Some(5_999));
        assert_eq!(price_to_minor_units("not a price"), None);
    }

    #[test]
    fn test_platform_update_from_payload() {
        let payload = json!({
            "id": 42,
            "title": "Oval diamond",
            "status": "archived",
            "variants": [{"price": "1250.50"}, {"price": "9999.99"}],
            "images": [{"src": "https://cdn.example/oval.jpg"}],
        });
        let event: ProductUpdateEvent = serde_json::from_value(payload).unwrap();
        let update = event.platform_update();
        assert_eq!(update.title.as_deref(), Some("Oval diamond"));
        assert_eq!(update.price, Some(125_050));
        assert_eq!(update.image_url.as_deref(), Some("https://cdn.example/oval.jpg"));
        assert_eq!(update.available, Some(false));
    }

    #[test]
    fn test_sparse_payload_updates_nothing() {
        let event: ProductUpdateEvent = serde_json::from_value(json!({"id": 42})).unwrap();
        let update = event.platform_update();
        assert!(update.title.is_none());
        assert!(update.price.is_none());
        assert!(update.image_url.is_none());
        assert!(update.available.is_none());
    }
}
