//! Authoritative attribute store access
//!
//! The platform's per-product metafields are the source of truth for all
//! domain-owned builder fields. This module exposes that store behind the
//! narrow [`MetafieldStore`] trait; the GraphQL transport underneath is
//! consumed as an opaque call-and-response dependency.

use async_trait::async_trait;
use serde_json::json;
use thiserror::Error;

use crate::codec::{self, MetafieldInput, MetafieldRecord};
use crate::config::Config;

/// Map a numeric platform product id to its global identifier.
pub fn product_gid(id: i64) -> String {
    format!("gid://shopify/Product/{id}")
}

pub fn parse_product_gid(gid: &str) -> Option<i64> {
    gid.strip_prefix("gid://shopify/Product/")
        .and_then(|id| id.parse().ok())
}

#[derive(Debug, Error)]
pub enum MetafieldError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("graphql errors: {0}")]
    Graphql(String),

    #[error("user errors: {0}")]
    UserErrors(String),

    #[error("product not found in platform")]
    MissingProduct,

    #[error("unexpected response shape")]
    Shape,
}

/// Read/write access to a product's builder-namespace attributes.
///
/// Writes are field-level idempotent on the platform side: repeating an
/// identical batch is safe, which is what the reconciliation jobs rely on.
#[async_trait]
pub trait MetafieldStore: Send + Sync {
    async fn read(
        &self,
        shop: &str,
        product_gid: &str,
    ) -> Result<Vec<MetafieldRecord>, MetafieldError>;

    async fn write(
        &self,
        shop: &str,
        product_gid: &str,
        fields: &[MetafieldInput],
    ) -> Result<(), MetafieldError>;
}

/// Admin GraphQL implementation of [`MetafieldStore`].
pub struct ShopifyAdminClient {
    http: reqwest::Client,
    token: String,
    api_version: String,
}

impl ShopifyAdminClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            token: config.shopify_admin_token.clone(),
            api_version: config.shopify_api_version.clone(),
        }
    }

    fn endpoint(&self, shop: &str) -> String {
        format!("https://{shop}/admin/api/{}/graphql.json", self.api_version)
    }

    async fn call(
        &self,
        shop: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, MetafieldError> {
        let response = self
            .http
            .post(self.endpoint(shop))
            .header("X-Shopify-Access-Token", &self.token)
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        let payload: serde_json::Value = response.json().await?;
        if let Some(errors) = payload.get("errors") {
            if !errors.is_null() {
                return Err(MetafieldError::Graphql(errors.to_string()));
            }
        }
        Ok(payload)
    }
}

const READ_QUERY: &str = "\
query($id: ID!, $namespace: String!) {
  product(id: $id) {
    metafields(first: 50, namespace: $namespace) {
      edges { node { key value type } }
    }
  }
}";

const WRITE_MUTATION: &str = "\
mutation($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    userErrors { field message }
  }
}";

#[async_trait]
impl MetafieldStore for ShopifyAdminClient {
    async fn read(
        &self,
        shop: &str,
        product_gid: &str,
    ) -> Result<Vec<MetafieldRecord>, MetafieldError> {
        let body = json!({
            "query": READ_QUERY,
            "variables": { "id": product_gid, "namespace": codec::NAMESPACE },
        });
        let payload = self.call(shop, &body).await?;

        let product = payload
            .pointer("/data/product")
            .ok_or(MetafieldError::Shape)?;
        if product.is_null() {
            return Err(MetafieldError::MissingProduct);
        }
        let edges = product
            .pointer("/metafields/edges")
            .and_then(|e| e.as_array())
            .ok_or(MetafieldError::Shape)?;

        Ok(edges
            .iter()
            .filter_map(|edge| {
                let node = edge.get("node")?;
                Some(MetafieldRecord {
                    key: node.get("key")?.as_str()?.to_string(),
                    value: node.get("value")?.as_str()?.to_string(),
                    value_type: node.get("type")?.as_str()?.to_string(),
                })
            })
            .collect())
    }

    async fn write(
        &self,
        shop: &str,
        product_gid: &str,
        fields: &[MetafieldInput],
    ) -> Result<(), MetafieldError> {
        let metafields: Vec<serde_json::Value> = fields
            .iter()
            .map(|f| {
                json!({
                    "ownerId": product_gid,
                    "namespace": codec::NAMESPACE,
                    "key": f.key,
                    "value": f.value,
                    "type": f.value_type,
                })
            })
            .collect();
        let body = json!({
            "query": WRITE_MUTATION,
            "variables": { "metafields": metafields },
        });
        let payload = self.call(shop, &body).await?;

        let user_errors = payload
            .pointer("/data/metafieldsSet/userErrors")
            .and_then(|e| e.as_array())
            .ok_or(MetafieldError::Shape)?;
        if !user_errors.is_empty() {
            let joined = user_errors
                .iter()
                .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MetafieldError::UserErrors(joined));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_gid_round_trip() {
        let gid = product_gid(632910392);
        assert_eq!(gid, "gid://shopify/Product/632910392");
        assert_eq!(parse_product_gid(&gid), Some(632910392));
    }

    #[test]
    fn test_parse_rejects_foreign_gids() {
        assert_eq!(parse_product_gid("gid://shopify/ProductVariant/1"), None);
        assert_eq!(parse_product_gid("632910392"), None);
    }
}
