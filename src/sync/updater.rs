//! Write-through metadata updater
//!
//! The order of operations is deliberate: validate with zero side effects,
//! then write the authoritative store, then upsert the cache no matter how
//! the authoritative write went. The cache serves shopper traffic, so its
//! availability is never gated on the external API; a degraded write is
//! reported through `metafields_written` and repaired by the next push.

use crate::codec;
use crate::db::CacheStore;
use crate::domain::{MetadataEdit, SettingRow, StoneRow};
use crate::error::AppError;
use crate::shopify::{product_gid, MetafieldStore};

#[derive(Clone, Debug)]
pub enum UpdatedRow {
    Setting(SettingRow),
    Stone(StoneRow),
}

#[derive(Clone, Debug)]
pub struct UpdateOutcome {
    pub row: UpdatedRow,
    /// False when the authoritative write failed in whole or in part.
    pub metafields_written: bool,
}

pub async fn apply_edit(
    cache: &dyn CacheStore,
    metafields: &dyn MetafieldStore,
    shop: &str,
    edit: &MetadataEdit,
) -> Result<UpdateOutcome, AppError> {
    edit.validate()?;
    let gid = product_gid(edit.product_id());

    match edit {
        MetadataEdit::Setting(edit) => {
            let meta = edit.meta();
            let written = write_authoritative(metafields, shop, &gid, codec::encode_setting(&meta)).await;
            let row = cache
                .upsert_setting(shop, &gid, edit.title.as_deref(), &meta)
                .await?;
            Ok(UpdateOutcome {
                row: UpdatedRow::Setting(row),
                metafields_written: written,
            })
        }
        MetadataEdit::Stone(edit) => {
            let meta = edit.meta();
            let written = write_authoritative(metafields, shop, &gid, codec::encode_stone(&meta)).await;
            let row = cache
                .upsert_stone(shop, &gid, edit.title.as_deref(), &meta, edit.price)
                .await?;
            Ok(UpdateOutcome {
                row: UpdatedRow::Stone(row),
                metafields_written: written,
            })
        }
    }
}

async fn write_authoritative(
    metafields: &dyn MetafieldStore,
    shop: &str,
    gid: &str,
    inputs: Vec<codec::MetafieldInput>,
) -> bool {
    match metafields.write(shop, gid, &inputs).await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(
                shop,
                product_id = gid,
                error = %err,
                "authoritative metafield write failed, cache will be updated anyway"
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BuilderStatus, Metal, MetadataEdit, SettingEdit, SettingStyle, StoneEdit, StoneShape,
    };
    use crate::testing::{MemoryCacheStore, MemoryMetafieldStore};
    use rust_decimal::Decimal;
    use std::collections::BTreeMap;

    const SHOP: &str = "demo.myshopify.com";

    fn stone_edit(product_id: i64) -> MetadataEdit {
        MetadataEdit::Stone(StoneEdit {
            product_id,
            title: Some("Round brilliant".into()),
            shape: Some(StoneShape::Round),
            carat: Some(Decimal::new(12, 1)),
            color: None,
            clarity: None,
            certificate: None,
            price: Some(500_000),
        })
    }

    fn setting_edit(product_id: i64) -> MetadataEdit {
        let mut prices = BTreeMap::new();
        prices.insert(Metal::Platinum, 149_900);
        MetadataEdit::Setting(SettingEdit {
            product_id,
            title: Some("Halo setting".into()),
            style: Some(SettingStyle::Halo),
            shapes: vec![StoneShape::Round, StoneShape::Oval],
            metal_prices: prices,
        })
    }

    #[tokio::test]
    async fn test_write_through_updates_both_stores() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();

        let outcome = apply_edit(&cache, &metafields, SHOP, &stone_edit(1))
            .await
            .unwrap();
        assert!(outcome.metafields_written);

        let gid = product_gid(1);
        let row = cache.get_stone(SHOP, &gid).await.unwrap().unwrap();
        assert_eq!(row.shape.as_deref(), Some("round"));
        assert_eq!(row.price, Some(500_000));
        assert_eq!(row.status(), BuilderStatus::Active);
        assert!(metafields.write_calls() == 1);
    }

    #[tokio::test]
    async fn test_cache_still_updated_when_authoritative_write_fails() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        metafields.fail_product(&product_gid(1));

        let outcome = apply_edit(&cache, &metafields, SHOP, &stone_edit(1))
            .await
            .unwrap();
        assert!(!outcome.metafields_written);

        let row = cache.get_stone(SHOP, &product_gid(1)).await.unwrap().unwrap();
        assert_eq!(row.carat, Some(Decimal::new(12, 1)));
    }

    #[tokio::test]
    async fn test_invalid_edit_has_zero_side_effects() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();

        let edit = MetadataEdit::Stone(StoneEdit {
            product_id: 1,
            title: None,
            shape: Some(StoneShape::Round),
            carat: Some(Decimal::new(99, 0)),
            color: None,
            clarity: None,
            certificate: None,
            price: None,
        });
        let err = apply_edit(&cache, &metafields, SHOP, &edit).await.unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "carat"));
        assert_eq!(metafields.write_calls(), 0);
        assert!(cache.get_stone(SHOP, &product_gid(1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_remarking_kind_is_mutually_exclusive() {
        let cache = MemoryCacheStore::new();
        let metafields = MemoryMetafieldStore::new();
        let gid = product_gid(7);

        apply_edit(&cache, &metafields, SHOP, &stone_edit(7)).await.unwrap();
        assert!(cache.get_stone(SHOP, &gid).await.unwrap().is_some());

        apply_edit(&cache, &metafields, SHOP, &setting_edit(7)).await.unwrap();
        assert!(cache.get_stone(SHOP, &gid).await.unwrap().is_none());
        assert!(cache.get_setting(SHOP, &gid).await.unwrap().is_some());
    }
}
