//! Builder metadata: typed domain values, cache rows, and operator edits

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::domain::vocabulary::{ClarityGrade, ColorGrade, Metal, SettingStyle, StoneShape};

/// Computed on every read, never stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuilderStatus {
    Active,
    Incomplete,
}

// =============================================================================
// Typed domain values (what the codec encodes and decodes)
// =============================================================================

/// Domain-owned fields of a setting product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingMeta {
    pub style: Option<SettingStyle>,
    /// Stone shapes this setting accepts, in display order.
    pub shapes: Vec<StoneShape>,
    /// Price in minor units per metal choice.
    pub metal_prices: BTreeMap<Metal, i64>,
}

/// Domain-owned fields of a stone product.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StoneMeta {
    pub shape: Option<StoneShape>,
    pub carat: Option<Decimal>,
    pub color: Option<ColorGrade>,
    pub clarity: Option<ClarityGrade>,
    pub certificate: Option<String>,
}

// =============================================================================
// Cache rows
// =============================================================================

/// One setting product in the read-optimized catalog cache.
///
/// `product_id` is the platform global identifier (gid) string.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct SettingRow {
    pub id: Uuid,
    pub shop: String,
    pub product_id: String,
    pub title: Option<String>,
    pub style: Option<String>,
    pub shapes: Vec<String>,
    pub metal_prices: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SettingRow {
    /// Active iff style is set, the shape list is non-empty, and at least one
    /// metal price is positive.
    pub fn status(&self) -> BuilderStatus {
        let priced = self
            .metal_prices
            .as_object()
            .is_some_and(|map| map.values().any(|v| v.as_i64().is_some_and(|p| p > 0)));
        if self.style.is_some() && !self.shapes.is_empty() && priced {
            BuilderStatus::Active
        } else {
            BuilderStatus::Incomplete
        }
    }

    /// Rebuild the typed domain value from stored columns. Values outside the
    /// current vocabulary are dropped, not surfaced as errors.
    pub fn meta(&self) -> SettingMeta {
        SettingMeta {
            style: self.style.as_deref().and_then(SettingStyle::parse),
            shapes: self
                .shapes
                .iter()
                .filter_map(|s| StoneShape::parse(s))
                .collect(),
            metal_prices: self
                .metal_prices
                .as_object()
                .map(|map| {
                    map.iter()
                        .filter_map(|(k, v)| Some((Metal::parse(k)?, v.as_i64()?)))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }
}

/// One stone product in the read-optimized catalog cache.
///
/// `price`, `image_url`, and `available` are platform-owned: webhooks and
/// product data write them, the metafield sync never does.
#[derive(Clone, Debug, Serialize, Deserialize, sqlx::FromRow)]
pub struct StoneRow {
    pub id: Uuid,
    pub shop: String,
    pub product_id: String,
    pub title: Option<String>,
    pub shape: Option<String>,
    pub carat: Option<Decimal>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub certificate: Option<String>,
    pub price: Option<i64>,
    pub image_url: Option<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoneRow {
    /// Active iff shape is set, carat is positive, and a positive price is
    /// known.
    pub fn status(&self) -> BuilderStatus {
        let has_carat = self.carat.is_some_and(|c| c > Decimal::ZERO);
        let has_price = self.price.is_some_and(|p| p > 0);
        if self.shape.is_some() && has_carat && has_price {
            BuilderStatus::Active
        } else {
            BuilderStatus::Incomplete
        }
    }

    pub fn meta(&self) -> StoneMeta {
        StoneMeta {
            shape: self.shape.as_deref().and_then(StoneShape::parse),
            carat: self.carat,
            color: self.color.as_deref().and_then(ColorGrade::parse),
            clarity: self.clarity.as_deref().and_then(ClarityGrade::parse),
            certificate: self.certificate.clone(),
        }
    }
}

// =============================================================================
// Operator edits
// =============================================================================

/// A validated operator edit, discriminated by entity kind.
#[derive(Clone, Debug)]
pub enum MetadataEdit {
    Setting(SettingEdit),
    Stone(StoneEdit),
}

impl MetadataEdit {
    pub fn product_id(&self) -> i64 {
        match self {
            Self::Setting(e) => e.product_id,
            Self::Stone(e) => e.product_id,
        }
    }

    pub fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::Setting(e) => Validate::validate(e),
            Self::Stone(e) => Validate::validate(e),
        }
    }
}

#[derive(Clone, Debug, Validate)]
pub struct SettingEdit {
    pub product_id: i64,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub style: Option<SettingStyle>,
    pub shapes: Vec<StoneShape>,
    #[validate(custom = "validate_metal_prices")]
    pub metal_prices: BTreeMap<Metal, i64>,
}

#[derive(Clone, Debug, Validate)]
pub struct StoneEdit {
    pub product_id: i64,
    #[validate(length(max = 255))]
    pub title: Option<String>,
    pub shape: Option<StoneShape>,
    #[validate(custom = "validate_carat")]
    pub carat: Option<Decimal>,
    pub color: Option<ColorGrade>,
    pub clarity: Option<ClarityGrade>,
    #[validate(length(max = 64))]
    pub certificate: Option<String>,
    /// Platform-owned; stored in the cache only, never written to metafields.
    #[validate(range(min = 0))]
    pub price: Option<i64>,
}

impl SettingEdit {
    pub fn meta(&self) -> SettingMeta {
        SettingMeta {
            style: self.style,
            shapes: self.shapes.clone(),
            metal_prices: self.metal_prices.clone(),
        }
    }
}

impl StoneEdit {
    pub fn meta(&self) -> StoneMeta {
        StoneMeta {
            shape: self.shape,
            carat: self.carat,
            color: self.color,
            clarity: self.clarity,
            certificate: self.certificate.clone(),
        }
    }
}

fn validate_metal_prices(prices: &BTreeMap<Metal, i64>) -> Result<(), ValidationError> {
    if prices.values().any(|p| *p < 0) {
        let mut err = ValidationError::new("range");
        err.message = Some("metal prices must not be negative".into());
        return Err(err);
    }
    Ok(())
}

fn validate_carat(carat: &Decimal) -> Result<(), ValidationError> {
    let min = Decimal::new(1, 2); // 0.01
    let max = Decimal::new(50, 0);
    if *carat < min || *carat > max {
        let mut err = ValidationError::new("range");
        err.message = Some("carat must be between 0.01 and 50".into());
        return Err(err);
    }
    Ok(())
}
