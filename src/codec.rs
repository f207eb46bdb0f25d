//! Metafield value codec
//!
//! Reversible translation between typed builder metadata and the platform's
//! string/typed metafield representation. Scalar vocabulary fields are stored
//! as plain text and decode to `None` when the stored value falls outside the
//! vocabulary. Structured fields (shape lists, per-metal price maps) are
//! stored as versioned JSON envelopes in a single metafield so round-trips
//! are exact and a future schema addition cannot silently break decoding.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::{
    ClarityGrade, ColorGrade, EntityKind, Metal, SettingMeta, SettingStyle, StoneMeta, StoneShape,
};

/// Metafield namespace owned by the builder.
pub const NAMESPACE: &str = "builder";

/// Discriminator key classifying a product as setting or stone.
pub const KIND_KEY: &str = "kind";

pub const STYLE_KEY: &str = "style";
pub const SHAPES_KEY: &str = "shapes";
pub const METAL_PRICES_KEY: &str = "metal_prices";
pub const SHAPE_KEY: &str = "shape";
pub const CARAT_KEY: &str = "carat";
pub const COLOR_KEY: &str = "color";
pub const CLARITY_KEY: &str = "clarity";
pub const CERTIFICATE_KEY: &str = "certificate";

const TYPE_TEXT: &str = "single_line_text_field";
const TYPE_DECIMAL: &str = "number_decimal";
const TYPE_JSON: &str = "json";

/// Current envelope schema version for structured fields.
const SCHEMA_VERSION: u32 = 1;

/// A named value bound for the authoritative store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetafieldInput {
    pub key: String,
    pub value: String,
    pub value_type: String,
}

impl MetafieldInput {
    fn new(key: &str, value: impl Into<String>, value_type: &str) -> Self {
        Self {
            key: key.to_string(),
            value: value.into(),
            value_type: value_type.to_string(),
        }
    }
}

/// A named value read back from the authoritative store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetafieldRecord {
    pub key: String,
    pub value: String,
    pub value_type: String,
}

/// Malformed authoritative data. Carries the offending key so batch callers
/// can report a precise per-item failure.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("malformed metafield {key}: {reason}")]
pub struct DecodeError {
    pub key: String,
    pub reason: String,
}

impl DecodeError {
    fn new(key: &str, reason: impl Into<String>) -> Self {
        Self {
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct ShapesEnvelope {
    v: u32,
    shapes: Vec<String>,
}

#[derive(Serialize, Deserialize)]
struct PricesEnvelope {
    v: u32,
    prices: BTreeMap<String, i64>,
}

// =============================================================================
// Encode
// =============================================================================

pub fn encode_setting(meta: &SettingMeta) -> Vec<MetafieldInput> {
    let mut fields = vec![MetafieldInput::new(
        KIND_KEY,
        EntityKind::Setting.as_str(),
        TYPE_TEXT,
    )];
    if let Some(style) = meta.style {
        fields.push(MetafieldInput::new(STYLE_KEY, style.as_str(), TYPE_TEXT));
    }
    let shapes = ShapesEnvelope {
        v: SCHEMA_VERSION,
        shapes: meta.shapes.iter().map(|s| s.as_str().to_string()).collect(),
    };
    fields.push(MetafieldInput::new(
        SHAPES_KEY,
        encode_json(&shapes),
        TYPE_JSON,
    ));
    let prices = PricesEnvelope {
        v: SCHEMA_VERSION,
        prices: meta
            .metal_prices
            .iter()
            .map(|(metal, price)| (metal.as_str().to_string(), *price))
            .collect(),
    };
    fields.push(MetafieldInput::new(
        METAL_PRICES_KEY,
        encode_json(&prices),
        TYPE_JSON,
    ));
    fields
}

pub fn encode_stone(meta: &StoneMeta) -> Vec<MetafieldInput> {
    let mut fields = vec![MetafieldInput::new(
        KIND_KEY,
        EntityKind::Stone.as_str(),
        TYPE_TEXT,
    )];
    if let Some(shape) = meta.shape {
        fields.push(MetafieldInput::new(SHAPE_KEY, shape.as_str(), TYPE_TEXT));
    }
    if let Some(carat) = meta.carat {
        fields.push(MetafieldInput::new(
            CARAT_KEY,
            carat.to_string(),
            TYPE_DECIMAL,
        ));
    }
    if let Some(color) = meta.color {
        fields.push(MetafieldInput::new(COLOR_KEY, color.as_str(), TYPE_TEXT));
    }
    if let Some(clarity) = meta.clarity {
        fields.push(MetafieldInput::new(
            CLARITY_KEY,
            clarity.as_str(),
            TYPE_TEXT,
        ));
    }
    if let Some(certificate) = &meta.certificate {
        fields.push(MetafieldInput::new(
            CERTIFICATE_KEY,
            certificate.clone(),
            TYPE_TEXT,
        ));
    }
    fields
}

fn encode_json<T: Serialize>(value: &T) -> String {
    // Envelope structs contain only maps, vectors, and integers; this cannot
    // fail for them.
    serde_json::to_string(value).unwrap_or_default()
}

// =============================================================================
// Decode
// =============================================================================

/// Read the discriminator from a metafield set. `None` when absent or outside
/// the vocabulary.
pub fn classify(fields: &[MetafieldRecord]) -> Option<EntityKind> {
    lookup(fields, KIND_KEY).and_then(EntityKind::parse)
}

pub fn decode_setting(fields: &[MetafieldRecord]) -> Result<SettingMeta, DecodeError> {
    let style = lookup(fields, STYLE_KEY).and_then(SettingStyle::parse);

    let shapes = match lookup(fields, SHAPES_KEY) {
        Some(raw) => {
            let envelope: ShapesEnvelope = serde_json::from_str(raw)
                .map_err(|e| DecodeError::new(SHAPES_KEY, e.to_string()))?;
            envelope
                .shapes
                .iter()
                .filter_map(|s| StoneShape::parse(s))
                .collect()
        }
        None => Vec::new(),
    };

    let metal_prices = match lookup(fields, METAL_PRICES_KEY) {
        Some(raw) => {
            let envelope: PricesEnvelope = serde_json::from_str(raw)
                .map_err(|e| DecodeError::new(METAL_PRICES_KEY, e.to_string()))?;
            envelope
                .prices
                .iter()
                .filter_map(|(k, v)| Some((Metal::parse(k)?, *v)))
                .collect()
        }
        None => BTreeMap::new(),
    };

    Ok(SettingMeta {
        style,
        shapes,
        metal_prices,
    })
}

pub fn decode_stone(fields: &[MetafieldRecord]) -> Result<StoneMeta, DecodeError> {
    let carat = match lookup(fields, CARAT_KEY) {
        Some(raw) => Some(
            raw.parse()
                .map_err(|_| DecodeError::new(CARAT_KEY, format!("not a decimal: {raw:?}")))?,
        ),
        None => None,
    };

    Ok(StoneMeta {
        shape: lookup(fields, SHAPE_KEY).and_then(StoneShape::parse),
        carat,
        color: lookup(fields, COLOR_KEY).and_then(ColorGrade::parse),
        clarity: lookup(fields, CLARITY_KEY).and_then(ClarityGrade::parse),
        certificate: lookup(fields, CERTIFICATE_KEY).map(str::to_string),
    })
}

fn lookup<'a>(fields: &'a [MetafieldRecord], key: &str) -> Option<&'a str> {
    fields
        .iter()
        .find(|f| f.key == key)
        .map(|f| f.value.as_str())
}

/// Writes echo back as reads for round-trip purposes.
pub fn inputs_to_records(inputs: &[MetafieldInput]) -> Vec<MetafieldRecord> {
    inputs
        .iter()
        .map(|f| MetafieldRecord {
            key: f.key.clone(),
            value: f.value.clone(),
            value_type: f.value_type.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn record(key: &str, value: &str) -> MetafieldRecord {
        MetafieldRecord {
            key: key.into(),
            value: value.into(),
            value_type: TYPE_TEXT.into(),
        }
    }

    #[test]
    fn test_setting_round_trip() {
        let mut prices = BTreeMap::new();
        prices.insert(Metal::YellowGold14k, 89_900);
        prices.insert(Metal::Platinum, 149_900);
        let meta = SettingMeta {
            style: Some(SettingStyle::ThreeStone),
            shapes: vec![StoneShape::Round, StoneShape::Oval, StoneShape::Pear],
            metal_prices: prices,
        };
        let records = inputs_to_records(&encode_setting(&meta));
        assert_eq!(classify(&records), Some(EntityKind::Setting));
        assert_eq!(decode_setting(&records).unwrap(), meta);
    }

    #[test]
    fn test_empty_setting_round_trip() {
        let meta = SettingMeta::default();
        let records = inputs_to_records(&encode_setting(&meta));
        assert_eq!(decode_setting(&records).unwrap(), meta);
    }

    #[test]
    fn test_stone_round_trip() {
        let meta = StoneMeta {
            shape: Some(StoneShape::Cushion),
            carat: Some(Decimal::new(127, 2)),
            color: Some(ColorGrade::F),
            clarity: Some(ClarityGrade::Vs1),
            certificate: Some("GIA 2211479035".into()),
        };
        let records = inputs_to_records(&encode_stone(&meta));
        assert_eq!(classify(&records), Some(EntityKind::Stone));
        assert_eq!(decode_stone(&records).unwrap(), meta);
    }

    #[test]
    fn test_sparse_stone_round_trip() {
        let meta = StoneMeta {
            shape: None,
            carat: Some(Decimal::new(5, 1)),
            color: None,
            clarity: None,
            certificate: None,
        };
        let records = inputs_to_records(&encode_stone(&meta));
        assert_eq!(decode_stone(&records).unwrap(), meta);
    }

    #[test]
    fn test_unknown_vocabulary_decodes_to_none() {
        let records = vec![
            record(KIND_KEY, "stone"),
            record(SHAPE_KEY, "trillion"),
            record(COLOR_KEY, "Z"),
        ];
        let meta = decode_stone(&records).unwrap();
        assert_eq!(meta.shape, None);
        assert_eq!(meta.color, None);
    }

    #[test]
    fn test_unknown_kind_classifies_as_none() {
        let records = vec![record(KIND_KEY, "band")];
        assert_eq!(classify(&records), None);
        assert_eq!(classify(&[]), None);
    }

    #[test]
    fn test_malformed_envelope_reports_offending_key() {
        let records = vec![record(SHAPES_KEY, "not json")];
        let err = decode_setting(&records).unwrap_err();
        assert_eq!(err.key, SHAPES_KEY);

        let records = vec![record(METAL_PRICES_KEY, "{\"prices\":{}}")];
        let err = decode_setting(&records).unwrap_err();
        assert_eq!(err.key, METAL_PRICES_KEY);
    }

    #[test]
    fn test_malformed_carat_reports_offending_key() {
        let records = vec![record(CARAT_KEY, "one point two")];
        let err = decode_stone(&records).unwrap_err();
        assert_eq!(err.key, CARAT_KEY);
    }

    #[test]
    fn test_future_envelope_fields_are_tolerated() {
        let records = vec![record(
            SHAPES_KEY,
            "{\"v\":1,\"shapes\":[\"round\"],\"labels\":{\"round\":\"Round\"}}",
        )];
        let meta = decode_setting(&records).unwrap();
        assert_eq!(meta.shapes, vec![StoneShape::Round]);
    }
}
