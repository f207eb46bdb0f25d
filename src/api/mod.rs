//! HTTP surface
//!
//! Admin/metadata routes take the shop domain as a query parameter; the
//! platform's session layer in front of this service is out of scope here.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::db::{Page, SettingFilter, StoneFilter};
use crate::domain::{
    BuilderStatus, EntityKind, Metal, MetadataEdit, SettingEdit, SettingRow, SettingStyle,
    StoneEdit, StoneRow, StoneShape,
};
use crate::error::AppError;
use crate::shopify::product_gid;
use crate::sync::{self, SyncDirection, UpdatedRow};
use crate::webhooks;
use crate::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhooks", post(receive_webhook))
        .route("/sync", get(run_sync))
        .route("/api/v1/metadata", post(upsert_metadata))
        .route(
            "/api/v1/metadata/:product_id",
            get(get_metadata).delete(delete_metadata),
        )
        .route("/api/v1/settings", get(list_settings))
        .route("/api/v1/stones", get(list_stones))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "healthy", "service": "gemsetter"}))
}

// =============================================================================
// Webhooks
// =============================================================================

/// Raw-body entry point: a malformed delivery must still be acknowledged, so
/// no extractor is allowed to reject before we can log it.
async fn receive_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let topic = header(&headers, "x-shopify-topic");
    let shop = header(&headers, "x-shopify-shop-domain");
    let delivery_id = header(&headers, "x-shopify-webhook-id");
    let (Some(topic), Some(shop), Some(delivery_id)) = (topic, shop, delivery_id) else {
        tracing::warn!("webhook delivery missing identifying headers");
        return StatusCode::OK;
    };

    let payload: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(topic, shop, error = %err, "unparseable webhook body");
            return StatusCode::OK;
        }
    };

    webhooks::handle(
        state.cache.as_ref(),
        state.guard.as_ref(),
        topic,
        shop,
        delivery_id,
        payload,
    )
    .await;
    StatusCode::OK
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// =============================================================================
// Reconciliation trigger
// =============================================================================

#[derive(Debug, Deserialize)]
struct SyncParams {
    shop: String,
    direction: SyncDirection,
    limit: Option<usize>,
}

async fn run_sync(
    State(state): State<AppState>,
    Query(params): Query<SyncParams>,
) -> Result<Json<sync::ReconciliationOutcome>, AppError> {
    let limit = params.limit.unwrap_or(50).min(250);
    let outcome = match params.direction {
        SyncDirection::ToExternal => {
            sync::push(
                state.cache.as_ref(),
                state.metafields.as_ref(),
                &params.shop,
                limit,
            )
            .await?
        }
        SyncDirection::FromExternal => {
            sync::pull(
                state.cache.as_ref(),
                state.metafields.as_ref(),
                &params.shop,
                limit,
            )
            .await?
        }
    };
    tracing::info!(
        shop = %params.shop,
        direction = ?params.direction,
        processed = outcome.processed,
        succeeded = outcome.succeeded,
        failed = outcome.failed,
        "reconciliation pass finished"
    );
    Ok(Json(outcome))
}

// =============================================================================
// Metadata editing
// =============================================================================

#[derive(Debug, Deserialize)]
struct ShopQuery {
    shop: String,
}

/// Flat form payload, keyed by entity kind. Structured fields arrive as a
/// comma-separated shape list and one price field per metal.
#[derive(Debug, Deserialize)]
pub struct MetadataForm {
    pub kind: String,
    pub product_id: i64,
    pub title: Option<String>,
    // setting fields
    pub style: Option<String>,
    pub shapes: Option<String>,
    pub price_14k_yellow: Option<i64>,
    pub price_14k_white: Option<i64>,
    pub price_14k_rose: Option<i64>,
    pub price_platinum: Option<i64>,
    // stone fields
    pub shape: Option<String>,
    pub carat: Option<Decimal>,
    pub color: Option<String>,
    pub clarity: Option<String>,
    pub certificate: Option<String>,
    pub price: Option<i64>,
}

impl MetadataForm {
    pub fn into_edit(self) -> Result<MetadataEdit, AppError> {
        let kind = EntityKind::parse(&self.kind)
            .ok_or_else(|| AppError::validation("kind", format!("unknown kind {:?}", self.kind)))?;
        match kind {
            EntityKind::Setting => {
                let style = match clean(self.style) {
                    Some(raw) => Some(SettingStyle::parse(&raw).ok_or_else(|| {
                        AppError::validation("style", format!("unknown style {raw:?}"))
                    })?),
                    None => None,
                };
                let mut shapes = Vec::new();
                for raw in clean(self.shapes)
                    .as_deref()
                    .unwrap_or("")
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                {
                    let shape = StoneShape::parse(raw).ok_or_else(|| {
                        AppError::validation("shapes", format!("unknown shape {raw:?}"))
                    })?;
                    if !shapes.contains(&shape) {
                        shapes.push(shape);
                    }
                }
                let mut metal_prices = BTreeMap::new();
                for (metal, price) in [
                    (Metal::YellowGold14k, self.price_14k_yellow),
                    (Metal::WhiteGold14k, self.price_14k_white),
                    (Metal::RoseGold14k, self.price_14k_rose),
                    (Metal::Platinum, self.price_platinum),
                ] {
                    if let Some(price) = price {
                        metal_prices.insert(metal, price);
                    }
                }
                Ok(MetadataEdit::Setting(SettingEdit {
                    product_id: self.product_id,
                    title: clean(self.title),
                    style,
                    shapes,
                    metal_prices,
                }))
            }
            EntityKind::Stone => {
                let shape = match clean(self.shape) {
                    Some(raw) => Some(StoneShape::parse(&raw).ok_or_else(|| {
                        AppError::validation("shape", format!("unknown shape {raw:?}"))
                    })?),
                    None => None,
                };
                let color = match clean(self.color) {
                    Some(raw) => Some(crate::domain::ColorGrade::parse(&raw).ok_or_else(
                        || AppError::validation("color", format!("unknown color grade {raw:?}")),
                    )?),
                    None => None,
                };
                let clarity = match clean(self.clarity) {
                    Some(raw) => Some(crate::domain::ClarityGrade::parse(&raw).ok_or_else(
                        || {
                            AppError::validation(
                                "clarity",
                                format!("unknown clarity grade {raw:?}"),
                            )
                        },
                    )?),
                    None => None,
                };
                Ok(MetadataEdit::Stone(StoneEdit {
                    product_id: self.product_id,
                    title: clean(self.title),
                    shape,
                    carat: self.carat,
                    color,
                    clarity,
                    certificate: clean(self.certificate),
                    price: self.price,
                }))
            }
        }
    }
}

/// Empty select/input boxes post empty strings; treat them as absent.
fn clean(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

#[derive(Debug, Serialize)]
pub struct SettingView {
    pub kind: EntityKind,
    pub status: BuilderStatus,
    #[serde(flatten)]
    pub row: SettingRow,
}

#[derive(Debug, Serialize)]
pub struct StoneView {
    pub kind: EntityKind,
    pub status: BuilderStatus,
    #[serde(flatten)]
    pub row: StoneRow,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MetadataView {
    Setting(SettingView),
    Stone(StoneView),
}

impl From<SettingRow> for MetadataView {
    fn from(row: SettingRow) -> Self {
        Self::Setting(SettingView {
            kind: EntityKind::Setting,
            status: row.status(),
            row,
        })
    }
}

impl From<StoneRow> for MetadataView {
    fn from(row: StoneRow) -> Self {
        Self::Stone(StoneView {
            kind: EntityKind::Stone,
            status: row.status(),
            row,
        })
    }
}

impl From<UpdatedRow> for MetadataView {
    fn from(row: UpdatedRow) -> Self {
        match row {
            UpdatedRow::Setting(row) => row.into(),
            UpdatedRow::Stone(row) => row.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub success: bool,
    pub metadata: MetadataView,
    pub metafields_written: bool,
}

async fn upsert_metadata(
    State(state): State<AppState>,
    Query(query): Query<ShopQuery>,
    Form(form): Form<MetadataForm>,
) -> Result<Json<UpdateResponse>, AppError> {
    let edit = form.into_edit()?;
    let outcome = sync::apply_edit(
        state.cache.as_ref(),
        state.metafields.as_ref(),
        &query.shop,
        &edit,
    )
    .await?;
    publish_event(
        &state.nats,
        "gemsetter.metadata.updated",
        serde_json::json!({
            "shop": query.shop,
            "product_id": product_gid(edit.product_id()),
            "metafields_written": outcome.metafields_written,
        }),
    )
    .await;
    Ok(Json(UpdateResponse {
        success: true,
        metadata: outcome.row.into(),
        metafields_written: outcome.metafields_written,
    }))
}

async fn get_metadata(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(query): Query<ShopQuery>,
) -> Result<Json<MetadataView>, AppError> {
    let gid = product_gid(product_id);
    if let Some(row) = state.cache.get_setting(&query.shop, &gid).await? {
        return Ok(Json(row.into()));
    }
    if let Some(row) = state.cache.get_stone(&query.shop, &gid).await? {
        return Ok(Json(row.into()));
    }
    Err(AppError::NotFound(format!("product {product_id}")))
}

#[derive(Debug, Serialize)]
struct DeleteResponse {
    success: bool,
    rows_deleted: u64,
}

async fn delete_metadata(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
    Query(query): Query<ShopQuery>,
) -> Result<Json<DeleteResponse>, AppError> {
    let gid = product_gid(product_id);
    let rows_deleted = state.cache.delete_all(&query.shop, &gid).await?;
    if rows_deleted > 0 {
        publish_event(
            &state.nats,
            "gemsetter.metadata.removed",
            serde_json::json!({"shop": query.shop, "product_id": gid}),
        )
        .await;
    }
    Ok(Json(DeleteResponse {
        success: true,
        rows_deleted,
    }))
}

// =============================================================================
// Catalog listings
// =============================================================================

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

#[derive(Debug, Deserialize)]
struct SettingListParams {
    shop: String,
    page: Option<u32>,
    per_page: Option<u32>,
    shape: Option<String>,
    metal: Option<String>,
}

async fn list_settings(
    State(state): State<AppState>,
    Query(params): Query<SettingListParams>,
) -> Result<Json<PaginatedResponse<SettingView>>, AppError> {
    let (page, limit, offset) = pagination(params.page, params.per_page);
    let filter = SettingFilter {
        shape: parse_filter(params.shape, StoneShape::parse, "shape")?,
        metal: parse_filter(params.metal, Metal::parse, "metal")?,
    };
    let rows = state
        .cache
        .list_settings(&params.shop, &filter, Page { limit, offset })
        .await?;
    let total = state.cache.count_settings(&params.shop, &filter).await?;
    let data = rows
        .into_iter()
        .map(|row| SettingView {
            kind: EntityKind::Setting,
            status: row.status(),
            row,
        })
        .collect();
    Ok(Json(PaginatedResponse { data, total, page }))
}

#[derive(Debug, Deserialize)]
struct StoneListParams {
    shop: String,
    page: Option<u32>,
    per_page: Option<u32>,
    shape: Option<String>,
    min_carat: Option<Decimal>,
    max_carat: Option<Decimal>,
    available: Option<bool>,
}

async fn list_stones(
    State(state): State<AppState>,
    Query(params): Query<StoneListParams>,
) -> Result<Json<PaginatedResponse<StoneView>>, AppError> {
    let (page, limit, offset) = pagination(params.page, params.per_page);
    let filter = StoneFilter {
        shape: parse_filter(params.shape, StoneShape::parse, "shape")?,
        min_carat: params.min_carat,
        max_carat: params.max_carat,
        available: params.available,
    };
    let rows = state
        .cache
        .list_stones(&params.shop, &filter, Page { limit, offset })
        .await?;
    let total = state.cache.count_stones(&params.shop, &filter).await?;
    let data = rows
        .into_iter()
        .map(|row| StoneView {
            kind: EntityKind::Stone,
            status: row.status(),
            row,
        })
        .collect();
    Ok(Json(PaginatedResponse { data, total, page }))
}

fn pagination(page: Option<u32>, per_page: Option<u32>) -> (u32, i64, i64) {
    let page = page.unwrap_or(1).max(1);
    let per_page = per_page.unwrap_or(20).min(100);
    (page, per_page as i64, ((page - 1) * per_page) as i64)
}

fn parse_filter<T>(
    value: Option<String>,
    parse: fn(&str) -> Option<T>,
    field: &str,
) -> Result<Option<T>, AppError> {
    match clean(value) {
        Some(raw) => parse(&raw)
            .map(Some)
            .ok_or_else(|| AppError::validation(field, format!("unknown {field} {raw:?}"))),
        None => Ok(None),
    }
}

async fn publish_event(
    nats: &Option<async_nats::Client>,
    subject: &str,
    payload: serde_json::Value,
) {
    let Some(client) = nats else { return };
    if let Err(err) = client
        .publish(subject.to_string(), payload.to_string().into_bytes().into())
        .await
    {
        tracing::warn!(subject, error = %err, "event publish failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_form() -> MetadataForm {
        MetadataForm {
            kind: "stone".into(),
            product_id: 1,
            title: None,
            style: None,
            shapes: None,
            price_14k_yellow: None,
            price_14k_white: None,
            price_14k_rose: None,
            price_platinum: None,
            shape: None,
            carat: None,
            color: None,
            clarity: None,
            certificate: None,
            price: None,
        }
    }

    #[test]
    fn test_stone_form_conversion() {
        let form = MetadataForm {
            shape: Some("round".into()),
            carat: Some(Decimal::new(12, 1)),
            color: Some("F".into()),
            price: Some(500_000),
            ..base_form()
        };
        let MetadataEdit::Stone(edit) = form.into_edit().unwrap() else {
            panic!("expected stone edit");
        };
        assert_eq!(edit.shape, Some(StoneShape::Round));
        assert_eq!(edit.price, Some(500_000));
    }

    #[test]
    fn test_setting_form_parses_shape_list_and_prices() {
        let form = MetadataForm {
            kind: "setting".into(),
            style: Some("halo".into()),
            shapes: Some("round, oval,round".into()),
            price_platinum: Some(149_900),
            ..base_form()
        };
        let MetadataEdit::Setting(edit) = form.into_edit().unwrap() else {
            panic!("expected setting edit");
        };
        assert_eq!(edit.style, Some(SettingStyle::Halo));
        assert_eq!(edit.shapes, vec![StoneShape::Round, StoneShape::Oval]);
        assert_eq!(edit.metal_prices[&Metal::Platinum], 149_900);
    }

    #[test]
    fn test_unknown_vocabulary_in_form_is_rejected() {
        let form = MetadataForm {
            shape: Some("trillion".into()),
            ..base_form()
        };
        let err = form.into_edit().unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "shape"));

        let form = MetadataForm {
            kind: "band".into(),
            ..base_form()
        };
        let err = form.into_edit().unwrap_err();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "kind"));
    }

    #[test]
    fn test_empty_strings_are_treated_as_absent() {
        let form = MetadataForm {
            shape: Some("".into()),
            color: Some("  ".into()),
            ..base_form()
        };
        let MetadataEdit::Stone(edit) = form.into_edit().unwrap() else {
            panic!("expected stone edit");
        };
        assert_eq!(edit.shape, None);
        assert_eq!(edit.color, None);
    }

    #[test]
    fn test_pagination_defaults_and_caps() {
        assert_eq!(pagination(None, None), (1, 20, 0));
        assert_eq!(pagination(Some(3), Some(500)), (3, 100, 200));
        assert_eq!(pagination(Some(0), Some(10)), (1, 10, 0));
    }
}
