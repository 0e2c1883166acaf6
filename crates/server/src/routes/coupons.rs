use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use chrono::Utc;
use db::models::coupon::{Coupon, CouponQuote, CouponUsage, CreateCoupon, UpdateCoupon};
use serde::{Deserialize, Serialize};
use services::services::coupon::CouponService;
use ts_rs::TS;
use utils::response::{ApiResponse, Paginated};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};
use super::PageQuery;

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub customer_id: Option<Uuid>,
    /// Prospective order subtotal in minor units.
    pub subtotal: i64,
}

pub async fn list_coupons(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Paginated<Coupon>>>, ApiError> {
    let (limit, offset, page, per_page) = query.limits();
    let items = Coupon::list(&state.db.pool, limit, offset).await?;
    let total = Coupon::count(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(Paginated {
        items,
        total,
        page,
        per_page,
    })))
}

pub async fn get_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Coupon>>, ApiError> {
    let coupon = Coupon::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("coupon"))?;
    Ok(ResponseJson(ApiResponse::success(coupon)))
}

pub async fn list_coupon_usages(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<CouponUsage>>>, ApiError> {
    Coupon::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("coupon"))?;
    let usages = CouponUsage::find_by_coupon_id(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(usages)))
}

pub async fn create_coupon(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateCoupon>,
) -> Result<ResponseJson<ApiResponse<Coupon>>, ApiError> {
    data.validate()?;
    let coupon = CouponService::create(&state.db.pool, &data).await?;
    Ok(ResponseJson(ApiResponse::success(coupon)))
}

pub async fn update_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateCoupon>,
) -> Result<ResponseJson<ApiResponse<Coupon>>, ApiError> {
    data.validate()?;
    let coupon = Coupon::update(&state.db.pool, id, &data)
        .await?
        .ok_or(ApiError::NotFound("coupon"))?;
    Ok(ResponseJson(ApiResponse::success(coupon)))
}

pub async fn delete_coupon(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows = Coupon::delete(&state.db.pool, id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("coupon"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

/// Storefront pre-check before checkout. Placing the order re-validates
/// and redeems atomically.
pub async fn validate_coupon(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<ValidateCouponRequest>,
) -> Result<ResponseJson<ApiResponse<CouponQuote>>, ApiError> {
    let quote = CouponService::validate(
        &state.db.pool,
        &data.code,
        data.customer_id,
        data.subtotal,
        Utc::now(),
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(quote)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/coupons", get(list_coupons).post(create_coupon))
        .route("/coupons/validate", post(validate_coupon))
        .route(
            "/coupons/{id}",
            get(get_coupon).put(update_coupon).delete(delete_coupon),
        )
        .route("/coupons/{id}/usages", get(list_coupon_usages))
}
