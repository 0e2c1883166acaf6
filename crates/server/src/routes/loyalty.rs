use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::loyalty::{CreateLoyaltyTier, LoyaltyAccount, LoyaltySummary, LoyaltyTier};
use serde::{Deserialize, Serialize};
use services::services::loyalty::LoyaltyService;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct RedeemPointsRequest {
    pub points: i64,
    pub note: Option<String>,
}

pub async fn get_loyalty_summary(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<LoyaltySummary>>, ApiError> {
    let summary = LoyaltyService::summary(&state.db.pool, customer_id).await?;
    Ok(ResponseJson(ApiResponse::success(summary)))
}

pub async fn redeem_points(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    axum::Json(data): axum::Json<RedeemPointsRequest>,
) -> Result<ResponseJson<ApiResponse<LoyaltyAccount>>, ApiError> {
    let account =
        LoyaltyService::redeem(&state.db.pool, customer_id, data.points, data.note).await?;
    Ok(ResponseJson(ApiResponse::success(account)))
}

pub async fn list_tiers(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<LoyaltyTier>>>, ApiError> {
    let tiers = LoyaltyTier::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(tiers)))
}

pub async fn create_tier(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateLoyaltyTier>,
) -> Result<ResponseJson<ApiResponse<LoyaltyTier>>, ApiError> {
    data.validate()?;
    let tier = LoyaltyService::create_tier(&state.db.pool, &data).await?;
    Ok(ResponseJson(ApiResponse::success(tier)))
}

pub async fn update_tier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(data): axum::Json<CreateLoyaltyTier>,
) -> Result<ResponseJson<ApiResponse<LoyaltyTier>>, ApiError> {
    data.validate()?;
    let tier = LoyaltyService::update_tier(&state.db.pool, id, &data).await?;
    Ok(ResponseJson(ApiResponse::success(tier)))
}

pub async fn delete_tier(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    LoyaltyService::delete_tier(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers/{customer_id}/loyalty", get(get_loyalty_summary))
        .route("/customers/{customer_id}/loyalty/redeem", post(redeem_points))
        .route("/loyalty/tiers", get(list_tiers).post(create_tier))
        .route("/loyalty/tiers/{id}", put(update_tier).delete(delete_tier))
}
