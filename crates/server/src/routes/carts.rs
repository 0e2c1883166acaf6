use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::cart::{AddCartItem, CartView};
use serde::{Deserialize, Serialize};
use services::services::cart::CartService;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateCartItemRequest {
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ClaimCartRequest {
    pub customer_id: Uuid,
}

/// Fetching a cart creates it, so storefront sessions never 404 on a
/// fresh token.
pub async fn get_cart(
    State(state): State<AppState>,
    Path(session_token): Path<String>,
) -> Result<ResponseJson<ApiResponse<CartView>>, ApiError> {
    let view = CartService::view(&state.db.pool, &session_token).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn add_item(
    State(state): State<AppState>,
    Path(session_token): Path<String>,
    axum::Json(data): axum::Json<AddCartItem>,
) -> Result<ResponseJson<ApiResponse<CartView>>, ApiError> {
    data.validate()?;
    let view = CartService::add_item(&state.db.pool, &session_token, &data).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn update_item(
    State(state): State<AppState>,
    Path((session_token, item_id)): Path<(String, Uuid)>,
    axum::Json(data): axum::Json<UpdateCartItemRequest>,
) -> Result<ResponseJson<ApiResponse<CartView>>, ApiError> {
    if data.quantity < 0 {
        return Err(ApiError::BadRequest(
            "quantity must not be negative".to_string(),
        ));
    }
    let view =
        CartService::update_item(&state.db.pool, &session_token, item_id, data.quantity).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn remove_item(
    State(state): State<AppState>,
    Path((session_token, item_id)): Path<(String, Uuid)>,
) -> Result<ResponseJson<ApiResponse<CartView>>, ApiError> {
    let view = CartService::remove_item(&state.db.pool, &session_token, item_id).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn clear_cart(
    State(state): State<AppState>,
    Path(session_token): Path<String>,
) -> Result<ResponseJson<ApiResponse<CartView>>, ApiError> {
    let view = CartService::clear(&state.db.pool, &session_token).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub async fn claim_cart(
    State(state): State<AppState>,
    Path(session_token): Path<String>,
    axum::Json(data): axum::Json<ClaimCartRequest>,
) -> Result<ResponseJson<ApiResponse<CartView>>, ApiError> {
    let view = CartService::claim(&state.db.pool, &session_token, data.customer_id).await?;
    Ok(ResponseJson(ApiResponse::success(view)))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/carts/{session_token}",
        Router::new()
            .route("/", get(get_cart).delete(clear_cart))
            .route("/items", post(add_item))
            .route("/items/{item_id}", put(update_item).delete(remove_item))
            .route("/claim", post(claim_cart)),
    )
}
