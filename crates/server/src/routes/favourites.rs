use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::customer::Customer;
use db::models::favourite::{CreateFavourite, Favourite};
use db::models::product::Product;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

pub async fn list_favourites(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Favourite>>>, ApiError> {
    Customer::find_by_id(&state.db.pool, customer_id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    let favourites = Favourite::find_by_customer_id(&state.db.pool, customer_id).await?;
    Ok(ResponseJson(ApiResponse::success(favourites)))
}

/// Idempotent; favouriting the same product twice returns the existing
/// row.
pub async fn add_favourite(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    axum::Json(data): axum::Json<CreateFavourite>,
) -> Result<ResponseJson<ApiResponse<Favourite>>, ApiError> {
    Customer::find_by_id(&state.db.pool, customer_id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    Product::find_by_id(&state.db.pool, data.product_id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    let favourite =
        Favourite::create(&state.db.pool, Uuid::new_v4(), customer_id, data.product_id).await?;
    Ok(ResponseJson(ApiResponse::success(favourite)))
}

pub async fn remove_favourite(
    State(state): State<AppState>,
    Path((customer_id, product_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows = Favourite::delete(&state.db.pool, customer_id, product_id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("favourite"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/customers/{customer_id}/favourites",
        Router::new()
            .route("/", get(list_favourites).post(add_favourite))
            .route("/{product_id}", axum::routing::delete(remove_favourite)),
    )
}
