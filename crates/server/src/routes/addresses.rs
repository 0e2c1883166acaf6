use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use db::models::address::{Address, CreateAddress};
use services::services::address::AddressService;
use utils::response::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};

pub async fn list_addresses(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<Address>>>, ApiError> {
    let addresses = AddressService::list(&state.db.pool, customer_id).await?;
    Ok(ResponseJson(ApiResponse::success(addresses)))
}

pub async fn create_address(
    State(state): State<AppState>,
    Path(customer_id): Path<Uuid>,
    axum::Json(data): axum::Json<CreateAddress>,
) -> Result<ResponseJson<ApiResponse<Address>>, ApiError> {
    data.validate()?;
    let address = AddressService::create(&state.db.pool, customer_id, &data).await?;
    Ok(ResponseJson(ApiResponse::success(address)))
}

pub async fn update_address(
    State(state): State<AppState>,
    Path((customer_id, address_id)): Path<(Uuid, Uuid)>,
    axum::Json(data): axum::Json<CreateAddress>,
) -> Result<ResponseJson<ApiResponse<Address>>, ApiError> {
    data.validate()?;
    let address = AddressService::update(&state.db.pool, customer_id, address_id, &data).await?;
    Ok(ResponseJson(ApiResponse::success(address)))
}

pub async fn set_default_address(
    State(state): State<AppState>,
    Path((customer_id, address_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<Address>>, ApiError> {
    let address = AddressService::set_default(&state.db.pool, customer_id, address_id).await?;
    Ok(ResponseJson(ApiResponse::success(address)))
}

pub async fn delete_address(
    State(state): State<AppState>,
    Path((customer_id, address_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    AddressService::delete(&state.db.pool, customer_id, address_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new().nest(
        "/customers/{customer_id}/addresses",
        Router::new()
            .route("/", get(list_addresses).post(create_address))
            .route("/{address_id}", put(update_address).delete(delete_address))
            .route("/{address_id}/default", post(set_default_address)),
    )
}
