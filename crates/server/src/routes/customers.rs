use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::customer::{CreateCustomer, Customer, UpdateCustomer};
use utils::response::{ApiResponse, Paginated};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};
use super::PageQuery;

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<ResponseJson<ApiResponse<Paginated<Customer>>>, ApiError> {
    let (limit, offset, page, per_page) = query.limits();
    let items = Customer::list(&state.db.pool, limit, offset).await?;
    let total = Customer::count(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(Paginated {
        items,
        total,
        page,
        per_page,
    })))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    let customer = Customer::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

pub async fn create_customer(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    data.validate()?;
    if Customer::find_by_email(&state.db.pool, &data.email.trim().to_ascii_lowercase())
        .await?
        .is_some()
    {
        return Err(ApiError::Conflict("email already registered".to_string()));
    }
    let customer = Customer::create(&state.db.pool, Uuid::new_v4(), &data).await?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateCustomer>,
) -> Result<ResponseJson<ApiResponse<Customer>>, ApiError> {
    data.validate()?;
    let customer = Customer::update(&state.db.pool, id, &data)
        .await?
        .ok_or(ApiError::NotFound("customer"))?;
    Ok(ResponseJson(ApiResponse::success(customer)))
}

/// Soft delete; the customer keeps their order history.
pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows = Customer::disable(&state.db.pool, id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("customer"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/customers", get(list_customers).post(create_customer))
        .route(
            "/customers/{id}",
            get(get_customer)
                .put(update_customer)
                .delete(delete_customer),
        )
}
