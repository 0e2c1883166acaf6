use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::order::{
    CreateOrder, Order, OrderFilter, OrderStatus, OrderWithItems, PaymentStatus,
};
use serde::{Deserialize, Serialize};
use services::services::order::OrderService;
use ts_rs::TS;
use utils::response::{ApiResponse, Paginated};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};

#[derive(Debug, Default, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    pub customer: Option<Uuid>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdatePaymentStatusRequest {
    pub payment_status: PaymentStatus,
}

pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<ResponseJson<ApiResponse<Paginated<Order>>>, ApiError> {
    let page_query = super::PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (limit, offset, page, per_page) = page_query.limits();
    let filter = OrderFilter {
        status: query.status,
        customer: query.customer,
    };
    let items = Order::list(&state.db.pool, &filter, limit, offset).await?;
    let total = Order::count(&state.db.pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(Paginated {
        items,
        total,
        page,
        per_page,
    })))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<OrderWithItems>>, ApiError> {
    let order = OrderService::get(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub async fn list_order_items(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<db::models::order::OrderItem>>>, ApiError> {
    let order = OrderService::get(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(order.items)))
}

pub async fn create_order(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateOrder>,
) -> Result<ResponseJson<ApiResponse<OrderWithItems>>, ApiError> {
    data.validate()?;
    let order = OrderService::create(&state.db.pool, &data).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateOrderStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Order>>, ApiError> {
    let order = OrderService::transition(&state.db.pool, id, data.status).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub async fn update_payment_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdatePaymentStatusRequest>,
) -> Result<ResponseJson<ApiResponse<Order>>, ApiError> {
    let order = OrderService::set_payment(&state.db.pool, id, data.payment_status).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Order>>, ApiError> {
    let order = OrderService::cancel(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(order)))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/{id}", get(get_order))
        .route("/orders/{id}/items", get(list_order_items))
        .route("/orders/{id}/status", post(update_order_status))
        .route("/orders/{id}/payment", post(update_payment_status))
        .route("/orders/{id}/cancel", post(cancel_order))
}
