use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::category::{Category, CreateCategory, UpdateCategory};
use serde::{Deserialize, Serialize};
use services::services::catalog::CatalogService;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CategoryResponse {
    #[serde(flatten)]
    #[ts(flatten)]
    pub category: Category,
    pub children: Vec<Category>,
    pub product_count: i64,
}

pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Category>>>, ApiError> {
    let categories = Category::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(categories)))
}

pub async fn get_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<CategoryResponse>>, ApiError> {
    let category = Category::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("category"))?;
    let children = Category::find_children(&state.db.pool, id).await?;
    let product_count = Category::count_products(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(CategoryResponse {
        category,
        children,
        product_count,
    })))
}

pub async fn create_category(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    data.validate()?;
    let category = CatalogService::create_category(&state.db.pool, &data).await?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn update_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateCategory>,
) -> Result<ResponseJson<ApiResponse<Category>>, ApiError> {
    data.validate()?;
    let category = CatalogService::update_category(&state.db.pool, id, &data).await?;
    Ok(ResponseJson(ApiResponse::success(category)))
}

pub async fn delete_category(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    CatalogService::delete_category(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/categories", get(list_categories).post(create_category))
        .route(
            "/categories/{id}",
            get(get_category)
                .put(update_category)
                .delete(delete_category),
        )
}
