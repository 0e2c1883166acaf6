use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post, put},
};
use chrono::Utc;
use db::models::offer::Offer;
use db::models::product::{
    CreateProduct, CreateProductVariant, Product, ProductFilter, ProductStatus, ProductVariant,
    UpdateProduct,
};
use serde::{Deserialize, Serialize};
use services::services::catalog::CatalogService;
use ts_rs::TS;
use utils::response::{ApiResponse, Paginated};
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};
use super::PageQuery;

#[derive(Debug, Default, Deserialize)]
pub struct ProductListQuery {
    pub category: Option<Uuid>,
    pub status: Option<ProductStatus>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Product detail with its variants and the current offer-adjusted price.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProductResponse {
    #[serde(flatten)]
    #[ts(flatten)]
    pub product: Product,
    pub variants: Vec<ProductVariant>,
    pub effective_price: i64,
}

async fn product_response(state: &AppState, product: Product) -> Result<ProductResponse, ApiError> {
    let variants = ProductVariant::find_by_product_id(&state.db.pool, product.id).await?;
    let offers = Offer::active_for_product(
        &state.db.pool,
        product.id,
        product.category_id,
        Utc::now(),
    )
    .await?;
    let effective_price = Offer::best_price(product.price, &offers);
    Ok(ProductResponse {
        product,
        variants,
        effective_price,
    })
}

pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<ResponseJson<ApiResponse<Paginated<Product>>>, ApiError> {
    let page_query = PageQuery {
        page: query.page,
        per_page: query.per_page,
    };
    let (limit, offset, page, per_page) = page_query.limits();
    let filter = ProductFilter {
        category: query.category,
        status: query.status,
        search: query.search,
    };
    let items = Product::list(&state.db.pool, &filter, limit, offset).await?;
    let total = Product::count(&state.db.pool, &filter).await?;
    Ok(ResponseJson(ApiResponse::success(Paginated {
        items,
        total,
        page,
        per_page,
    })))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<ProductResponse>>, ApiError> {
    let product = Product::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    Ok(ResponseJson(ApiResponse::success(
        product_response(&state, product).await?,
    )))
}

pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<ResponseJson<ApiResponse<ProductResponse>>, ApiError> {
    let product = Product::find_by_slug(&state.db.pool, &slug)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    Ok(ResponseJson(ApiResponse::success(
        product_response(&state, product).await?,
    )))
}

pub async fn create_product(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateProduct>,
) -> Result<ResponseJson<ApiResponse<Product>>, ApiError> {
    data.validate()?;
    let product = CatalogService::create_product(&state.db.pool, &data).await?;
    Ok(ResponseJson(ApiResponse::success(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(data): axum::Json<UpdateProduct>,
) -> Result<ResponseJson<ApiResponse<Product>>, ApiError> {
    data.validate()?;
    let product = CatalogService::update_product(&state.db.pool, id, &data).await?;
    Ok(ResponseJson(ApiResponse::success(product)))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    CatalogService::archive_product(&state.db.pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn list_variants(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Vec<ProductVariant>>>, ApiError> {
    Product::find_by_id(&state.db.pool, product_id)
        .await?
        .ok_or(ApiError::NotFound("product"))?;
    let variants = ProductVariant::find_by_product_id(&state.db.pool, product_id).await?;
    Ok(ResponseJson(ApiResponse::success(variants)))
}

pub async fn create_variant(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    axum::Json(data): axum::Json<CreateProductVariant>,
) -> Result<ResponseJson<ApiResponse<ProductVariant>>, ApiError> {
    data.validate()?;
    let variant = CatalogService::create_variant(&state.db.pool, product_id, &data).await?;
    Ok(ResponseJson(ApiResponse::success(variant)))
}

pub async fn update_variant(
    State(state): State<AppState>,
    Path((product_id, variant_id)): Path<(Uuid, Uuid)>,
    axum::Json(data): axum::Json<CreateProductVariant>,
) -> Result<ResponseJson<ApiResponse<ProductVariant>>, ApiError> {
    data.validate()?;
    let variant =
        CatalogService::update_variant(&state.db.pool, product_id, variant_id, &data).await?;
    Ok(ResponseJson(ApiResponse::success(variant)))
}

pub async fn delete_variant(
    State(state): State<AppState>,
    Path((product_id, variant_id)): Path<(Uuid, Uuid)>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    CatalogService::delete_variant(&state.db.pool, product_id, variant_id).await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/slug/{slug}", get(get_product_by_slug))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route(
            "/products/{id}/variants",
            get(list_variants).post(create_variant),
        )
        .route(
            "/products/{id}/variants/{variant_id}",
            put(update_variant).delete(delete_variant),
        )
}
