use axum::{
    Router,
    extract::{Path, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::offer::{CreateOffer, Offer, OfferStatus};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;
use validator::Validate;

use crate::{AppState, error::ApiError};

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct UpdateOfferRequest {
    #[serde(flatten)]
    #[ts(flatten)]
    pub data: CreateOffer,
    pub status: Option<OfferStatus>,
}

fn check_offer(data: &CreateOffer) -> Result<(), ApiError> {
    if data.product_id.is_some() == data.category_id.is_some() {
        return Err(ApiError::BadRequest(
            "an offer targets exactly one product or one category".to_string(),
        ));
    }
    if let Some(ends_at) = data.ends_at {
        if ends_at <= data.starts_at {
            return Err(ApiError::BadRequest(
                "ends_at must be after starts_at".to_string(),
            ));
        }
    }
    Ok(())
}

pub async fn list_offers(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<Vec<Offer>>>, ApiError> {
    let offers = Offer::find_all(&state.db.pool).await?;
    Ok(ResponseJson(ApiResponse::success(offers)))
}

pub async fn get_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<Offer>>, ApiError> {
    let offer = Offer::find_by_id(&state.db.pool, id)
        .await?
        .ok_or(ApiError::NotFound("offer"))?;
    Ok(ResponseJson(ApiResponse::success(offer)))
}

pub async fn create_offer(
    State(state): State<AppState>,
    axum::Json(data): axum::Json<CreateOffer>,
) -> Result<ResponseJson<ApiResponse<Offer>>, ApiError> {
    data.validate()?;
    check_offer(&data)?;
    let offer = Offer::create(&state.db.pool, Uuid::new_v4(), &data).await?;
    Ok(ResponseJson(ApiResponse::success(offer)))
}

pub async fn update_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(request): axum::Json<UpdateOfferRequest>,
) -> Result<ResponseJson<ApiResponse<Offer>>, ApiError> {
    request.data.validate()?;
    check_offer(&request.data)?;
    let offer = Offer::update(&state.db.pool, id, &request.data, request.status)
        .await?
        .ok_or(ApiError::NotFound("offer"))?;
    Ok(ResponseJson(ApiResponse::success(offer)))
}

pub async fn delete_offer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let rows = Offer::delete(&state.db.pool, id).await?;
    if rows == 0 {
        return Err(ApiError::NotFound("offer"));
    }
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/offers", get(list_offers).post(create_offer))
        .route(
            "/offers/{id}",
            get(get_offer).put(update_offer).delete(delete_offer),
        )
}
