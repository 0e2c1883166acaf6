use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use services::services::{
    AddressError, CartError, CatalogError, CouponError, LoyaltyError, OrderError,
};
use utils::response::ApiResponse;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Address(#[from] AddressError),
    #[error(transparent)]
    Cart(#[from] CartError),
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    Order(#[from] OrderError),
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
    #[error(transparent)]
    Validation(#[from] validator::ValidationErrors),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Database(e) => sqlx_status(e),
            ApiError::Catalog(e) => match e {
                CatalogError::Database(e) => sqlx_status(e),
                CatalogError::ProductNotFound
                | CatalogError::CategoryNotFound
                | CatalogError::VariantNotFound => StatusCode::NOT_FOUND,
                CatalogError::CategoryInUse(_) => StatusCode::CONFLICT,
            },
            ApiError::Address(e) => match e {
                AddressError::Database(e) => sqlx_status(e),
                AddressError::CustomerNotFound | AddressError::AddressNotFound => {
                    StatusCode::NOT_FOUND
                }
            },
            ApiError::Cart(e) => match e {
                CartError::Database(e) => sqlx_status(e),
                CartError::CartNotFound
                | CartError::ItemNotFound
                | CartError::CustomerNotFound => StatusCode::NOT_FOUND,
                CartError::ProductUnavailable | CartError::VariantMismatch => {
                    StatusCode::BAD_REQUEST
                }
            },
            ApiError::Coupon(e) => coupon_status(e),
            ApiError::Order(e) => match e {
                OrderError::Database(e) => sqlx_status(e),
                OrderError::Coupon(e) => coupon_status(e),
                OrderError::Loyalty(e) => loyalty_status(e),
                OrderError::NotFound | OrderError::CartNotFound => StatusCode::NOT_FOUND,
                OrderError::EmptyOrder
                | OrderError::ConflictingSource
                | OrderError::ProductUnavailable(_)
                | OrderError::VariantMismatch
                | OrderError::CurrencyMismatch
                | OrderError::InvalidQuantity => StatusCode::BAD_REQUEST,
                OrderError::InvalidTransition { .. }
                | OrderError::InvalidPaymentTransition { .. }
                | OrderError::NotCancellable(_)
                | OrderError::PaymentRequired => StatusCode::CONFLICT,
            },
            ApiError::Loyalty(e) => loyalty_status(e),
            ApiError::Validation(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

fn sqlx_status(e: &sqlx::Error) -> StatusCode {
    match e {
        sqlx::Error::RowNotFound => StatusCode::NOT_FOUND,
        sqlx::Error::Database(db) if db.is_unique_violation() => StatusCode::CONFLICT,
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn coupon_status(e: &CouponError) -> StatusCode {
    match e {
        CouponError::Database(e) => sqlx_status(e),
        CouponError::NotFound => StatusCode::NOT_FOUND,
        CouponError::CodeTaken => StatusCode::CONFLICT,
        CouponError::Disabled
        | CouponError::NotStarted
        | CouponError::Expired
        | CouponError::MinOrderNotMet { .. }
        | CouponError::Exhausted
        | CouponError::CustomerLimitReached => StatusCode::BAD_REQUEST,
    }
}

fn loyalty_status(e: &LoyaltyError) -> StatusCode {
    match e {
        LoyaltyError::Database(e) => sqlx_status(e),
        LoyaltyError::CustomerNotFound
        | LoyaltyError::AccountNotFound
        | LoyaltyError::TierNotFound => StatusCode::NOT_FOUND,
        LoyaltyError::TierInUse(_) => StatusCode::CONFLICT,
        LoyaltyError::InvalidPoints | LoyaltyError::InsufficientPoints { .. } => {
            StatusCode::BAD_REQUEST
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {self}");
        }
        let body = match &self {
            ApiError::Validation(errors) => match serde_json::to_value(errors) {
                Ok(details) => {
                    ApiResponse::<()>::error_with_data("validation failed", details)
                }
                Err(_) => ApiResponse::<()>::error("validation failed"),
            },
            other => ApiResponse::<()>::error(other.to_string()),
        };
        (status, Json(body)).into_response()
    }
}
