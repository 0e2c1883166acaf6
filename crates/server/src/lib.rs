use axum::Router;
use db::DBService;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod error;
pub mod routes;

#[derive(Clone)]
pub struct AppState {
    pub db: DBService,
}

impl AppState {
    pub fn new(db: DBService) -> Self {
        Self { db }
    }
}

pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::health::router())
        .merge(routes::products::router())
        .merge(routes::categories::router())
        .merge(routes::customers::router())
        .merge(routes::addresses::router())
        .merge(routes::carts::router())
        .merge(routes::orders::router())
        .merge(routes::coupons::router())
        .merge(routes::offers::router())
        .merge(routes::favourites::router())
        .merge(routes::loyalty::router());
    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
