use anyhow::Context;
use db::DBService;
use server::{AppState, app};
use services::services::ExpirySweeper;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    utils::log::init("info,sqlx=warn");

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://storefront.db".to_string());
    let db = DBService::new(&database_url)
        .await
        .context("failed to open database")?;

    ExpirySweeper::new(db.pool.clone()).spawn();

    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port = std::env::var("PORT").unwrap_or_else(|_| "3001".to_string());
    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("listening on {addr}");

    axum::serve(listener, app(AppState::new(db)))
        .await
        .context("server exited")?;
    Ok(())
}
