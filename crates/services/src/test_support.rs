use db::models::customer::{CreateCustomer, Customer};
use db::models::order::{NewOrder, Order};
use db::models::product::{CreateProduct, Product};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

/// Fresh in-memory database with the full schema applied. A single
/// connection keeps every query on the same memory instance.
pub async fn memory_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    db::MIGRATOR.run(&pool).await.expect("run migrations");
    pool
}

pub async fn seed_customer(pool: &SqlitePool) -> Customer {
    Customer::create(
        pool,
        Uuid::new_v4(),
        &CreateCustomer {
            email: format!("{}@example.com", Uuid::new_v4().simple()),
            first_name: "Test".to_string(),
            last_name: "Customer".to_string(),
            phone: None,
        },
    )
    .await
    .expect("seed customer")
}

pub async fn seed_product(pool: &SqlitePool, name: &str, price: i64) -> Product {
    let id = Uuid::new_v4();
    Product::create(
        pool,
        id,
        &CreateProduct {
            name: name.to_string(),
            sku: None,
            description: None,
            price,
            compare_at_price: None,
            currency: None,
            category_id: None,
            status: None,
        },
        &format!("SKU-{}", id.simple()),
        &format!("{}-{}", utils::text::slugify(name), id.simple()),
    )
    .await
    .expect("seed product")
}

pub async fn seed_order(pool: &SqlitePool, customer_id: Option<Uuid>, subtotal: i64) -> Order {
    let id = Uuid::new_v4();
    Order::create(
        pool,
        id,
        &NewOrder {
            order_number: format!("ORD-{}", id.simple()),
            customer_id,
            email: "buyer@example.com".to_string(),
            subtotal,
            discount_total: 0,
            shipping_fee: 0,
            tax_total: 0,
            total: subtotal,
            currency: "USD".to_string(),
            coupon_id: None,
            shipping_address: serde_json::json!({}),
            billing_address: serde_json::json!({}),
        },
    )
    .await
    .expect("seed order")
}
