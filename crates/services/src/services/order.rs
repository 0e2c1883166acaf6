use chrono::Utc;
use db::models::cart::{Cart, CartItem, CartStatus};
use db::models::coupon::{Coupon, CouponUsage};
use db::models::offer::Offer;
use db::models::order::{
    CreateOrder, CreateOrderItem, NewOrder, Order, OrderItem, OrderStatus, OrderWithItems,
    PaymentStatus,
};
use db::models::product::{Product, ProductStatus, ProductVariant};
use rand::Rng;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use super::coupon::{CouponError, CouponService};
use super::loyalty::{LoyaltyError, LoyaltyService};

#[derive(Debug, Error)]
pub enum OrderError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Coupon(#[from] CouponError),
    #[error(transparent)]
    Loyalty(#[from] LoyaltyError),
    #[error("order not found")]
    NotFound,
    #[error("order has no items")]
    EmptyOrder,
    #[error("provide items or a session token, not both")]
    ConflictingSource,
    #[error("cart not found")]
    CartNotFound,
    #[error("product {0} is not available")]
    ProductUnavailable(Uuid),
    #[error("variant does not belong to this product")]
    VariantMismatch,
    #[error("order items mix currencies")]
    CurrencyMismatch,
    #[error("quantity must be at least 1")]
    InvalidQuantity,
    #[error("order cannot move from {from} to {to}")]
    InvalidTransition {
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error("payment cannot move from {from} to {to}")]
    InvalidPaymentTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error("order in status {0} cannot be cancelled")]
    NotCancellable(OrderStatus),
    #[error("order must be paid first")]
    PaymentRequired,
}

/// A line after catalog lookup and offer pricing, ready to snapshot.
struct ResolvedLine {
    product_id: Uuid,
    variant_id: Option<Uuid>,
    sku: String,
    name: String,
    quantity: i64,
    unit_price: i64,
}

pub struct OrderService;

impl OrderService {
    /// Place an order from explicit items or an open cart. Prices are
    /// resolved against the live catalog with offers applied, a coupon is
    /// validated and redeemed, and the cart (if any) is converted, all in
    /// one transaction.
    pub async fn create(pool: &SqlitePool, data: &CreateOrder) -> Result<OrderWithItems, OrderError> {
        let (items, source_cart) = Self::collect_items(pool, data).await?;
        let (resolved, currency) = Self::resolve_lines(pool, &items).await?;

        let subtotal: i64 = resolved.iter().map(|l| l.quantity * l.unit_price).sum();
        let quote = match &data.coupon_code {
            Some(code) => Some(
                CouponService::validate(pool, code, data.customer_id, subtotal, Utc::now()).await?,
            ),
            None => None,
        };
        let discount_total = quote.as_ref().map(|q| q.discount).unwrap_or(0);
        let shipping_fee = data.shipping_fee.unwrap_or(0);
        let tax_total = data.tax_total.unwrap_or(0);

        let mut new_order = NewOrder {
            order_number: generate_order_number(),
            customer_id: data.customer_id,
            email: data.email.trim().to_ascii_lowercase(),
            subtotal,
            discount_total,
            shipping_fee,
            tax_total,
            total: subtotal - discount_total + shipping_fee + tax_total,
            currency,
            coupon_id: quote.as_ref().map(|q| q.coupon.id),
            shipping_address: data
                .shipping_address
                .clone()
                .unwrap_or(serde_json::Value::Null),
            billing_address: data
                .billing_address
                .clone()
                .unwrap_or(serde_json::Value::Null),
        };

        let mut tx = pool.begin().await?;
        // Order numbers are random, so a draw can land on a taken one.
        let order = match Order::create(&mut *tx, Uuid::new_v4(), &new_order).await {
            Ok(order) => order,
            Err(err) if is_unique_violation(&err) => {
                new_order.order_number = generate_order_number();
                Order::create(&mut *tx, Uuid::new_v4(), &new_order).await?
            }
            Err(err) => return Err(err.into()),
        };
        let mut order_items = Vec::with_capacity(resolved.len());
        for line in &resolved {
            let item = OrderItem::create(
                &mut *tx,
                Uuid::new_v4(),
                order.id,
                line.product_id,
                line.variant_id,
                &line.sku,
                &line.name,
                line.quantity,
                line.unit_price,
            )
            .await?;
            order_items.push(item);
        }
        if let Some(quote) = &quote {
            // Re-checked under the transaction; a concurrent order may
            // have taken the last use since validation.
            if !Coupon::increment_usage(&mut *tx, quote.coupon.id).await? {
                return Err(CouponError::Exhausted.into());
            }
            CouponUsage::create(
                &mut *tx,
                Uuid::new_v4(),
                quote.coupon.id,
                order.id,
                data.customer_id,
                quote.discount,
            )
            .await?;
        }
        if let Some(cart) = &source_cart {
            CartItem::delete_by_cart_id(&mut *tx, cart.id).await?;
            Cart::update_status(&mut *tx, cart.id, CartStatus::Converted).await?;
        }
        tx.commit().await?;

        info!(order_number = %order.order_number, total = order.total, "order placed");
        Ok(OrderWithItems {
            order,
            items: order_items,
        })
    }

    pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<OrderWithItems, OrderError> {
        let order = Order::find_by_id(pool, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let items = OrderItem::find_by_order_id(pool, id).await?;
        Ok(OrderWithItems { order, items })
    }

    /// Fulfilment lifecycle: pending -> confirmed -> shipped -> delivered,
    /// with cancellation allowed before shipment. Shipping requires
    /// payment.
    pub async fn transition(
        pool: &SqlitePool,
        id: Uuid,
        to: OrderStatus,
    ) -> Result<Order, OrderError> {
        if to == OrderStatus::Cancelled {
            return Self::cancel(pool, id).await;
        }
        let order = Order::find_by_id(pool, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let allowed = matches!(
            (order.status, to),
            (OrderStatus::Pending, OrderStatus::Confirmed)
                | (OrderStatus::Confirmed, OrderStatus::Shipped)
                | (OrderStatus::Shipped, OrderStatus::Delivered)
        );
        if !allowed {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to,
            });
        }
        if to == OrderStatus::Shipped && order.payment_status != PaymentStatus::Paid {
            return Err(OrderError::PaymentRequired);
        }
        Order::update_status(pool, id, to).await?;
        Order::find_by_id(pool, id).await?.ok_or(OrderError::NotFound)
    }

    /// Payment lifecycle. Marking an order paid accrues loyalty points;
    /// refunding reverses them.
    pub async fn set_payment(
        pool: &SqlitePool,
        id: Uuid,
        to: PaymentStatus,
    ) -> Result<Order, OrderError> {
        let order = Order::find_by_id(pool, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        let allowed = matches!(
            (order.payment_status, to),
            (PaymentStatus::Pending, PaymentStatus::Paid)
                | (PaymentStatus::Pending, PaymentStatus::Failed)
                | (PaymentStatus::Failed, PaymentStatus::Paid)
                | (PaymentStatus::Paid, PaymentStatus::Refunded)
        );
        if !allowed {
            return Err(OrderError::InvalidPaymentTransition {
                from: order.payment_status,
                to,
            });
        }
        // The status change and the points movement commit together.
        let mut tx = pool.begin().await?;
        Order::update_payment_status(&mut *tx, id, to).await?;
        let updated = Order::find_by_id(&mut *tx, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        match to {
            PaymentStatus::Paid => {
                LoyaltyService::accrue_on(&mut tx, &updated).await?;
            }
            PaymentStatus::Refunded => {
                LoyaltyService::reverse_on(&mut tx, &updated).await?;
            }
            _ => {}
        }
        tx.commit().await?;
        Ok(updated)
    }

    /// Cancel before shipment. Releases the coupon use so the customer
    /// can redeem the code again.
    pub async fn cancel(pool: &SqlitePool, id: Uuid) -> Result<Order, OrderError> {
        let order = Order::find_by_id(pool, id)
            .await?
            .ok_or(OrderError::NotFound)?;
        if !matches!(order.status, OrderStatus::Pending | OrderStatus::Confirmed) {
            return Err(OrderError::NotCancellable(order.status));
        }

        let mut tx = pool.begin().await?;
        Order::update_status(&mut *tx, id, OrderStatus::Cancelled).await?;
        if let Some(coupon_id) = order.coupon_id {
            Coupon::decrement_usage(&mut *tx, coupon_id).await?;
            CouponUsage::delete_by_order_id(&mut *tx, id).await?;
        }
        tx.commit().await?;

        Order::find_by_id(pool, id).await?.ok_or(OrderError::NotFound)
    }

    async fn collect_items(
        pool: &SqlitePool,
        data: &CreateOrder,
    ) -> Result<(Vec<CreateOrderItem>, Option<Cart>), OrderError> {
        match (&data.items, &data.session_token) {
            (Some(_), Some(_)) => Err(OrderError::ConflictingSource),
            (Some(items), None) => {
                if items.is_empty() {
                    return Err(OrderError::EmptyOrder);
                }
                Ok((items.clone(), None))
            }
            (None, Some(session_token)) => {
                let cart = match Cart::find_by_session_token(pool, session_token).await? {
                    Some(cart) if cart.status == CartStatus::Open => cart,
                    _ => return Err(OrderError::CartNotFound),
                };
                let items: Vec<CreateOrderItem> = CartItem::find_by_cart_id(pool, cart.id)
                    .await?
                    .into_iter()
                    .map(|item| CreateOrderItem {
                        product_id: item.product_id,
                        variant_id: item.variant_id,
                        quantity: item.quantity,
                    })
                    .collect();
                if items.is_empty() {
                    return Err(OrderError::EmptyOrder);
                }
                Ok((items, Some(cart)))
            }
            (None, None) => Err(OrderError::EmptyOrder),
        }
    }

    async fn resolve_lines(
        pool: &SqlitePool,
        items: &[CreateOrderItem],
    ) -> Result<(Vec<ResolvedLine>, String), OrderError> {
        let mut resolved = Vec::with_capacity(items.len());
        let mut currency: Option<String> = None;
        for item in items {
            if item.quantity < 1 {
                return Err(OrderError::InvalidQuantity);
            }
            let product = Product::find_by_id(pool, item.product_id)
                .await?
                .ok_or(OrderError::ProductUnavailable(item.product_id))?;
            if product.status != ProductStatus::Active {
                return Err(OrderError::ProductUnavailable(product.id));
            }
            match &currency {
                None => currency = Some(product.currency.clone()),
                Some(currency) if *currency != product.currency => {
                    return Err(OrderError::CurrencyMismatch);
                }
                Some(_) => {}
            }

            let (base, sku, name, variant_id) = match item.variant_id {
                Some(variant_id) => {
                    let variant = ProductVariant::find_by_id(pool, variant_id)
                        .await?
                        .ok_or(OrderError::VariantMismatch)?;
                    if variant.product_id != product.id {
                        return Err(OrderError::VariantMismatch);
                    }
                    let name = format!("{} ({})", product.name, variant.name);
                    (variant.unit_price(&product), variant.sku, name, Some(variant.id))
                }
                None => (product.price, product.sku.clone(), product.name.clone(), None),
            };
            let offers =
                Offer::active_for_product(pool, product.id, product.category_id, Utc::now())
                    .await?;
            resolved.push(ResolvedLine {
                product_id: product.id,
                variant_id,
                sku,
                name,
                quantity: item.quantity,
                unit_price: Offer::best_price(base, &offers),
            });
        }
        Ok((resolved, currency.unwrap_or_else(|| "USD".to_string())))
    }
}

fn generate_order_number() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..100_000_000);
    format!("ORD-{n:08}")
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cart::CartService;
    use crate::test_support::*;
    use db::models::cart::AddCartItem;
    use db::models::coupon::{CreateCoupon, DiscountType};
    use db::models::loyalty::LoyaltyAccount;
    use db::models::offer::CreateOffer;

    fn order_of(product_id: Uuid, quantity: i64) -> CreateOrder {
        CreateOrder {
            email: "buyer@example.com".to_string(),
            customer_id: None,
            items: Some(vec![CreateOrderItem {
                product_id,
                variant_id: None,
                quantity,
            }]),
            session_token: None,
            coupon_code: None,
            shipping_fee: None,
            tax_total: None,
            shipping_address: None,
            billing_address: None,
        }
    }

    async fn seed_coupon(pool: &SqlitePool, code: &str, percent: i64) -> db::models::coupon::Coupon {
        CouponService::create(
            pool,
            &CreateCoupon {
                code: code.to_string(),
                description: None,
                discount_type: DiscountType::Percentage,
                discount_value: percent,
                min_order_total: None,
                usage_limit: None,
                per_customer_limit: None,
                starts_at: None,
                expires_at: None,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn create_order_computes_totals() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Kettle", 4200).await;
        let mut data = order_of(product.id, 2);
        data.shipping_fee = Some(500);
        data.tax_total = Some(300);

        let placed = OrderService::create(&pool, &data).await.unwrap();
        assert_eq!(placed.order.subtotal, 8400);
        assert_eq!(placed.order.total, 9200);
        assert_eq!(placed.items.len(), 1);
        assert_eq!(placed.items[0].line_total, 8400);
        assert!(placed.order.order_number.starts_with("ORD-"));
    }

    #[tokio::test]
    async fn coupon_redemption_is_recorded() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let product = seed_product(&pool, "Kettle", 4200).await;
        let coupon = seed_coupon(&pool, "SAVE10", 10).await;

        let mut data = order_of(product.id, 1);
        data.customer_id = Some(customer.id);
        data.coupon_code = Some("save10".to_string());
        let placed = OrderService::create(&pool, &data).await.unwrap();
        assert_eq!(placed.order.discount_total, 420);
        assert_eq!(placed.order.total, 3780);
        assert_eq!(placed.order.coupon_id, Some(coupon.id));

        let refreshed = Coupon::find_by_id(&pool, coupon.id).await.unwrap().unwrap();
        assert_eq!(refreshed.usage_count, 1);
        let usages = CouponUsage::find_by_coupon_id(&pool, coupon.id).await.unwrap();
        assert_eq!(usages.len(), 1);
        assert_eq!(usages[0].discount_applied, 420);
    }

    #[tokio::test]
    async fn cancel_releases_coupon_usage() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Kettle", 4200).await;
        let coupon = seed_coupon(&pool, "SAVE10", 10).await;

        let mut data = order_of(product.id, 1);
        data.coupon_code = Some("SAVE10".to_string());
        let placed = OrderService::create(&pool, &data).await.unwrap();

        let cancelled = OrderService::cancel(&pool, placed.order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        let refreshed = Coupon::find_by_id(&pool, coupon.id).await.unwrap().unwrap();
        assert_eq!(refreshed.usage_count, 0);
        let usages = CouponUsage::find_by_coupon_id(&pool, coupon.id).await.unwrap();
        assert!(usages.is_empty());
    }

    #[tokio::test]
    async fn checkout_converts_the_cart() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Mug", 900).await;
        CartService::add_item(
            &pool,
            "checkout-tok",
            &AddCartItem {
                product_id: product.id,
                variant_id: None,
                quantity: 3,
            },
        )
        .await
        .unwrap();

        let data = CreateOrder {
            email: "buyer@example.com".to_string(),
            customer_id: None,
            items: None,
            session_token: Some("checkout-tok".to_string()),
            coupon_code: None,
            shipping_fee: None,
            tax_total: None,
            shipping_address: None,
            billing_address: None,
        };
        let placed = OrderService::create(&pool, &data).await.unwrap();
        assert_eq!(placed.order.subtotal, 2700);

        let cart = Cart::find_by_session_token(&pool, "checkout-tok")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(cart.status, CartStatus::Converted);
        assert!(CartItem::find_by_cart_id(&pool, cart.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn usage_limit_blocks_second_redemption() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Kettle", 4200).await;
        CouponService::create(
            &pool,
            &CreateCoupon {
                code: "LAST1".to_string(),
                description: None,
                discount_type: DiscountType::Fixed,
                discount_value: 100,
                min_order_total: None,
                usage_limit: Some(1),
                per_customer_limit: None,
                starts_at: None,
                expires_at: None,
            },
        )
        .await
        .unwrap();

        let mut data = order_of(product.id, 1);
        data.coupon_code = Some("LAST1".to_string());
        OrderService::create(&pool, &data).await.unwrap();

        let err = OrderService::create(&pool, &data).await.unwrap_err();
        assert!(matches!(err, OrderError::Coupon(CouponError::Exhausted)));
    }

    #[tokio::test]
    async fn shipping_requires_payment() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Kettle", 4200).await;
        let placed = OrderService::create(&pool, &order_of(product.id, 1))
            .await
            .unwrap();

        let confirmed = OrderService::transition(&pool, placed.order.id, OrderStatus::Confirmed)
            .await
            .unwrap();
        assert_eq!(confirmed.status, OrderStatus::Confirmed);

        let err = OrderService::transition(&pool, placed.order.id, OrderStatus::Shipped)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::PaymentRequired));

        OrderService::set_payment(&pool, placed.order.id, PaymentStatus::Paid)
            .await
            .unwrap();
        let shipped = OrderService::transition(&pool, placed.order.id, OrderStatus::Shipped)
            .await
            .unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);

        // Delivered is terminal.
        OrderService::transition(&pool, placed.order.id, OrderStatus::Delivered)
            .await
            .unwrap();
        let err = OrderService::transition(&pool, placed.order.id, OrderStatus::Confirmed)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn payment_accrues_and_refund_reverses_points() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let product = seed_product(&pool, "Kettle", 10_000).await;
        let mut data = order_of(product.id, 1);
        data.customer_id = Some(customer.id);
        let placed = OrderService::create(&pool, &data).await.unwrap();

        OrderService::set_payment(&pool, placed.order.id, PaymentStatus::Paid)
            .await
            .unwrap();
        let account = LoyaltyAccount::find_by_customer_id(&pool, customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.points_balance, 100);

        OrderService::set_payment(&pool, placed.order.id, PaymentStatus::Refunded)
            .await
            .unwrap();
        let account = LoyaltyAccount::find_by_customer_id(&pool, customer.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(account.points_balance, 0);
    }

    #[tokio::test]
    async fn active_offer_discounts_order_lines() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Kettle", 4200).await;
        Offer::create(
            &pool,
            Uuid::new_v4(),
            &CreateOffer {
                name: "Kettle week".to_string(),
                discount_type: DiscountType::Percentage,
                discount_value: 10,
                product_id: Some(product.id),
                category_id: None,
                starts_at: Utc::now() - chrono::Duration::hours(1),
                ends_at: None,
            },
        )
        .await
        .unwrap();

        let placed = OrderService::create(&pool, &order_of(product.id, 2))
            .await
            .unwrap();
        assert_eq!(placed.items[0].unit_price, 3780);
        assert_eq!(placed.items[0].line_total, 7560);
        assert_eq!(placed.order.subtotal, 7560);
        assert_eq!(placed.order.total, 7560);
    }

    #[tokio::test]
    async fn duplicate_order_number_reads_as_unique_violation() {
        let pool = memory_pool().await;
        let existing = seed_order(&pool, None, 1000).await;

        let clash = NewOrder {
            order_number: existing.order_number.clone(),
            customer_id: None,
            email: "buyer@example.com".to_string(),
            subtotal: 1000,
            discount_total: 0,
            shipping_fee: 0,
            tax_total: 0,
            total: 1000,
            currency: "USD".to_string(),
            coupon_id: None,
            shipping_address: serde_json::json!({}),
            billing_address: serde_json::json!({}),
        };
        let err = Order::create(&pool, Uuid::new_v4(), &clash).await.unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[tokio::test]
    async fn failed_accrual_rolls_back_payment_status() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let product = seed_product(&pool, "Kettle", 10_000).await;
        let mut data = order_of(product.id, 1);
        data.customer_id = Some(customer.id);
        let placed = OrderService::create(&pool, &data).await.unwrap();

        // Orphan the order's customer reference so accrual cannot resolve it.
        sqlx::query("PRAGMA foreign_keys = OFF")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM customers WHERE id = $1")
            .bind(customer.id)
            .execute(&pool)
            .await
            .unwrap();

        let err = OrderService::set_payment(&pool, placed.order.id, PaymentStatus::Paid)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            OrderError::Loyalty(LoyaltyError::CustomerNotFound)
        ));

        let order = Order::find_by_id(&pool, placed.order.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(order.payment_status, PaymentStatus::Pending);
    }
}
