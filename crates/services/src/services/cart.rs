use chrono::Utc;
use db::models::cart::{AddCartItem, Cart, CartItem, CartLine, CartStatus, CartView};
use db::models::customer::Customer;
use db::models::offer::Offer;
use db::models::product::{Product, ProductStatus, ProductVariant};
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CartError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("cart not found")]
    CartNotFound,
    #[error("cart item not found")]
    ItemNotFound,
    #[error("customer not found")]
    CustomerNotFound,
    #[error("product is not available")]
    ProductUnavailable,
    #[error("variant does not belong to this product")]
    VariantMismatch,
}

/// Guest and customer carts keyed by an opaque session token. Line prices
/// are snapshots of the offer-adjusted price at the time the line was
/// last touched.
pub struct CartService;

impl CartService {
    /// The cart behind a token, creating an open one on first use. A
    /// token whose cart has been converted or abandoned is dead.
    pub async fn get_or_create(pool: &SqlitePool, session_token: &str) -> Result<Cart, CartError> {
        match Cart::find_by_session_token(pool, session_token).await? {
            Some(cart) if cart.status == CartStatus::Open => Ok(cart),
            Some(_) => Err(CartError::CartNotFound),
            None => Ok(Cart::create(pool, Uuid::new_v4(), session_token, None).await?),
        }
    }

    pub async fn view(pool: &SqlitePool, session_token: &str) -> Result<CartView, CartError> {
        let cart = Self::get_or_create(pool, session_token).await?;
        Self::view_of(pool, cart).await
    }

    pub async fn add_item(
        pool: &SqlitePool,
        session_token: &str,
        data: &AddCartItem,
    ) -> Result<CartView, CartError> {
        let cart = Self::get_or_create(pool, session_token).await?;
        let unit_price = Self::price_line(pool, data.product_id, data.variant_id).await?;

        match CartItem::find_line(pool, cart.id, data.product_id, data.variant_id).await? {
            Some(line) => {
                CartItem::update_quantity(pool, line.id, line.quantity + data.quantity, unit_price)
                    .await?;
            }
            None => {
                CartItem::create(pool, Uuid::new_v4(), cart.id, data, unit_price).await?;
            }
        }
        Self::view_of(pool, cart).await
    }

    /// Quantity 0 removes the line.
    pub async fn update_item(
        pool: &SqlitePool,
        session_token: &str,
        item_id: Uuid,
        quantity: i64,
    ) -> Result<CartView, CartError> {
        let cart = Self::open_cart(pool, session_token).await?;
        let line = Self::line_of(pool, &cart, item_id).await?;
        if quantity <= 0 {
            CartItem::delete(pool, line.id).await?;
        } else {
            let unit_price = Self::price_line(pool, line.product_id, line.variant_id).await?;
            CartItem::update_quantity(pool, line.id, quantity, unit_price).await?;
        }
        Self::view_of(pool, cart).await
    }

    pub async fn remove_item(
        pool: &SqlitePool,
        session_token: &str,
        item_id: Uuid,
    ) -> Result<CartView, CartError> {
        let cart = Self::open_cart(pool, session_token).await?;
        let line = Self::line_of(pool, &cart, item_id).await?;
        CartItem::delete(pool, line.id).await?;
        Self::view_of(pool, cart).await
    }

    pub async fn clear(pool: &SqlitePool, session_token: &str) -> Result<CartView, CartError> {
        let cart = Self::open_cart(pool, session_token).await?;
        CartItem::delete_by_cart_id(pool, cart.id).await?;
        Self::view_of(pool, cart).await
    }

    /// Attach a guest cart to a customer after sign-in. When the customer
    /// already has an open cart the guest lines are merged into it and
    /// the guest cart is retired.
    pub async fn claim(
        pool: &SqlitePool,
        session_token: &str,
        customer_id: Uuid,
    ) -> Result<CartView, CartError> {
        Customer::find_by_id(pool, customer_id)
            .await?
            .ok_or(CartError::CustomerNotFound)?;
        let guest = Self::open_cart(pool, session_token).await?;
        if guest.customer_id == Some(customer_id) {
            return Self::view_of(pool, guest).await;
        }

        let target = match Cart::find_open_by_customer_id(pool, customer_id).await? {
            None => {
                Cart::attach_customer(pool, guest.id, customer_id).await?;
                return Self::view(pool, session_token).await;
            }
            Some(target) if target.id == guest.id => return Self::view_of(pool, guest).await,
            Some(target) => target,
        };

        let guest_items = CartItem::find_by_cart_id(pool, guest.id).await?;
        let mut merges = Vec::with_capacity(guest_items.len());
        for item in &guest_items {
            let existing =
                CartItem::find_line(pool, target.id, item.product_id, item.variant_id).await?;
            merges.push((item.clone(), existing));
        }

        let mut tx = pool.begin().await?;
        for (item, existing) in merges {
            match existing {
                Some(line) => {
                    CartItem::update_quantity(
                        &mut *tx,
                        line.id,
                        line.quantity + item.quantity,
                        item.unit_price,
                    )
                    .await?;
                }
                None => {
                    let data = AddCartItem {
                        product_id: item.product_id,
                        variant_id: item.variant_id,
                        quantity: item.quantity,
                    };
                    CartItem::create(&mut *tx, Uuid::new_v4(), target.id, &data, item.unit_price)
                        .await?;
                }
            }
        }
        CartItem::delete_by_cart_id(&mut *tx, guest.id).await?;
        Cart::update_status(&mut *tx, guest.id, CartStatus::Abandoned).await?;
        tx.commit().await?;

        Self::view_of(pool, target).await
    }

    /// Offer-adjusted unit price for a product/variant pair, validating
    /// that both exist and belong together.
    async fn price_line(
        pool: &SqlitePool,
        product_id: Uuid,
        variant_id: Option<Uuid>,
    ) -> Result<i64, CartError> {
        let product = Product::find_by_id(pool, product_id)
            .await?
            .ok_or(CartError::ProductUnavailable)?;
        if product.status != ProductStatus::Active {
            return Err(CartError::ProductUnavailable);
        }
        let base = match variant_id {
            Some(variant_id) => {
                let variant = ProductVariant::find_by_id(pool, variant_id)
                    .await?
                    .ok_or(CartError::VariantMismatch)?;
                if variant.product_id != product.id {
                    return Err(CartError::VariantMismatch);
                }
                variant.unit_price(&product)
            }
            None => product.price,
        };
        let offers =
            Offer::active_for_product(pool, product.id, product.category_id, Utc::now()).await?;
        Ok(Offer::best_price(base, &offers))
    }

    async fn open_cart(pool: &SqlitePool, session_token: &str) -> Result<Cart, CartError> {
        match Cart::find_by_session_token(pool, session_token).await? {
            Some(cart) if cart.status == CartStatus::Open => Ok(cart),
            _ => Err(CartError::CartNotFound),
        }
    }

    async fn line_of(pool: &SqlitePool, cart: &Cart, item_id: Uuid) -> Result<CartItem, CartError> {
        let line = CartItem::find_by_id(pool, item_id)
            .await?
            .ok_or(CartError::ItemNotFound)?;
        if line.cart_id != cart.id {
            return Err(CartError::ItemNotFound);
        }
        Ok(line)
    }

    async fn view_of(pool: &SqlitePool, cart: Cart) -> Result<CartView, CartError> {
        let lines = CartLine::find_by_cart_id(pool, cart.id).await?;
        let subtotal = lines.iter().map(|l| l.line_total).sum();
        Ok(CartView {
            cart,
            lines,
            subtotal,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::*;

    fn add(product_id: Uuid, quantity: i64) -> AddCartItem {
        AddCartItem {
            product_id,
            variant_id: None,
            quantity,
        }
    }

    #[tokio::test]
    async fn add_item_upserts_quantity() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Mug", 900).await;

        CartService::add_item(&pool, "tok-1", &add(product.id, 2))
            .await
            .unwrap();
        let view = CartService::add_item(&pool, "tok-1", &add(product.id, 3))
            .await
            .unwrap();

        assert_eq!(view.lines.len(), 1);
        assert_eq!(view.lines[0].quantity, 5);
        assert_eq!(view.subtotal, 4500);
    }

    #[tokio::test]
    async fn update_to_zero_removes_line() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Mug", 900).await;
        let view = CartService::add_item(&pool, "tok-2", &add(product.id, 2))
            .await
            .unwrap();

        let view = CartService::update_item(&pool, "tok-2", view.lines[0].id, 0)
            .await
            .unwrap();
        assert!(view.lines.is_empty());
        assert_eq!(view.subtotal, 0);
    }

    #[tokio::test]
    async fn claim_merges_guest_cart_into_customer_cart() {
        let pool = memory_pool().await;
        let customer = seed_customer(&pool).await;
        let mug = seed_product(&pool, "Mug", 900).await;
        let kettle = seed_product(&pool, "Kettle", 4200).await;

        CartService::add_item(&pool, "customer-tok", &add(mug.id, 1))
            .await
            .unwrap();
        CartService::claim(&pool, "customer-tok", customer.id)
            .await
            .unwrap();

        CartService::add_item(&pool, "guest-tok", &add(mug.id, 2))
            .await
            .unwrap();
        CartService::add_item(&pool, "guest-tok", &add(kettle.id, 1))
            .await
            .unwrap();

        let merged = CartService::claim(&pool, "guest-tok", customer.id)
            .await
            .unwrap();
        assert_eq!(merged.cart.customer_id, Some(customer.id));
        assert_eq!(merged.lines.len(), 2);
        let mug_line = merged
            .lines
            .iter()
            .find(|l| l.product_id == mug.id)
            .unwrap();
        assert_eq!(mug_line.quantity, 3);

        let guest = Cart::find_by_session_token(&pool, "guest-tok")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(guest.status, CartStatus::Abandoned);
    }

    #[tokio::test]
    async fn line_price_snapshot_applies_active_offer() {
        use db::models::coupon::DiscountType;
        use db::models::offer::CreateOffer;

        let pool = memory_pool().await;
        let product = seed_product(&pool, "Mug", 1000).await;
        Offer::create(
            &pool,
            Uuid::new_v4(),
            &CreateOffer {
                name: "Mug sale".to_string(),
                discount_type: DiscountType::Fixed,
                discount_value: 300,
                product_id: Some(product.id),
                category_id: None,
                starts_at: Utc::now() - chrono::Duration::hours(1),
                ends_at: None,
            },
        )
        .await
        .unwrap();

        let view = CartService::add_item(&pool, "tok-offer", &add(product.id, 2))
            .await
            .unwrap();
        assert_eq!(view.lines[0].unit_price, 700);
        assert_eq!(view.subtotal, 1400);
    }

    #[tokio::test]
    async fn archived_product_cannot_be_added() {
        let pool = memory_pool().await;
        let product = seed_product(&pool, "Old Mug", 900).await;
        Product::archive(&pool, product.id).await.unwrap();

        let err = CartService::add_item(&pool, "tok-3", &add(product.id, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, CartError::ProductUnavailable));
    }
}
