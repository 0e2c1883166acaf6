pub mod address;
pub mod cart;
pub mod catalog;
pub mod coupon;
pub mod expiry;
pub mod loyalty;
pub mod order;

pub use address::{AddressError, AddressService};
pub use cart::{CartError, CartService};
pub use catalog::{CatalogError, CatalogService};
pub use coupon::{CouponError, CouponService};
pub use expiry::ExpirySweeper;
pub use loyalty::{LoyaltyError, LoyaltyService};
pub use order::{OrderError, OrderService};
