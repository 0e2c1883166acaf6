pub mod address;
pub mod cart;
pub mod category;
pub mod coupon;
pub mod customer;
pub mod favourite;
pub mod loyalty;
pub mod offer;
pub mod order;
pub mod product;
