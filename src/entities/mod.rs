pub mod customer;
pub mod order;
pub mod order_product;
pub mod product;

pub use customer::Entity as Customer;
pub use order::{CouponCode, Entity as Order, OrderDates};
pub use order_product::Entity as OrderProduct;
pub use product::Entity as Product;
