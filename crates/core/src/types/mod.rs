//! Core domain types for the cart synchronization engine.

mod cart;
mod key;
mod status;
mod uuid;

pub use cart::{
    CartLocation, CartTax, ProductPatch, RequestCart, RequestCartProduct, RequestCartTax,
    ResponseCart, ResponseCartProduct, TaxLocation,
};
pub use key::CartKey;
pub use status::{CacheStatus, CouponStatus, SyncErrorKind};
pub use uuid::{ProductUuid, UuidGenerator};
