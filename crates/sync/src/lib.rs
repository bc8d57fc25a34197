//! Cartwheel Sync - shopping-cart synchronization engine.
//!
//! Keeps a client-side cart consistent with the remote store that owns
//! pricing, tax, and coupon computation. Mutations apply optimistically and
//! render immediately; a debounced revalidation pushes the latest optimistic
//! snapshot to the server and absorbs its authoritative recomputation.
//!
//! # Architecture
//!
//! - `cartwheel-core` holds the pure pieces: cart types, value transforms,
//!   and the reducer-driven cache state machine
//! - [`gateway`] abstracts the remote store; [`http`] is the reqwest-backed
//!   implementation
//! - [`manager`] attaches the effect controllers (initialization,
//!   revalidation, cart-key change) to one cart key
//! - [`service`] hands out one manager per cart key
//!
//! # Example
//!
//! ```rust,ignore
//! use cartwheel_sync::{HttpCartGateway, ShoppingCartService};
//! use cartwheel_sync::config::CartSyncConfig;
//! use cartwheel_core::CartKey;
//!
//! let config = CartSyncConfig::from_env()?;
//! let service = ShoppingCartService::new(Arc::new(HttpCartGateway::new(&config)));
//!
//! let cart = service.manager_for(&CartKey::from("site-123"));
//! cart.add_products_to_cart(vec![personal_bundle]);
//! // Render cart.snapshot() now; prices arrive on the next snapshot change.
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod manager;
pub mod service;

pub use config::CartSyncConfig;
pub use error::GatewayError;
pub use gateway::CartGateway;
pub use http::HttpCartGateway;
pub use manager::{CartSnapshot, ShoppingCartManager};
pub use service::ShoppingCartService;
