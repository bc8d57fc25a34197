//! Remote cart store abstraction.

use async_trait::async_trait;
use cartwheel_core::{CartKey, RequestCart};
use serde_json::Value;

use crate::error::GatewayError;

/// Remote read/write access to a cart resource.
///
/// The server owns recomputation: `push_cart` is write-then-read-back, and
/// the returned payload (raw, unsanitized JSON) is the only way prices, tax,
/// and coupon validity become authoritative. Implementations must be safe to
/// share across tasks; the engine issues at most one call per cart key at a
/// time.
#[async_trait]
pub trait CartGateway: Send + Sync {
    /// Read the current server cart for a key.
    async fn fetch_cart(&self, cart_key: &CartKey) -> Result<Value, GatewayError>;

    /// Push an optimistic cart and read back the server's recomputation.
    async fn push_cart(
        &self,
        cart_key: &CartKey,
        cart: &RequestCart,
    ) -> Result<Value, GatewayError>;
}
