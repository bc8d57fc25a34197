//! Cart data model: response carts (what the server returns), request carts
//! (what we send back), and the tax location fragment shared by both.
//!
//! The server owns all pricing, tax, and coupon computation. Fields the
//! server computes are optional on products: a locally synthesized line item
//! carries `None` for all of them until a round trip fills them in.

use serde::{Deserialize, Serialize};

use super::uuid::ProductUuid;

// =============================================================================
// Tax Types
// =============================================================================

/// Tax address stored on a cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaxLocation {
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// ISO 3166-2 subdivision code (e.g., state or province).
    pub subdivision_code: Option<String>,
}

impl TaxLocation {
    /// Whether any location field carries a usable (non-empty) value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        [
            &self.country_code,
            &self.postal_code,
            &self.subdivision_code,
        ]
        .into_iter()
        .any(|field| field.as_deref().is_some_and(|value| !value.is_empty()))
    }
}

/// Tax block on a response cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartTax {
    /// Address fragment used for tax computation.
    pub location: TaxLocation,
    /// Whether the server wants tax amounts rendered.
    pub display_taxes: bool,
}

/// A requested change to the cart's tax location.
///
/// A `None` field means "not specified": it never counts as a difference when
/// diffing against the stored location, but a full [`set_location`] overwrite
/// clears the stored value.
///
/// [`set_location`]: crate::transforms::set_location
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CartLocation {
    /// ISO 3166-1 alpha-2 country code.
    pub country_code: Option<String>,
    /// Postal code.
    pub postal_code: Option<String>,
    /// ISO 3166-2 subdivision code.
    pub subdivision_code: Option<String>,
}

// =============================================================================
// Response Cart (server -> client)
// =============================================================================

/// A line item as known to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCartProduct {
    /// Unique identity of this line item within the cart.
    pub uuid: ProductUuid,
    /// Display name; empty until the server has seen the product.
    pub product_name: String,
    /// Product slug, the primary product identifier.
    pub product_slug: String,
    /// Numeric product id.
    pub product_id: u64,
    /// Quantity.
    pub volume: i64,
    /// Product-specific metadata (e.g., a domain name for domain products).
    pub meta: String,
    /// Free-form extra data passed through to the server.
    pub extra: serde_json::Value,
    /// Currency for this line; server-computed.
    pub currency: Option<String>,
    /// Unit cost in the currency's smallest unit; server-computed.
    pub product_cost_integer: Option<i64>,
    /// Unit cost formatted for display; server-computed.
    pub product_cost_display: Option<String>,
    /// Line subtotal in the currency's smallest unit; server-computed.
    pub item_subtotal_integer: Option<i64>,
    /// Line subtotal formatted for display; server-computed.
    pub item_subtotal_display: Option<String>,
    /// Billing period length in months; server-computed.
    pub months_per_bill_period: Option<i64>,
}

impl ResponseCartProduct {
    /// Whether this line item is still awaiting server-side pricing.
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.uuid.is_temporary()
    }
}

/// Authoritative cart as known to the client.
///
/// Created by sanitizing a raw server payload and owned exclusively by the
/// cache state machine for the lifetime of one cart key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseCart {
    /// Ordered line items; every `uuid` is unique within the cart.
    pub products: Vec<ResponseCartProduct>,
    /// Current coupon code; empty string means none.
    pub coupon: String,
    /// Whether the server has accepted the coupon. Never true immediately
    /// after a local coupon mutation.
    pub is_coupon_applied: bool,
    /// ISO 4217 currency code, server-supplied.
    pub currency: String,
    /// Locale tag, server-supplied.
    pub locale: String,
    /// Tax location and display settings.
    pub tax: CartTax,
    /// Cart subtotal in the currency's smallest unit.
    pub sub_total_integer: i64,
    /// Cart subtotal formatted for display.
    pub sub_total_display: String,
    /// Total tax in the currency's smallest unit.
    pub total_tax_integer: i64,
    /// Total tax formatted for display.
    pub total_tax_display: String,
    /// Grand total in the currency's smallest unit.
    pub total_cost_integer: i64,
    /// Grand total formatted for display.
    pub total_cost_display: String,
    /// Credits applied, in the currency's smallest unit.
    pub credits_integer: i64,
    /// Credits formatted for display.
    pub credits_display: String,
    /// Payment method slugs the server will accept for this cart.
    pub allowed_payment_methods: Vec<String>,
}

impl Default for ResponseCart {
    fn default() -> Self {
        Self {
            products: Vec::new(),
            coupon: String::new(),
            is_coupon_applied: false,
            currency: "USD".to_string(),
            locale: "en-us".to_string(),
            tax: CartTax::default(),
            sub_total_integer: 0,
            sub_total_display: "0".to_string(),
            total_tax_integer: 0,
            total_tax_display: "0".to_string(),
            total_cost_integer: 0,
            total_cost_display: "0".to_string(),
            credits_integer: 0,
            credits_display: "0".to_string(),
            allowed_payment_methods: Vec::new(),
        }
    }
}

// =============================================================================
// Request Cart (client -> server)
// =============================================================================

/// Minimal product shape sent to the server.
///
/// Derived from [`ResponseCartProduct`] by dropping all server-computed
/// pricing fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestCartProduct {
    /// Product slug.
    pub product_slug: String,
    /// Numeric product id.
    pub product_id: u64,
    /// Product-specific metadata.
    pub meta: String,
    /// Free-form extra data.
    #[serde(default)]
    pub extra: serde_json::Value,
}

/// Tax block on an outgoing request; present only when at least one location
/// field is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCartTax {
    /// Address fragment used for tax computation.
    pub location: TaxLocation,
}

/// Outgoing cart payload pushed to the server for recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCart {
    /// Line items reduced to their request shape.
    pub products: Vec<RequestCartProduct>,
    /// ISO 4217 currency code.
    pub currency: String,
    /// Locale tag.
    pub locale: String,
    /// Coupon code; empty string means none.
    pub coupon: String,
    /// Whether the coupon was last known to be applied.
    pub is_coupon_applied: bool,
    /// Always false on outgoing payloads; the server treats temporary carts
    /// as throwaway price previews.
    pub temporary: bool,
    /// Tax location, or `None` when no location field is set.
    pub tax: Option<RequestCartTax>,
}

// =============================================================================
// Product Patch
// =============================================================================

/// Field-level patch applied to a single line item.
///
/// Absent fields leave the product untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductPatch {
    /// Replacement product slug.
    pub product_slug: Option<String>,
    /// Replacement product id.
    pub product_id: Option<u64>,
    /// Replacement metadata.
    pub meta: Option<String>,
    /// Replacement extra data.
    pub extra: Option<serde_json::Value>,
}
