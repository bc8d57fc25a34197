//! Raw server payload sanitization.
//!
//! The remote store is not fully trusted: new cart keys come back as bare
//! scalars, an empty PHP-style associative tax location serializes as `[]`
//! instead of `{}`, and the products list is sometimes missing. Those shapes
//! are absorbed here; anything else that fails to deserialize is a malformed
//! payload and surfaces as an error.

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

use crate::types::{
    CartTax, ResponseCart, ResponseCartProduct, TaxLocation, UuidGenerator,
};

/// A payload that failed sanitization invariants.
#[derive(Debug, Error)]
pub enum SanitizeError {
    /// The cart envelope did not match the expected shape.
    #[error("cart payload has an unexpected shape: {0}")]
    Envelope(#[source] serde_json::Error),

    /// The tax location was present but neither an object nor an array.
    #[error("cart tax location has an unexpected shape: {0}")]
    TaxLocation(#[source] serde_json::Error),

    /// A product entry was not usable.
    #[error("cart product at index {index} has an unexpected shape: {source}")]
    Product {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Cart envelope minus the fields that need manual normalization.
#[derive(Debug, Deserialize)]
struct RawCartEnvelope {
    #[serde(default = "default_currency")]
    currency: String,
    #[serde(default = "default_locale")]
    locale: String,
    #[serde(default)]
    coupon: String,
    #[serde(default)]
    is_coupon_applied: bool,
    #[serde(default)]
    sub_total_integer: i64,
    #[serde(default = "default_display")]
    sub_total_display: String,
    #[serde(default)]
    total_tax_integer: i64,
    #[serde(default = "default_display")]
    total_tax_display: String,
    #[serde(default)]
    total_cost_integer: i64,
    #[serde(default = "default_display")]
    total_cost_display: String,
    #[serde(default)]
    credits_integer: i64,
    #[serde(default = "default_display")]
    credits_display: String,
    #[serde(default)]
    allowed_payment_methods: Vec<String>,
}

/// A product as the server sends it: no uuid, server-computed fields may be
/// absent.
#[derive(Debug, Deserialize)]
#[serde(default)]
struct RawCartProduct {
    product_name: String,
    product_slug: String,
    product_id: u64,
    volume: i64,
    meta: String,
    extra: Value,
    currency: Option<String>,
    product_cost_integer: Option<i64>,
    product_cost_display: Option<String>,
    item_subtotal_integer: Option<i64>,
    item_subtotal_display: Option<String>,
    months_per_bill_period: Option<i64>,
}

impl Default for RawCartProduct {
    fn default() -> Self {
        Self {
            product_name: String::new(),
            product_slug: String::new(),
            product_id: 0,
            volume: 1,
            meta: String::new(),
            extra: Value::Null,
            currency: None,
            product_cost_integer: None,
            product_cost_display: None,
            item_subtotal_integer: None,
            item_subtotal_display: None,
            months_per_bill_period: None,
        }
    }
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_locale() -> String {
    "en-us".to_string()
}

fn default_display() -> String {
    "0".to_string()
}

/// Convert a raw server payload into a [`ResponseCart`].
///
/// Every incoming product is tagged with a uuid derived from its slug and
/// the generator's monotonic counter.
///
/// # Errors
///
/// Returns [`SanitizeError`] when the payload is an object but its fields do
/// not match the expected shapes.
pub fn response_cart_from_raw(
    raw: &Value,
    uuids: &UuidGenerator,
) -> Result<ResponseCart, SanitizeError> {
    let Some(object) = raw.as_object() else {
        // New cart keys come back as null or a bare scalar: an empty cart.
        return Ok(ResponseCart::default());
    };

    let envelope: RawCartEnvelope =
        serde_json::from_value(Value::Object(object.clone())).map_err(SanitizeError::Envelope)?;

    let tax = sanitize_tax(object.get("tax"))?;
    let products = sanitize_products(object.get("products"), uuids)?;

    Ok(ResponseCart {
        products,
        coupon: envelope.coupon,
        is_coupon_applied: envelope.is_coupon_applied,
        currency: envelope.currency,
        locale: envelope.locale,
        tax,
        sub_total_integer: envelope.sub_total_integer,
        sub_total_display: envelope.sub_total_display,
        total_tax_integer: envelope.total_tax_integer,
        total_tax_display: envelope.total_tax_display,
        total_cost_integer: envelope.total_cost_integer,
        total_cost_display: envelope.total_cost_display,
        credits_integer: envelope.credits_integer,
        credits_display: envelope.credits_display,
        allowed_payment_methods: envelope.allowed_payment_methods,
    })
}

fn sanitize_tax(tax: Option<&Value>) -> Result<CartTax, SanitizeError> {
    let Some(tax) = tax.and_then(Value::as_object) else {
        return Ok(CartTax::default());
    };

    // An empty associative array serializes as [] upstream; treat it as {}.
    let location = match tax.get("location") {
        Some(location) if location.is_object() => {
            serde_json::from_value(location.clone()).map_err(SanitizeError::TaxLocation)?
        }
        _ => TaxLocation::default(),
    };

    let display_taxes = tax
        .get("display_taxes")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(CartTax {
        location,
        display_taxes,
    })
}

fn sanitize_products(
    products: Option<&Value>,
    uuids: &UuidGenerator,
) -> Result<Vec<ResponseCartProduct>, SanitizeError> {
    let Some(entries) = products.and_then(Value::as_array) else {
        return Ok(Vec::new());
    };

    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| {
            let raw: RawCartProduct = serde_json::from_value(entry.clone())
                .map_err(|source| SanitizeError::Product { index, source })?;
            Ok(ResponseCartProduct {
                uuid: uuids.ingested(&raw.product_slug),
                product_name: raw.product_name,
                product_slug: raw.product_slug,
                product_id: raw.product_id,
                volume: raw.volume,
                meta: raw.meta,
                extra: raw.extra,
                currency: raw.currency,
                product_cost_integer: raw.product_cost_integer,
                product_cost_display: raw.product_cost_display,
                item_subtotal_integer: raw.item_subtotal_integer,
                item_subtotal_display: raw.item_subtotal_display,
                months_per_bill_period: raw.months_per_bill_period,
            })
        })
        .collect()
}
