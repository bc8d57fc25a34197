//! Pure cart value transforms.
//!
//! Every function takes a cart by reference and returns a new cart; the
//! input is never mutated, so callers can keep the previous value for
//! comparison or rollback.

use crate::types::{
    CartLocation, ProductPatch, ProductUuid, RequestCart, RequestCartProduct, RequestCartTax,
    ResponseCart, ResponseCartProduct, TaxLocation, UuidGenerator,
};

/// Convert a response cart into the minimal payload sent to the server.
///
/// Server-computed pricing fields are stripped from every product. The tax
/// block is `None` unless at least one location field is set, and the
/// payload is always marked non-temporary.
#[must_use]
pub fn to_request_cart(cart: &ResponseCart) -> RequestCart {
    let tax = cart.tax.location.is_set().then(|| RequestCartTax {
        location: cart.tax.location.clone(),
    });

    RequestCart {
        products: cart.products.iter().map(to_request_product).collect(),
        currency: cart.currency.clone(),
        locale: cart.locale.clone(),
        coupon: cart.coupon.clone(),
        is_coupon_applied: cart.is_coupon_applied,
        temporary: false,
        tax,
    }
}

fn to_request_product(product: &ResponseCartProduct) -> RequestCartProduct {
    RequestCartProduct {
        product_slug: product.product_slug.clone(),
        product_id: product.product_id,
        meta: product.meta.clone(),
        extra: product.extra.clone(),
    }
}

/// Drop the product whose uuid matches. Identity copy when absent.
#[must_use]
pub fn remove_item(cart: &ResponseCart, uuid: &ProductUuid) -> ResponseCart {
    ResponseCart {
        products: cart
            .products
            .iter()
            .filter(|product| product.uuid != *uuid)
            .cloned()
            .collect(),
        ..cart.clone()
    }
}

/// Set a coupon code. The applied flag is forced false until the server
/// confirms the coupon on the next round trip.
#[must_use]
pub fn add_coupon(cart: &ResponseCart, coupon: &str) -> ResponseCart {
    ResponseCart {
        coupon: coupon.to_string(),
        is_coupon_applied: false,
        ..cart.clone()
    }
}

/// Clear the coupon code and force the applied flag false.
#[must_use]
pub fn remove_coupon(cart: &ResponseCart) -> ResponseCart {
    ResponseCart {
        coupon: String::new(),
        is_coupon_applied: false,
        ..cart.clone()
    }
}

/// Overwrite the stored tax location with the given fragment.
///
/// Empty-string fields are normalized to absent, matching the request
/// conversion's notion of "set".
#[must_use]
pub fn set_location(cart: &ResponseCart, location: &CartLocation) -> ResponseCart {
    let non_empty = |field: &Option<String>| field.clone().filter(|value| !value.is_empty());

    let mut next = cart.clone();
    next.tax.location = TaxLocation {
        country_code: non_empty(&location.country_code),
        postal_code: non_empty(&location.postal_code),
        subdivision_code: non_empty(&location.subdivision_code),
    };
    next
}

/// Whether any *present* field of `location` differs from the cart's stored
/// value. Missing fields never count as a difference, so a caller that does
/// not know the postal code yet cannot force a reload by omitting it.
#[must_use]
pub fn location_differs(cart: &ResponseCart, location: &CartLocation) -> bool {
    let stored = &cart.tax.location;
    if location.country_code.is_some() && stored.country_code != location.country_code {
        return true;
    }
    if location.postal_code.is_some() && stored.postal_code != location.postal_code {
        return true;
    }
    if location.subdivision_code.is_some() && stored.subdivision_code != location.subdivision_code {
        return true;
    }
    false
}

/// Append temporary line items synthesized from the given request products.
#[must_use]
pub fn add_items(
    cart: &ResponseCart,
    products: &[RequestCartProduct],
    uuids: &UuidGenerator,
) -> ResponseCart {
    let mut next = cart.clone();
    next.products
        .extend(products.iter().map(|product| temporary_product(product, uuids)));
    next
}

/// Replace the whole product sequence with temporary line items synthesized
/// from the given request products.
#[must_use]
pub fn replace_all_items(
    cart: &ResponseCart,
    products: &[RequestCartProduct],
    uuids: &UuidGenerator,
) -> ResponseCart {
    let mut next = cart.clone();
    next.products = products
        .iter()
        .map(|product| temporary_product(product, uuids))
        .collect();
    next
}

/// Shallow-merge a patch onto the single product matching `uuid`. Products
/// that don't match pass through unchanged.
#[must_use]
pub fn replace_item(cart: &ResponseCart, uuid: &ProductUuid, patch: &ProductPatch) -> ResponseCart {
    let mut next = cart.clone();
    for product in &mut next.products {
        if product.uuid != *uuid {
            continue;
        }
        if let Some(product_slug) = &patch.product_slug {
            product.product_slug = product_slug.clone();
        }
        if let Some(product_id) = patch.product_id {
            product.product_id = product_id;
        }
        if let Some(meta) = &patch.meta {
            product.meta = meta.clone();
        }
        if let Some(extra) = &patch.extra {
            product.extra = extra.clone();
        }
    }
    next
}

/// Synthesize a line item for a product the server has not priced yet: all
/// server-computed fields are `None`, volume defaults to 1, and the uuid
/// carries the local prefix.
fn temporary_product(
    product: &RequestCartProduct,
    uuids: &UuidGenerator,
) -> ResponseCartProduct {
    ResponseCartProduct {
        uuid: uuids.temporary(),
        product_name: String::new(),
        product_slug: product.product_slug.clone(),
        product_id: product.product_id,
        volume: 1,
        meta: product.meta.clone(),
        extra: product.extra.clone(),
        currency: None,
        product_cost_integer: None,
        product_cost_display: None,
        item_subtotal_integer: None,
        item_subtotal_display: None,
        months_per_bill_period: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_product(slug: &str, id: u64) -> RequestCartProduct {
        RequestCartProduct {
            product_slug: slug.to_string(),
            product_id: id,
            meta: String::new(),
            extra: serde_json::Value::Null,
        }
    }

    #[test]
    fn test_add_then_remove_restores_original_sequence() {
        let uuids = UuidGenerator::default();
        let base = add_items(
            &ResponseCart::default(),
            &[request_product("blog-bundle", 1)],
            &uuids,
        );

        let with_extra = add_items(&base, &[request_product("domain-map", 5)], &uuids);
        let added_uuid = with_extra.products.last().map(|p| p.uuid.clone()).expect("added");

        let restored = remove_item(&with_extra, &added_uuid);
        assert_eq!(restored.products, base.products);
    }

    #[test]
    fn test_remove_item_is_identity_for_unknown_uuid() {
        let uuids = UuidGenerator::default();
        let cart = add_items(
            &ResponseCart::default(),
            &[request_product("blog-bundle", 1)],
            &uuids,
        );
        let result = remove_item(&cart, &ProductUuid::from("missing"));
        assert_eq!(result, cart);
    }

    #[test]
    fn test_add_items_synthesizes_unpriced_products() {
        let uuids = UuidGenerator::default();
        let cart = add_items(
            &ResponseCart::default(),
            &[request_product("personal-bundle", 1009)],
            &uuids,
        );

        let product = cart.products.first().expect("one product");
        assert!(product.is_temporary());
        assert_eq!(product.volume, 1);
        assert_eq!(product.product_cost_integer, None);
        assert_eq!(product.item_subtotal_display, None);
        assert_eq!(product.currency, None);
    }

    #[test]
    fn test_uuids_stay_unique_across_mutation_sequences() {
        let uuids = UuidGenerator::default();
        let mut cart = ResponseCart::default();
        cart = add_items(&cart, &[request_product("a", 1), request_product("b", 2)], &uuids);
        cart = replace_all_items(&cart, &[request_product("c", 3)], &uuids);
        cart = add_items(&cart, &[request_product("d", 4), request_product("e", 5)], &uuids);

        let mut seen = std::collections::HashSet::new();
        for product in &cart.products {
            assert!(seen.insert(product.uuid.clone()), "duplicate uuid {}", product.uuid);
        }
    }

    #[test]
    fn test_coupon_mutations_force_unapplied() {
        let mut cart = ResponseCart::default();
        cart.is_coupon_applied = true;

        let with_coupon = add_coupon(&cart, "SUMMER20");
        assert_eq!(with_coupon.coupon, "SUMMER20");
        assert!(!with_coupon.is_coupon_applied);

        let without = remove_coupon(&with_coupon);
        assert_eq!(without.coupon, "");
        assert!(!without.is_coupon_applied);
    }

    #[test]
    fn test_location_differs_all_missing_is_false() {
        let cart = ResponseCart::default();
        assert!(!location_differs(&cart, &CartLocation::default()));

        let located = set_location(
            &cart,
            &CartLocation {
                country_code: Some("US".to_string()),
                postal_code: Some("90210".to_string()),
                subdivision_code: None,
            },
        );
        assert!(!location_differs(&located, &CartLocation::default()));
    }

    #[test]
    fn test_location_differs_on_present_fields_only() {
        let cart = set_location(
            &ResponseCart::default(),
            &CartLocation {
                country_code: Some("US".to_string()),
                ..CartLocation::default()
            },
        );

        assert!(!location_differs(
            &cart,
            &CartLocation {
                country_code: Some("US".to_string()),
                ..CartLocation::default()
            }
        ));
        assert!(location_differs(
            &cart,
            &CartLocation {
                country_code: Some("CA".to_string()),
                ..CartLocation::default()
            }
        ));
        // Omitting the country while changing nothing else is not a difference.
        assert!(!location_differs(
            &cart,
            &CartLocation {
                postal_code: None,
                ..CartLocation::default()
            }
        ));
    }

    #[test]
    fn test_to_request_cart_tax_normalization() {
        let cart = ResponseCart::default();
        assert_eq!(to_request_cart(&cart).tax, None);

        let with_postal = set_location(
            &cart,
            &CartLocation {
                postal_code: Some("10001".to_string()),
                ..CartLocation::default()
            },
        );
        let request = to_request_cart(&with_postal);
        let tax = request.tax.expect("tax present");
        assert_eq!(tax.location.postal_code.as_deref(), Some("10001"));
        assert_eq!(tax.location.country_code, None);
        assert_eq!(tax.location.subdivision_code, None);
    }

    #[test]
    fn test_to_request_cart_strips_pricing() {
        let uuids = UuidGenerator::default();
        let cart = add_items(
            &ResponseCart::default(),
            &[RequestCartProduct {
                product_slug: "value-bundle".to_string(),
                product_id: 42,
                meta: "example.com".to_string(),
                extra: serde_json::json!({ "source": "plans-page" }),
            }],
            &uuids,
        );

        let request = to_request_cart(&cart);
        assert!(!request.temporary);
        let product = request.products.first().expect("one product");
        assert_eq!(product.product_slug, "value-bundle");
        assert_eq!(product.product_id, 42);
        assert_eq!(product.meta, "example.com");
        assert_eq!(product.extra, serde_json::json!({ "source": "plans-page" }));
    }

    #[test]
    fn test_replace_item_merges_patch_fields() {
        let uuids = UuidGenerator::default();
        let cart = add_items(
            &ResponseCart::default(),
            &[request_product("monthly-plan", 7), request_product("domain", 8)],
            &uuids,
        );
        let target = cart.products.first().map(|p| p.uuid.clone()).expect("target");

        let patched = replace_item(
            &cart,
            &target,
            &ProductPatch {
                product_slug: Some("yearly-plan".to_string()),
                product_id: Some(9),
                ..ProductPatch::default()
            },
        );

        let first = patched.products.first().expect("first");
        assert_eq!(first.product_slug, "yearly-plan");
        assert_eq!(first.product_id, 9);
        assert_eq!(first.uuid, target);
        // Unmatched products pass through untouched.
        assert_eq!(patched.products.get(1), cart.products.get(1));
    }

    #[test]
    fn test_set_location_overwrites_whole_fragment() {
        let cart = set_location(
            &ResponseCart::default(),
            &CartLocation {
                country_code: Some("US".to_string()),
                postal_code: Some("90210".to_string()),
                subdivision_code: None,
            },
        );

        // A later call without the postal code clears it.
        let moved = set_location(
            &cart,
            &CartLocation {
                country_code: Some("CA".to_string()),
                ..CartLocation::default()
            },
        );
        assert_eq!(moved.tax.location.country_code.as_deref(), Some("CA"));
        assert_eq!(moved.tax.location.postal_code, None);
    }
}
