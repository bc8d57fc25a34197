//! Cart cache state machine.
//!
//! A reducer over discrete intents: `(state, intent) -> state`, fully
//! deterministic, no I/O. User mutations apply optimistically and flip the
//! cache to [`CacheStatus::Invalid`]; the controllers in the sync crate
//! watch that status and drive the network round trips, feeding results
//! back in as [`CartIntent::ServerCartFetched`] /
//! [`CartIntent::ServerCartFetchFailed`].

use std::sync::Arc;

use serde_json::Value;

use crate::sanitize::response_cart_from_raw;
use crate::transforms;
use crate::types::{
    CacheStatus, CartLocation, CouponStatus, ProductPatch, ProductUuid, RequestCartProduct,
    ResponseCart, SyncErrorKind, UuidGenerator,
};

/// A discrete instruction to the state machine.
#[derive(Debug, Clone)]
pub enum CartIntent {
    /// Append products as temporary line items.
    AddProducts(Vec<RequestCartProduct>),
    /// Replace the whole product sequence.
    ReplaceAllProducts(Vec<RequestCartProduct>),
    /// Remove the line item with the given uuid.
    RemoveItem(ProductUuid),
    /// Patch the line item with the given uuid.
    ReplaceItem {
        /// Target line item.
        uuid: ProductUuid,
        /// Fields to change.
        patch: ProductPatch,
    },
    /// Change the tax location. A no-op when nothing present differs.
    SetLocation(CartLocation),
    /// Set a coupon code.
    AddCoupon(String),
    /// Clear the coupon code.
    RemoveCoupon,
    /// Discard all local state and require a fresh server seed.
    Reload,
    /// The initial fetch for this cart key has been issued.
    InitialFetchStarted,
    /// A revalidation push has been issued.
    RevalidationStarted,
    /// A round trip completed; the raw payload becomes the new baseline.
    ServerCartFetched(Value),
    /// A round trip failed; the previous cart is retained.
    ServerCartFetchFailed {
        /// Failure classification.
        kind: SyncErrorKind,
        /// Human-readable description.
        message: String,
    },
}

/// Full state of one cached cart.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CartState {
    /// Last known cart, optimistic mutations included.
    pub response_cart: ResponseCart,
    /// Cache lifecycle status.
    pub cache_status: CacheStatus,
    /// Where the current coupon stands with the server.
    pub coupon_status: CouponStatus,
    /// Human-readable description of the last failure, if any.
    pub loading_error: Option<String>,
    /// Classification of the last failure, if any.
    pub loading_error_type: Option<SyncErrorKind>,
}

/// Reducer-driven cache for a single cart key.
#[derive(Debug)]
pub struct CartStateMachine {
    state: CartState,
    uuids: Arc<UuidGenerator>,
}

impl CartStateMachine {
    /// Create a machine in the `Fresh` state with an empty cart.
    #[must_use]
    pub fn new(uuids: Arc<UuidGenerator>) -> Self {
        Self {
            state: CartState::default(),
            uuids,
        }
    }

    /// Current state.
    #[must_use]
    pub const fn state(&self) -> &CartState {
        &self.state
    }

    /// Apply one intent and return the resulting state.
    pub fn dispatch(&mut self, intent: CartIntent) -> &CartState {
        self.state = reduce(std::mem::take(&mut self.state), intent, &self.uuids);
        &self.state
    }
}

fn reduce(state: CartState, intent: CartIntent, uuids: &UuidGenerator) -> CartState {
    match intent {
        CartIntent::AddProducts(products) => {
            mutated(transforms::add_items(&state.response_cart, &products, uuids), state)
        }
        CartIntent::ReplaceAllProducts(products) => mutated(
            transforms::replace_all_items(&state.response_cart, &products, uuids),
            state,
        ),
        CartIntent::RemoveItem(uuid) => {
            mutated(transforms::remove_item(&state.response_cart, &uuid), state)
        }
        CartIntent::ReplaceItem { uuid, patch } => mutated(
            transforms::replace_item(&state.response_cart, &uuid, &patch),
            state,
        ),
        CartIntent::SetLocation(location) => {
            if transforms::location_differs(&state.response_cart, &location) {
                mutated(transforms::set_location(&state.response_cart, &location), state)
            } else {
                state
            }
        }
        CartIntent::AddCoupon(coupon) => CartState {
            coupon_status: CouponStatus::Applying,
            ..mutated(transforms::add_coupon(&state.response_cart, &coupon), state)
        },
        CartIntent::RemoveCoupon => CartState {
            coupon_status: CouponStatus::Applying,
            ..mutated(transforms::remove_coupon(&state.response_cart), state)
        },
        CartIntent::Reload => CartState::default(),
        CartIntent::InitialFetchStarted | CartIntent::RevalidationStarted => CartState {
            cache_status: CacheStatus::Pending,
            ..state
        },
        CartIntent::ServerCartFetched(raw) => match response_cart_from_raw(&raw, uuids) {
            Ok(cart) => {
                let coupon_status = if cart.is_coupon_applied {
                    CouponStatus::Applied
                } else if cart.coupon.is_empty() {
                    CouponStatus::None
                } else {
                    CouponStatus::Rejected
                };
                CartState {
                    response_cart: cart,
                    cache_status: CacheStatus::Valid,
                    coupon_status,
                    loading_error: None,
                    loading_error_type: None,
                }
            }
            Err(err) => fetch_failed(state, SyncErrorKind::Malformed, err.to_string()),
        },
        CartIntent::ServerCartFetchFailed { kind, message } => fetch_failed(state, kind, message),
    }
}

/// Wrap an optimistically mutated cart: the cache is now out of sync with
/// the server and needs revalidation.
fn mutated(cart: ResponseCart, state: CartState) -> CartState {
    CartState {
        response_cart: cart,
        cache_status: CacheStatus::Invalid,
        ..state
    }
}

fn fetch_failed(state: CartState, kind: SyncErrorKind, message: String) -> CartState {
    CartState {
        cache_status: CacheStatus::Error,
        loading_error: Some(message),
        loading_error_type: Some(kind),
        ..state
    }
}
