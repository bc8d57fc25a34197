//! Shopping-cart manager: the exposed surface of the synchronization engine.
//!
//! The manager wires the pure state machine to a [`CartGateway`] with three
//! effect controllers:
//!
//! - **Initialization**: when the cache is `Fresh` and a cart key is
//!   available, issue exactly one seed fetch.
//! - **Revalidation**: when a mutation flips the cache to `Invalid`,
//!   schedule one debounced push of the latest optimistic cart; bursts of
//!   mutations fold into a single round trip.
//! - **Cart-key change**: a changed key discards all local state and
//!   re-seeds; responses from the superseded key are fenced off.
//!
//! All state transitions happen under one mutex, applied in the order
//! acquired. Network I/O runs in spawned tasks that re-enter only through
//! tagged completion calls, so a late response can always be told apart from
//! the current request.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, warn};

use cartwheel_core::machine::{CartIntent, CartState, CartStateMachine};
use cartwheel_core::transforms;
use cartwheel_core::{
    CacheStatus, CartKey, CartLocation, CouponStatus, ProductPatch, ProductUuid, RequestCart,
    RequestCartProduct, ResponseCart, SyncErrorKind, UuidGenerator,
};

use crate::error::GatewayError;
use crate::gateway::CartGateway;

/// Default delay between a mutation and the revalidation round trip.
///
/// Long enough that a burst of synchronous mutations folds into one request,
/// short enough to be invisible next to network latency.
pub const DEFAULT_REVALIDATION_DEBOUNCE: Duration = Duration::from_millis(50);

/// Point-in-time view of a managed cart, as handed to UI collaborators.
#[derive(Debug, Clone)]
pub struct CartSnapshot {
    /// Last known cart, optimistic mutations included.
    pub response_cart: ResponseCart,
    /// Cache lifecycle status.
    pub cache_status: CacheStatus,
    /// Where the current coupon stands with the server.
    pub coupon_status: CouponStatus,
    /// True while there is nothing to render yet (no data, or no cart key).
    pub is_loading: bool,
    /// True whenever the cache is not settled at `Valid` (an error state
    /// also counts as unsettled).
    pub is_pending_update: bool,
    /// Human-readable description of the last failure, surfaced only while
    /// the cache is in the `Error` state.
    pub loading_error: Option<String>,
    /// Classification of the last failure, if any.
    pub loading_error_type: Option<SyncErrorKind>,
}

/// Tag identifying one outgoing round trip.
///
/// `epoch` fences off responses from a superseded cart key or reload;
/// `seq` discriminates the current request from earlier ones; `generation`
/// records how many mutations had been applied when the request left, so a
/// response that raced a newer mutation can be recognized and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequestToken {
    epoch: u64,
    seq: u64,
    generation: u64,
}

struct SyncState {
    machine: CartStateMachine,
    cart_key: Option<CartKey>,
    epoch: u64,
    next_seq: u64,
    generation: u64,
    in_flight: Option<RequestToken>,
    revalidation_scheduled: bool,
}

impl SyncState {
    fn begin_request(&mut self) -> RequestToken {
        let token = RequestToken {
            epoch: self.epoch,
            seq: self.next_seq,
            generation: self.generation,
        };
        self.next_seq += 1;
        self.in_flight = Some(token);
        token
    }

    /// Invalidate every outstanding request (key change or reload).
    fn supersede(&mut self) {
        self.epoch += 1;
        self.in_flight = None;
    }
}

/// Manager for a single cart key's synchronized cart.
///
/// Cheaply cloneable; clones share state. Must be created inside a tokio
/// runtime, since controllers spawn their I/O onto it.
#[derive(Clone)]
pub struct ShoppingCartManager {
    inner: Arc<ManagerInner>,
}

struct ManagerInner {
    gateway: Arc<dyn CartGateway>,
    debounce: Duration,
    state: Mutex<SyncState>,
    snapshots: watch::Sender<CartSnapshot>,
}

impl ShoppingCartManager {
    /// Create a manager with default debounce and uuid source.
    ///
    /// Passing `None` for the cart key leaves the manager idle (loading)
    /// until [`set_cart_key`](Self::set_cart_key) provides one.
    #[must_use]
    pub fn new(gateway: Arc<dyn CartGateway>, cart_key: Option<CartKey>) -> Self {
        Self::with_options(
            gateway,
            cart_key,
            DEFAULT_REVALIDATION_DEBOUNCE,
            Arc::new(UuidGenerator::default()),
        )
    }

    /// Create a manager with explicit debounce and uuid source.
    #[must_use]
    pub fn with_options(
        gateway: Arc<dyn CartGateway>,
        cart_key: Option<CartKey>,
        debounce: Duration,
        uuids: Arc<UuidGenerator>,
    ) -> Self {
        let machine = CartStateMachine::new(uuids);
        let snapshot = snapshot_of(machine.state(), cart_key.is_some());
        let (snapshots, _) = watch::channel(snapshot);

        let inner = Arc::new(ManagerInner {
            gateway,
            debounce,
            state: Mutex::new(SyncState {
                machine,
                cart_key,
                epoch: 0,
                next_seq: 0,
                generation: 0,
                in_flight: None,
                revalidation_scheduled: false,
            }),
            snapshots,
        });

        // Kick initialization if a key is already available.
        let mut state = inner.lock();
        ManagerInner::schedule_effects(&inner, &mut state);
        inner.publish(&state);
        drop(state);

        Self { inner }
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        self.inner.snapshots.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> {
        self.inner.snapshots.subscribe()
    }

    /// Currently active cart key.
    #[must_use]
    pub fn cart_key(&self) -> Option<CartKey> {
        self.inner.lock().cart_key.clone()
    }

    /// Append products to the cart as temporary (unpriced) line items.
    pub fn add_products_to_cart(&self, products: Vec<RequestCartProduct>) {
        self.dispatch(CartIntent::AddProducts(products));
    }

    /// Replace the whole product sequence.
    pub fn replace_products_in_cart(&self, products: Vec<RequestCartProduct>) {
        self.dispatch(CartIntent::ReplaceAllProducts(products));
    }

    /// Remove the line item with the given uuid. A no-op-shaped mutation
    /// when the uuid is unknown.
    pub fn remove_product_from_cart(&self, uuid: ProductUuid) {
        self.dispatch(CartIntent::RemoveItem(uuid));
    }

    /// Patch the line item with the given uuid.
    pub fn replace_product_in_cart(&self, uuid: ProductUuid, patch: ProductPatch) {
        self.dispatch(CartIntent::ReplaceItem { uuid, patch });
    }

    /// Change the tax location. Fields missing from `location` are treated
    /// as unknown and never force a round trip on their own.
    pub fn update_location(&self, location: CartLocation) {
        self.dispatch(CartIntent::SetLocation(location));
    }

    /// Set a coupon code. The coupon counts as applied only once the server
    /// confirms it.
    pub fn apply_coupon(&self, coupon: impl Into<String>) {
        self.dispatch(CartIntent::AddCoupon(coupon.into()));
    }

    /// Clear the coupon code.
    pub fn remove_coupon(&self) {
        self.dispatch(CartIntent::RemoveCoupon);
    }

    /// Discard all local state and re-seed from the server.
    pub fn reload_from_server(&self) {
        let mut state = self.inner.lock();
        state.supersede();
        state.machine.dispatch(CartIntent::Reload);
        ManagerInner::schedule_effects(&self.inner, &mut state);
        self.inner.publish(&state);
    }

    /// Switch to a different cart key (or to none).
    ///
    /// A changed key discards all local state and re-seeds from the new
    /// key's server cart; in-flight responses for the old key are ignored.
    pub fn set_cart_key(&self, cart_key: Option<CartKey>) {
        let mut state = self.inner.lock();
        if state.cart_key == cart_key {
            return;
        }
        debug!(
            previous = state.cart_key.as_ref().map(CartKey::as_str),
            next = cart_key.as_ref().map(CartKey::as_str),
            "cart key changed, reloading"
        );
        state.cart_key = cart_key;
        state.supersede();
        state.machine.dispatch(CartIntent::Reload);
        ManagerInner::schedule_effects(&self.inner, &mut state);
        self.inner.publish(&state);
    }

    fn dispatch(&self, intent: CartIntent) {
        let mut state = self.inner.lock();

        // Mutations bump the generation so an in-flight response that raced
        // them can be recognized as stale at completion time.
        let is_mutation = match &intent {
            CartIntent::AddProducts(_)
            | CartIntent::ReplaceAllProducts(_)
            | CartIntent::RemoveItem(_)
            | CartIntent::ReplaceItem { .. }
            | CartIntent::AddCoupon(_)
            | CartIntent::RemoveCoupon => true,
            CartIntent::SetLocation(location) => {
                transforms::location_differs(&state.machine.state().response_cart, location)
            }
            _ => false,
        };

        state.machine.dispatch(intent);
        if is_mutation {
            state.generation += 1;
        }

        ManagerInner::schedule_effects(&self.inner, &mut state);
        self.inner.publish(&state);
    }
}

impl ManagerInner {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &SyncState) {
        self.snapshots
            .send_replace(snapshot_of(state.machine.state(), state.cart_key.is_some()));
    }

    /// Look at the current status and start whatever I/O it calls for.
    ///
    /// Called after every dispatch and every completion, always under the
    /// state lock.
    fn schedule_effects(inner: &Arc<Self>, state: &mut SyncState) {
        match state.machine.state().cache_status {
            CacheStatus::Fresh => {
                if state.in_flight.is_some() {
                    return;
                }
                let Some(cart_key) = state.cart_key.clone() else {
                    return;
                };
                let token = state.begin_request();
                state.machine.dispatch(CartIntent::InitialFetchStarted);
                debug!(cart_key = %cart_key, "initializing cart from server");

                let gateway = Arc::clone(&inner.gateway);
                let weak = Arc::downgrade(inner);
                tokio::spawn(async move {
                    let result = gateway.fetch_cart(&cart_key).await;
                    if let Some(inner) = weak.upgrade() {
                        Self::complete(&inner, token, result);
                    }
                });
            }
            CacheStatus::Invalid => {
                if state.in_flight.is_some()
                    || state.revalidation_scheduled
                    || state.cart_key.is_none()
                {
                    return;
                }
                state.revalidation_scheduled = true;
                let debounce = inner.debounce;
                let weak = Arc::downgrade(inner);
                tokio::spawn(async move {
                    tokio::time::sleep(debounce).await;
                    if let Some(inner) = weak.upgrade() {
                        Self::run_revalidation(&inner).await;
                    }
                });
            }
            CacheStatus::Pending | CacheStatus::Valid | CacheStatus::Error => {}
        }
    }

    /// Debounce timer fired: push the latest optimistic cart if the cache is
    /// still dirty and nothing else is in flight.
    async fn run_revalidation(inner: &Arc<Self>) {
        let request = {
            let mut state = inner.lock();
            state.revalidation_scheduled = false;
            if state.in_flight.is_some()
                || state.machine.state().cache_status != CacheStatus::Invalid
            {
                None
            } else if let Some(cart_key) = state.cart_key.clone() {
                let token = state.begin_request();
                state.machine.dispatch(CartIntent::RevalidationStarted);
                let cart = transforms::to_request_cart(&state.machine.state().response_cart);
                inner.publish(&state);
                Some((cart_key, token, cart))
            } else {
                None
            }
        };

        let Some((cart_key, token, cart)) = request else {
            return;
        };

        debug!(cart_key = %cart_key, products = cart.products.len(), "revalidating cart");
        let result = inner.gateway.push_cart(&cart_key, &cart).await;
        Self::complete(inner, token, result);
    }

    /// A round trip finished. Feed the tagged result back into the machine,
    /// ignoring anything superseded, then schedule follow-up work.
    fn complete(inner: &Arc<Self>, token: RequestToken, result: Result<Value, GatewayError>) {
        let mut state = inner.lock();

        if token.epoch != state.epoch {
            debug!("ignoring response for a superseded cart key");
            return;
        }
        if state.in_flight != Some(token) {
            debug!("ignoring response for a superseded request");
            return;
        }
        state.in_flight = None;

        match result {
            Ok(raw) => {
                if state.generation == token.generation {
                    state.machine.dispatch(CartIntent::ServerCartFetched(raw));
                } else {
                    // Mutations landed while this request was in flight, so
                    // the optimistic snapshot is newer than this response.
                    // Drop the body; the cache is still Invalid and the next
                    // cycle pushes current state.
                    debug!("discarding server cart superseded by newer local mutations");
                }
            }
            Err(err) => {
                warn!(error = %err, "cart round trip failed");
                state.machine.dispatch(CartIntent::ServerCartFetchFailed {
                    kind: err.kind(),
                    message: err.to_string(),
                });
            }
        }

        Self::schedule_effects(inner, &mut state);
        inner.publish(&state);
    }
}

fn snapshot_of(state: &CartState, has_cart_key: bool) -> CartSnapshot {
    let status = state.cache_status;
    CartSnapshot {
        response_cart: state.response_cart.clone(),
        cache_status: status,
        coupon_status: state.coupon_status,
        is_loading: status == CacheStatus::Fresh || !has_cart_key,
        is_pending_update: status != CacheStatus::Valid || !has_cart_key,
        loading_error: if status == CacheStatus::Error {
            state.loading_error.clone()
        } else {
            None
        },
        loading_error_type: state.loading_error_type,
    }
}
