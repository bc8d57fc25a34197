//! Shared test support for the integration tests.
//!
//! [`MockCartServer`] is a scripted in-memory stand-in for the remote cart
//! store: it "recomputes" pushed carts with deterministic pricing, validates
//! coupons against a configured set, can pause to hold responses in flight,
//! and can fail the next round trip on demand. It deliberately reproduces
//! the remote store's quirks (an empty tax location serializes as `[]`).

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::watch;

use cartwheel_core::{CartKey, RequestCart};
use cartwheel_sync::manager::CartSnapshot;
use cartwheel_sync::{CartGateway, GatewayError, ShoppingCartManager};

/// Scripted in-memory cart server.
pub struct MockCartServer {
    state: Mutex<ServerState>,
    paused: watch::Sender<bool>,
}

#[derive(Default)]
struct ServerState {
    carts: HashMap<CartKey, Value>,
    valid_coupons: HashSet<String>,
    fetch_count: usize,
    push_count: usize,
    pushes_started: usize,
    pushes: Vec<(CartKey, RequestCart)>,
    fail_next_fetch: Option<u16>,
    fail_next_push: Option<u16>,
}

impl Default for MockCartServer {
    fn default() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            state: Mutex::new(ServerState::default()),
            paused,
        }
    }
}

impl MockCartServer {
    /// Create an unpaused server with no known coupons.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a coupon code the server will accept.
    pub fn accept_coupon(&self, code: &str) {
        self.lock().valid_coupons.insert(code.to_string());
    }

    /// Hold all responses until [`resume`](Self::resume) is called.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Release held responses.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    /// Fail the next fetch with the given HTTP status.
    pub fn fail_next_fetch(&self, status: u16) {
        self.lock().fail_next_fetch = Some(status);
    }

    /// Fail the next push with the given HTTP status.
    pub fn fail_next_push(&self, status: u16) {
        self.lock().fail_next_push = Some(status);
    }

    /// Number of completed fetches.
    pub fn fetch_count(&self) -> usize {
        self.lock().fetch_count
    }

    /// Number of completed pushes.
    pub fn push_count(&self) -> usize {
        self.lock().push_count
    }

    /// Number of pushes that have at least started (possibly held).
    pub fn pushes_started(&self) -> usize {
        self.lock().pushes_started
    }

    /// The most recent pushed request cart, if any.
    pub fn last_push(&self) -> Option<(CartKey, RequestCart)> {
        self.lock().pushes.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn wait_until_resumed(&self) {
        let mut rx = self.paused.subscribe();
        let _ = rx.wait_for(|paused| !*paused).await;
    }

    /// Deterministic "server-side" recomputation of a pushed cart.
    fn recompute(cart: &RequestCart, valid_coupons: &HashSet<String>) -> Value {
        let mut sub_total: i64 = 0;
        let products: Vec<Value> = cart
            .products
            .iter()
            .map(|product| {
                let cost = i64::try_from(product.product_id).unwrap_or(0) * 100;
                sub_total += cost;
                json!({
                    "product_name": product.product_slug.replace('-', " "),
                    "product_slug": product.product_slug,
                    "product_id": product.product_id,
                    "volume": 1,
                    "meta": product.meta,
                    "extra": product.extra,
                    "currency": "USD",
                    "product_cost_integer": cost,
                    "product_cost_display": format!("${}", cost / 100),
                    "item_subtotal_integer": cost,
                    "item_subtotal_display": format!("${}", cost / 100),
                })
            })
            .collect();

        let is_coupon_applied = !cart.coupon.is_empty() && valid_coupons.contains(&cart.coupon);
        let total = if is_coupon_applied {
            sub_total - sub_total / 10
        } else {
            sub_total
        };

        // An empty tax location comes back as [] upstream, not {}.
        let location = cart.tax.as_ref().map_or_else(
            || json!([]),
            |tax| {
                json!({
                    "country_code": tax.location.country_code,
                    "postal_code": tax.location.postal_code,
                    "subdivision_code": tax.location.subdivision_code,
                })
            },
        );

        json!({
            "products": products,
            "coupon": cart.coupon,
            "is_coupon_applied": is_coupon_applied,
            "currency": cart.currency,
            "locale": cart.locale,
            "sub_total_integer": sub_total,
            "sub_total_display": format!("${}", sub_total / 100),
            "total_cost_integer": total,
            "total_cost_display": format!("${}", total / 100),
            "tax": {
                "location": location,
                "display_taxes": cart.tax.is_some(),
            },
        })
    }

    fn empty_cart_payload() -> Value {
        json!({ "products": [], "tax": { "location": [] } })
    }
}

#[async_trait]
impl CartGateway for MockCartServer {
    async fn fetch_cart(&self, cart_key: &CartKey) -> Result<Value, GatewayError> {
        self.wait_until_resumed().await;

        let mut state = self.lock();
        state.fetch_count += 1;
        if let Some(status) = state.fail_next_fetch.take() {
            return Err(GatewayError::Status {
                status,
                message: "scripted fetch failure".to_string(),
            });
        }
        Ok(state
            .carts
            .get(cart_key)
            .cloned()
            .unwrap_or_else(Self::empty_cart_payload))
    }

    async fn push_cart(
        &self,
        cart_key: &CartKey,
        cart: &RequestCart,
    ) -> Result<Value, GatewayError> {
        {
            let mut state = self.lock();
            state.pushes_started += 1;
            state.pushes.push((cart_key.clone(), cart.clone()));
        }

        self.wait_until_resumed().await;

        let mut state = self.lock();
        state.push_count += 1;
        if let Some(status) = state.fail_next_push.take() {
            return Err(GatewayError::Status {
                status,
                message: "scripted push failure".to_string(),
            });
        }
        let payload = Self::recompute(cart, &state.valid_coupons);
        state.carts.insert(cart_key.clone(), payload.clone());
        Ok(payload)
    }
}

/// Install a test tracing subscriber honoring `RUST_LOG`. Safe to call from
/// every test; only the first call wins.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Wait (bounded) until a manager snapshot satisfies the predicate.
///
/// # Panics
///
/// Panics when five seconds pass without a matching snapshot.
pub async fn wait_for_snapshot(
    manager: &ShoppingCartManager,
    mut predicate: impl FnMut(&CartSnapshot) -> bool,
) -> CartSnapshot {
    let mut rx = manager.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async move {
        loop {
            let snapshot = rx.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
            rx.changed().await.expect("manager dropped while waiting");
        }
    })
    .await
    .expect("timed out waiting for cart snapshot")
}

/// Wait (bounded) until a server-side counter condition holds.
///
/// # Panics
///
/// Panics when five seconds pass without the condition holding.
pub async fn wait_for_server(
    server: &MockCartServer,
    mut condition: impl FnMut(&MockCartServer) -> bool,
) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition(server) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("timed out waiting for cart server");
}
