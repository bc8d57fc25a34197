//! Per-key manager registry.
//!
//! A cart key must have at most one set of controllers attached, or two
//! revalidation loops would race each other with divergent optimistic
//! state. The service hands out one shared [`ShoppingCartManager`] per key.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use cartwheel_core::{CartKey, UuidGenerator};
use tracing::debug;

use crate::gateway::CartGateway;
use crate::manager::{DEFAULT_REVALIDATION_DEBOUNCE, ShoppingCartManager};

/// Hands out one shared manager per cart key.
#[derive(Clone)]
pub struct ShoppingCartService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    gateway: Arc<dyn CartGateway>,
    debounce: Duration,
    managers: Mutex<HashMap<CartKey, ShoppingCartManager>>,
}

impl ShoppingCartService {
    /// Create a service with the default revalidation debounce.
    #[must_use]
    pub fn new(gateway: Arc<dyn CartGateway>) -> Self {
        Self::with_debounce(gateway, DEFAULT_REVALIDATION_DEBOUNCE)
    }

    /// Create a service with an explicit revalidation debounce.
    #[must_use]
    pub fn with_debounce(gateway: Arc<dyn CartGateway>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(ServiceInner {
                gateway,
                debounce,
                managers: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Get (or create) the manager for a cart key.
    pub fn manager_for(&self, cart_key: &CartKey) -> ShoppingCartManager {
        let mut managers = self.lock();
        managers
            .entry(cart_key.clone())
            .or_insert_with(|| {
                debug!(cart_key = %cart_key, "attaching cart manager");
                ShoppingCartManager::with_options(
                    Arc::clone(&self.inner.gateway),
                    Some(cart_key.clone()),
                    self.inner.debounce,
                    Arc::new(UuidGenerator::default()),
                )
            })
            .clone()
    }

    /// Force the manager for a key (if any) to discard local state and
    /// re-seed from the server. Used for cross-tab invalidation: another
    /// context changed the remote cart behind our back.
    pub fn invalidate(&self, cart_key: &CartKey) {
        let manager = self.lock().get(cart_key).cloned();
        if let Some(manager) = manager {
            debug!(cart_key = %cart_key, "invalidating cart manager");
            manager.reload_from_server();
        }
    }

    /// Detach the manager for a key. The next [`manager_for`] call creates a
    /// fresh one.
    ///
    /// [`manager_for`]: Self::manager_for
    pub fn forget(&self, cart_key: &CartKey) {
        self.lock().remove(cart_key);
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CartKey, ShoppingCartManager>> {
        self.inner
            .managers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
