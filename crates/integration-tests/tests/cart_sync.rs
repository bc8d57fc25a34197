//! End-to-end cart synchronization scenarios against the scripted server.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use cartwheel_core::{CacheStatus, CartKey, CartLocation, CouponStatus, RequestCartProduct, SyncErrorKind, UuidGenerator};
use cartwheel_sync::{ShoppingCartManager, ShoppingCartService};
use cartwheel_integration_tests::{MockCartServer, wait_for_server, wait_for_snapshot};

const DEBOUNCE: Duration = Duration::from_millis(10);

fn manager_on(server: &Arc<MockCartServer>, key: &str) -> ShoppingCartManager {
    cartwheel_integration_tests::init_tracing();
    ShoppingCartManager::with_options(
        Arc::clone(server) as Arc<dyn cartwheel_sync::CartGateway>,
        Some(CartKey::from(key)),
        DEBOUNCE,
        Arc::new(UuidGenerator::default()),
    )
}

fn product(slug: &str, id: u64) -> RequestCartProduct {
    RequestCartProduct {
        product_slug: slug.to_string(),
        product_id: id,
        meta: String::new(),
        extra: Value::Null,
    }
}

async fn settled(manager: &ShoppingCartManager) -> cartwheel_sync::CartSnapshot {
    wait_for_snapshot(manager, |s| s.cache_status == CacheStatus::Valid).await
}

#[tokio::test]
async fn initialization_seeds_cart_from_server() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");

    let snapshot = settled(&manager).await;
    assert!(!snapshot.is_loading);
    assert!(!snapshot.is_pending_update);
    assert!(snapshot.response_cart.products.is_empty());
    // The server's PHP-flavored empty tax location ([]) sanitized cleanly.
    assert!(!snapshot.response_cart.tax.location.is_set());
    assert_eq!(server.fetch_count(), 1);
    assert_eq!(server.push_count(), 0);
}

#[tokio::test]
async fn adding_a_product_prices_it_on_revalidation() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    manager.add_products_to_cart(vec![product("personal-bundle", 1009)]);

    // Optimistic state is visible immediately, unpriced.
    let optimistic = manager.snapshot();
    assert_eq!(optimistic.cache_status, CacheStatus::Invalid);
    assert_eq!(optimistic.response_cart.products.len(), 1);
    let line = &optimistic.response_cart.products[0];
    assert!(line.is_temporary());
    assert_eq!(line.product_cost_integer, None);

    // The server's recomputation becomes the new baseline.
    let snapshot = settled(&manager).await;
    let line = &snapshot.response_cart.products[0];
    assert!(!line.is_temporary());
    assert_eq!(line.product_cost_integer, Some(100_900));
    assert_eq!(snapshot.response_cart.sub_total_integer, 100_900);
    assert_eq!(server.push_count(), 1);
}

#[tokio::test]
async fn burst_of_mutations_coalesces_into_one_round_trip() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    manager.add_products_to_cart(vec![product("personal-bundle", 1009)]);
    manager.add_products_to_cart(vec![product("domain-mapping", 5)]);

    let snapshot = settled(&manager).await;
    assert_eq!(snapshot.response_cart.products.len(), 2);
    assert_eq!(server.push_count(), 1);

    let (_, pushed) = server.last_push().expect("one push recorded");
    let slugs: Vec<&str> = pushed.products.iter().map(|p| p.product_slug.as_str()).collect();
    assert_eq!(slugs, vec!["personal-bundle", "domain-mapping"]);
}

#[tokio::test]
async fn mutation_during_revalidation_triggers_second_round_trip() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    server.pause();
    manager.add_products_to_cart(vec![product("personal-bundle", 1009)]);
    wait_for_server(&server, |s| s.pushes_started() == 1).await;

    // The first push is in flight; this mutation must not be lost.
    manager.add_products_to_cart(vec![product("domain-mapping", 5)]);
    server.resume();

    let snapshot = wait_for_snapshot(&manager, |s| {
        s.cache_status == CacheStatus::Valid && s.response_cart.products.len() == 2
    })
    .await;

    // The stale first response was discarded, not merged over the newer cart.
    assert_eq!(server.push_count(), 2);
    let (_, pushed) = server.last_push().expect("second push recorded");
    assert_eq!(pushed.products.len(), 2);
    assert!(snapshot.response_cart.products.iter().all(|p| !p.is_temporary()));
}

#[tokio::test]
async fn push_failure_keeps_edits_and_retries_on_next_mutation() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    server.fail_next_push(500);
    manager.add_products_to_cart(vec![product("personal-bundle", 1009)]);

    let failed = wait_for_snapshot(&manager, |s| s.cache_status == CacheStatus::Error).await;
    assert_eq!(failed.loading_error_type, Some(SyncErrorKind::Server));
    assert!(failed.loading_error.is_some());
    assert!(failed.is_pending_update);
    // The optimistic edit is retained for rendering.
    assert_eq!(failed.response_cart.products.len(), 1);

    // No timer-based retry: the next mutation is what triggers a new push.
    manager.add_products_to_cart(vec![product("domain-mapping", 5)]);
    let snapshot = settled(&manager).await;
    assert_eq!(snapshot.response_cart.products.len(), 2);
    assert_eq!(snapshot.loading_error, None);
    assert_eq!(server.push_count(), 2);
}

#[tokio::test]
async fn fetch_failure_surfaces_and_reload_recovers() {
    let server = Arc::new(MockCartServer::new());
    server.fail_next_fetch(502);
    let manager = manager_on(&server, "site-1");

    let failed = wait_for_snapshot(&manager, |s| s.cache_status == CacheStatus::Error).await;
    assert_eq!(failed.loading_error_type, Some(SyncErrorKind::Server));

    manager.reload_from_server();
    let snapshot = settled(&manager).await;
    assert_eq!(snapshot.loading_error, None);
    assert_eq!(server.fetch_count(), 2);
}

#[tokio::test]
async fn coupon_is_applied_only_after_server_confirmation() {
    let server = Arc::new(MockCartServer::new());
    server.accept_coupon("SUMMER20");
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    manager.add_products_to_cart(vec![product("personal-bundle", 1009)]);
    settled(&manager).await;

    manager.apply_coupon("SUMMER20");
    let applying = manager.snapshot();
    assert_eq!(applying.coupon_status, CouponStatus::Applying);
    assert!(!applying.response_cart.is_coupon_applied);

    let snapshot = settled(&manager).await;
    assert_eq!(snapshot.coupon_status, CouponStatus::Applied);
    assert!(snapshot.response_cart.is_coupon_applied);
    // 10% off 1009 * 100.
    assert_eq!(snapshot.response_cart.total_cost_integer, 90_810);
}

#[tokio::test]
async fn rejected_coupon_is_not_a_loading_error() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    manager.apply_coupon("BOGUS");
    let snapshot = settled(&manager).await;
    assert_eq!(snapshot.coupon_status, CouponStatus::Rejected);
    assert_eq!(snapshot.loading_error, None);
    assert_eq!(snapshot.loading_error_type, None);

    manager.remove_coupon();
    let snapshot = settled(&manager).await;
    assert_eq!(snapshot.coupon_status, CouponStatus::None);
    assert_eq!(snapshot.response_cart.coupon, "");
}

#[tokio::test]
async fn tax_location_round_trips_through_the_server() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    manager.update_location(CartLocation {
        country_code: Some("US".to_string()),
        postal_code: Some("90210".to_string()),
        subdivision_code: None,
    });

    let snapshot = settled(&manager).await;
    assert_eq!(
        snapshot.response_cart.tax.location.country_code.as_deref(),
        Some("US")
    );
    assert!(snapshot.response_cart.tax.display_taxes);
    let pushes_before = server.push_count();

    // Same location again: nothing present differs, no round trip.
    manager.update_location(CartLocation {
        country_code: Some("US".to_string()),
        ..CartLocation::default()
    });
    tokio::time::sleep(DEBOUNCE * 4).await;
    assert_eq!(manager.snapshot().cache_status, CacheStatus::Valid);
    assert_eq!(server.push_count(), pushes_before);
}

#[tokio::test]
async fn cart_key_change_discards_state_and_reseeds() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    manager.add_products_to_cart(vec![product("personal-bundle", 1009)]);
    settled(&manager).await;

    manager.set_cart_key(Some(CartKey::from("site-2")));
    let snapshot = settled(&manager).await;
    assert!(snapshot.response_cart.products.is_empty());

    // The first key's cart is still on the server, untouched.
    manager.set_cart_key(Some(CartKey::from("site-1")));
    let snapshot = settled(&manager).await;
    assert_eq!(snapshot.response_cart.products.len(), 1);
    assert_eq!(snapshot.response_cart.products[0].product_slug, "personal-bundle");
}

#[tokio::test]
async fn stale_response_from_old_key_is_ignored() {
    let server = Arc::new(MockCartServer::new());
    let manager = manager_on(&server, "site-1");
    settled(&manager).await;

    // Hold a push for the old key in flight across the key switch.
    server.pause();
    manager.add_products_to_cart(vec![product("personal-bundle", 1009)]);
    wait_for_server(&server, |s| s.pushes_started() == 1).await;

    manager.set_cart_key(Some(CartKey::from("site-2")));
    server.resume();

    let snapshot = settled(&manager).await;
    assert!(snapshot.response_cart.products.is_empty());
    assert_eq!(manager.cart_key(), Some(CartKey::from("site-2")));
}

#[tokio::test]
async fn manager_without_cart_key_waits_for_one() {
    cartwheel_integration_tests::init_tracing();
    let server = Arc::new(MockCartServer::new());
    let manager = ShoppingCartManager::with_options(
        Arc::clone(&server) as Arc<dyn cartwheel_sync::CartGateway>,
        None,
        DEBOUNCE,
        Arc::new(UuidGenerator::default()),
    );

    let snapshot = manager.snapshot();
    assert!(snapshot.is_loading);
    assert!(snapshot.is_pending_update);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(server.fetch_count(), 0);

    manager.set_cart_key(Some(CartKey::from("site-1")));
    let snapshot = settled(&manager).await;
    assert!(!snapshot.is_loading);
    assert_eq!(server.fetch_count(), 1);
}

#[tokio::test]
async fn service_hands_out_one_manager_per_key() {
    cartwheel_integration_tests::init_tracing();
    let server = Arc::new(MockCartServer::new());
    let service = ShoppingCartService::with_debounce(
        Arc::clone(&server) as Arc<dyn cartwheel_sync::CartGateway>,
        DEBOUNCE,
    );

    let a = service.manager_for(&CartKey::from("site-1"));
    let b = service.manager_for(&CartKey::from("site-1"));
    settled(&a).await;

    // Both handles share the same synchronized state.
    a.add_products_to_cart(vec![product("personal-bundle", 1009)]);
    let snapshot = settled(&b).await;
    assert_eq!(snapshot.response_cart.products.len(), 1);
    assert_eq!(server.fetch_count(), 1);

    // Cross-tab invalidation re-seeds from the server.
    service.invalidate(&CartKey::from("site-1"));
    let snapshot = settled(&a).await;
    assert_eq!(snapshot.response_cart.products.len(), 1);
    assert_eq!(server.fetch_count(), 2);
}
