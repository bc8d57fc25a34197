//! Status enums for the cached cart.

use serde::{Deserialize, Serialize};

/// Lifecycle of the cached cart relative to the server copy.
///
/// `Fresh` → `Pending` (initial fetch) → `Valid` → `Invalid` (local
/// mutation) → `Pending` (revalidation, reused) → back to `Valid` or
/// `Error`. `Fresh` is re-entered only via an explicit reload or a cart-key
/// change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// No data yet; an initial fetch is required.
    #[default]
    Fresh,
    /// A round trip is in flight.
    Pending,
    /// In sync with the server.
    Valid,
    /// A local mutation was applied; revalidation is needed.
    Invalid,
    /// The last round trip failed; the previous cart is retained.
    Error,
}

/// Where the current coupon stands with the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CouponStatus {
    /// No coupon on the cart.
    #[default]
    None,
    /// A coupon mutation was applied locally and awaits server confirmation.
    Applying,
    /// The server accepted the coupon.
    Applied,
    /// The server declined the coupon. This is a normal outcome, not a
    /// loading error.
    Rejected,
}

/// Classification of a failed round trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    /// The request never reached the server or produced no response.
    Network,
    /// The server responded, but with an error status.
    Server,
    /// The payload failed sanitization invariants.
    Malformed,
}

impl std::fmt::Display for SyncErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Network => write!(f, "network"),
            Self::Server => write!(f, "server"),
            Self::Malformed => write!(f, "malformed"),
        }
    }
}
