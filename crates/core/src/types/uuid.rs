//! Line-item identity tokens and their generator.
//!
//! Uniqueness comes from a monotonically increasing counter, not randomness:
//! two tokens can never collide within one process. Server-ingested products
//! get `slug + counter`; locally synthesized products get a distinct prefix
//! so temporary items are recognizable at a glance.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Prefix marking uuids synthesized client-side for items the server has not
/// priced yet.
const TEMPORARY_PREFIX: &str = "temp-item-";

/// Unique identity of a line item within a cart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductUuid(String);

impl ProductUuid {
    /// Wrap an existing token.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the token as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this token was synthesized locally (item awaiting pricing).
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMPORARY_PREFIX)
    }
}

impl fmt::Display for ProductUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ProductUuid {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for ProductUuid {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// Monotonic source of [`ProductUuid`] values.
///
/// Injectable so tests can pin the sequence and concurrent test runs don't
/// share a counter. The default starting point matches the first value the
/// server-ingestion path historically produced.
#[derive(Debug)]
pub struct UuidGenerator {
    counter: AtomicU64,
}

impl UuidGenerator {
    /// Create a generator whose first token uses `start`.
    #[must_use]
    pub const fn starting_at(start: u64) -> Self {
        Self {
            counter: AtomicU64::new(start),
        }
    }

    /// Next token for a locally synthesized (unpriced) line item.
    #[must_use]
    pub fn temporary(&self) -> ProductUuid {
        ProductUuid(format!("{TEMPORARY_PREFIX}{}", self.next()))
    }

    /// Next token for a product ingested from a server payload.
    #[must_use]
    pub fn ingested(&self, product_slug: &str) -> ProductUuid {
        ProductUuid(format!("{product_slug}{}", self.next()))
    }

    fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for UuidGenerator {
    fn default() -> Self {
        Self::starting_at(100)
    }
}
