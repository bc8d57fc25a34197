//! HTTP implementation of the cart gateway.
//!
//! Speaks plain JSON to the remote cart endpoint: GET to read, POST to push
//! an optimistic cart and read back the server's recomputation.

use std::sync::Arc;

use async_trait::async_trait;
use cartwheel_core::{CartKey, RequestCart};
use secrecy::ExposeSecret;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::CartSyncConfig;
use crate::error::GatewayError;
use crate::gateway::CartGateway;

/// Gateway backed by the remote cart HTTP endpoint.
#[derive(Clone)]
pub struct HttpCartGateway {
    inner: Arc<HttpCartGatewayInner>,
}

struct HttpCartGatewayInner {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpCartGateway {
    /// Create a gateway from configuration.
    #[must_use]
    pub fn new(config: &CartSyncConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_default();

        Self {
            inner: Arc::new(HttpCartGatewayInner {
                client,
                base_url: config.api_base_url.as_str().trim_end_matches('/').to_string(),
                api_token: config.api_token.expose_secret().to_string(),
            }),
        }
    }

    fn cart_endpoint(&self, cart_key: &CartKey) -> String {
        format!("{}/carts/{}", self.inner.base_url, cart_key)
    }

    /// Turn a response into a raw JSON payload, mapping non-success statuses
    /// to [`GatewayError::Status`].
    async fn read_payload(response: reqwest::Response) -> Result<Value, GatewayError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            debug!(status = %status, "cart endpoint returned non-success status");
            return Err(GatewayError::Status {
                status: status.as_u16(),
                message: body.chars().take(200).collect(),
            });
        }

        Ok(serde_json::from_str(&body)?)
    }
}

#[async_trait]
impl CartGateway for HttpCartGateway {
    #[instrument(skip(self), fields(cart_key = %cart_key))]
    async fn fetch_cart(&self, cart_key: &CartKey) -> Result<Value, GatewayError> {
        let response = self
            .inner
            .client
            .get(self.cart_endpoint(cart_key))
            .bearer_auth(&self.inner.api_token)
            .send()
            .await?;

        Self::read_payload(response).await
    }

    #[instrument(skip(self, cart), fields(cart_key = %cart_key, products = cart.products.len()))]
    async fn push_cart(
        &self,
        cart_key: &CartKey,
        cart: &RequestCart,
    ) -> Result<Value, GatewayError> {
        let response = self
            .inner
            .client
            .post(self.cart_endpoint(cart_key))
            .bearer_auth(&self.inner.api_token)
            .json(cart)
            .send()
            .await?;

        Self::read_payload(response).await
    }
}
