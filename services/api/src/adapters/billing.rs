//! services/api/src/adapters/billing.rs
//!
//! This module contains the adapter for the external billing provider
//! (Stripe). It implements the `BillingService` port from the `core` crate,
//! creating hosted checkout sessions for subscription upgrades. Session
//! creation is delegated entirely to the provider; the hosted redirect URL
//! is returned unmodified.

use async_trait::async_trait;
use serde::Deserialize;

use assurscan_core::domain::{CheckoutParams, CheckoutSession};
use assurscan_core::ports::{BillingService, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `BillingService` port against the Stripe
/// Checkout Sessions API. Holds no secret key when billing is not configured.
#[derive(Clone)]
pub struct StripeBillingAdapter {
    client: reqwest::Client,
    api_base: String,
    secret_key: Option<String>,
}

impl StripeBillingAdapter {
    /// Creates a new `StripeBillingAdapter`.
    pub fn new(client: reqwest::Client, api_base: String, secret_key: Option<String>) -> Self {
        Self {
            client,
            api_base,
            secret_key,
        }
    }
}

/// The subset of the provider's session object the workflow consumes.
#[derive(Deserialize)]
struct CheckoutSessionReply {
    id: String,
    url: String,
}

//=========================================================================================
// `BillingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl BillingService for StripeBillingAdapter {
    /// Creates a subscription checkout session and returns its redirect URL.
    async fn create_checkout_session(
        &self,
        params: &CheckoutParams,
    ) -> PortResult<CheckoutSession> {
        let secret_key = self
            .secret_key
            .as_deref()
            .ok_or_else(|| PortError::MissingConfig("STRIPE_SECRET_KEY".to_string()))?;

        let user_id = params.user_id.to_string();
        let form: Vec<(&str, &str)> = vec![
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", &params.price_id),
            ("line_items[0][quantity]", "1"),
            ("customer_email", &params.user_email),
            ("metadata[userId]", &user_id),
            ("subscription_data[metadata][userId]", &user_id),
            ("success_url", &params.success_url),
            ("cancel_url", &params.cancel_url),
        ];

        let url = format!(
            "{}/v1/checkout/sessions",
            self.api_base.trim_end_matches('/')
        );
        let response = self
            .client
            .post(&url)
            .basic_auth(secret_key, None::<&str>)
            .form(&form)
            .send()
            .await
            .map_err(|e| PortError::Upstream {
                status: e.status().map_or(502, |s| s.as_u16()),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PortError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let reply = response
            .json::<CheckoutSessionReply>()
            .await
            .map_err(|e| PortError::InvalidPayload(format!("Malformed checkout reply: {}", e)))?;

        Ok(CheckoutSession {
            id: reply.id,
            url: reply.url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn missing_secret_key_fails_before_any_request() {
        let adapter = StripeBillingAdapter::new(
            reqwest::Client::new(),
            "https://api.stripe.com".to_string(),
            None,
        );
        let params = CheckoutParams {
            price_id: "price_123".to_string(),
            user_id: Uuid::new_v4(),
            user_email: "user@example.com".to_string(),
            success_url: "http://localhost:3000/dashboard?payment=success".to_string(),
            cancel_url: "http://localhost:3000/pricing?payment=cancelled".to_string(),
        };
        let err = adapter.create_checkout_session(&params).await.unwrap_err();
        assert!(matches!(err, PortError::MissingConfig(_)));
    }
}
