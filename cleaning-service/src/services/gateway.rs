//! Payment gateway client.
//!
//! Implements the gateway's Bills API for payment collection and
//! HMAC signature verification for webhook callbacks.

use crate::config::GatewayConfig;
use anyhow::{anyhow, Result};
use hmac::{Hmac, Mac};
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

/// Client for the external payment gateway.
#[derive(Clone)]
pub struct GatewayClient {
    client: Client,
    config: GatewayConfig,
}

/// Request to create a bill in the gateway.
#[derive(Debug, Serialize)]
pub struct CreateBillRequest {
    /// Collection the bill belongs to.
    pub collection_id: String,
    /// Amount in cents.
    pub amount: i64,
    /// Shown to the payer on the payment page.
    pub description: String,
    /// Our reference, the invoice number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payer_email: Option<String>,
}

/// A bill as returned by the gateway.
#[derive(Debug, Deserialize)]
pub struct Bill {
    /// Gateway bill code, stored on the payment row.
    pub id: String,
    /// Bill state (e.g., "due", "paid", "deleted").
    pub state: String,
    /// Whether the bill has been paid.
    pub paid: bool,
    /// Amount in cents.
    pub amount: i64,
    /// Hosted payment page URL.
    pub url: Option<String>,
    pub reference: Option<String>,
}

/// Gateway API error response.
#[derive(Debug, Deserialize)]
pub struct GatewayApiError {
    pub error: GatewayApiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GatewayApiErrorDetail {
    #[serde(rename = "type")]
    pub error_type: String,
    pub message: String,
}

/// Webhook callback payload delivered when a bill changes state.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    /// Bill code the event refers to.
    pub id: String,
    pub state: String,
    pub paid: bool,
    pub amount: i64,
    pub paid_at: Option<String>,
}

impl GatewayClient {
    pub fn new(config: GatewayConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    /// Check if the gateway is configured (credentials are set).
    pub fn is_configured(&self) -> bool {
        !self.config.api_key.expose_secret().is_empty() && !self.config.collection_id.is_empty()
    }

    /// Create a bill for an invoice.
    ///
    /// # Arguments
    /// * `amount` - Amount in cents
    /// * `description` - Shown on the payment page
    /// * `reference` - Invoice number for reconciliation
    pub async fn create_bill(
        &self,
        amount: i64,
        description: &str,
        reference: Option<String>,
        payer_name: Option<String>,
        payer_email: Option<String>,
    ) -> Result<Bill> {
        if !self.is_configured() {
            return Err(anyhow!("Payment gateway credentials not configured"));
        }

        let request = CreateBillRequest {
            collection_id: self.config.collection_id.clone(),
            amount,
            description: description.to_string(),
            reference,
            payer_name,
            payer_email,
        };

        let url = format!("{}/bills", self.config.api_base_url);

        let response = self
            .client
            .post(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        tracing::debug!(status = %status, body = %body, "Gateway create_bill response");

        if status.is_success() {
            let bill: Bill = serde_json::from_str(&body)?;
            tracing::info!(
                bill_code = %bill.id,
                amount = bill.amount,
                "Gateway bill created"
            );
            Ok(bill)
        } else {
            let error: GatewayApiError =
                serde_json::from_str(&body).unwrap_or_else(|_| GatewayApiError {
                    error: GatewayApiErrorDetail {
                        error_type: "unknown".to_string(),
                        message: body.clone(),
                    },
                });
            tracing::error!(
                error_type = %error.error.error_type,
                message = %error.error.message,
                "Gateway bill creation failed"
            );
            Err(anyhow!(
                "Gateway error: {} - {}",
                error.error.error_type,
                error.error.message
            ))
        }
    }

    /// Fetch an existing bill by code.
    pub async fn get_bill(&self, bill_code: &str) -> Result<Bill> {
        if !self.is_configured() {
            return Err(anyhow!("Payment gateway credentials not configured"));
        }

        let url = format!("{}/bills/{}", self.config.api_base_url, bill_code);

        let response = self
            .client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            let bill: Bill = serde_json::from_str(&body)?;
            Ok(bill)
        } else {
            Err(anyhow!("Failed to fetch gateway bill: {}", body))
        }
    }

    /// Verify a webhook callback signature.
    ///
    /// The signature is computed as:
    /// `HMAC-SHA256(request_body, webhook_secret)`
    pub fn verify_webhook_signature(&self, body: &str, signature: &str) -> Result<bool> {
        let expected_signature =
            self.compute_signature(body, self.config.webhook_secret.expose_secret())?;

        let is_valid = expected_signature == signature;

        if !is_valid {
            tracing::warn!("Webhook signature verification failed");
        }

        Ok(is_valid)
    }

    /// Parse a webhook event from the request body.
    pub fn parse_webhook_event(&self, body: &str) -> Result<WebhookEvent> {
        let event: WebhookEvent = serde_json::from_str(body)?;
        Ok(event)
    }

    /// Compute HMAC-SHA256 signature.
    fn compute_signature(&self, payload: &str, secret: &str) -> Result<String> {
        type HmacSha256 = Hmac<Sha256>;
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| anyhow!("Invalid key length"))?;
        mac.update(payload.as_bytes());
        let result = mac.finalize();
        Ok(hex::encode(result.into_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::Secret;

    fn test_config() -> GatewayConfig {
        GatewayConfig {
            api_base_url: "https://gateway.example.com/api/v3".to_string(),
            api_key: Secret::new("test_key".to_string()),
            webhook_secret: Secret::new("webhook_secret".to_string()),
            collection_id: "coll_123".to_string(),
        }
    }

    #[test]
    fn test_is_configured() {
        let client = GatewayClient::new(test_config());
        assert!(client.is_configured());

        let empty_config = GatewayConfig {
            api_base_url: "".to_string(),
            api_key: Secret::new("".to_string()),
            webhook_secret: Secret::new("".to_string()),
            collection_id: "".to_string(),
        };
        let client = GatewayClient::new(empty_config);
        assert!(!client.is_configured());
    }

    #[test]
    fn test_webhook_signature_verification() {
        let client = GatewayClient::new(test_config());

        let body = r#"{"id":"bill_abc","state":"paid","paid":true,"amount":28620,"paid_at":null}"#;
        let expected = client.compute_signature(body, "webhook_secret").unwrap();

        assert!(client.verify_webhook_signature(body, &expected).unwrap());
        assert!(!client.verify_webhook_signature(body, "bogus").unwrap());
    }

    #[test]
    fn test_parse_webhook_event() {
        let client = GatewayClient::new(test_config());

        let body = r#"{"id":"bill_abc","state":"paid","paid":true,"amount":28620,"paid_at":"2026-08-24T10:00:00Z"}"#;
        let event = client.parse_webhook_event(body).unwrap();
        assert_eq!(event.id, "bill_abc");
        assert!(event.paid);
        assert_eq!(event.amount, 28620);
    }
}
