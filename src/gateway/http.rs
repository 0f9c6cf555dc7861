use chrono::{DateTime, Utc};
use async_trait::async_trait;
use reqwest::StatusCode;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use crate::config::GatewayConfig;
use crate::gateway::{
    GatewayCancelEntry, GatewayCancellation, GatewayConfirmation, GatewayError, GatewaySnapshot,
    PaymentGateway,
};

/// JSON client for the external payment gateway. Authenticates with the
/// merchant secret key via basic auth; non-2xx responses carry a JSON body
/// with the gateway's error code and message.
///
/// No request timeout is applied to confirm/cancel; the caller blocks until
/// the gateway answers.
pub struct HttpGateway {
    client: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct ErrorBody {
    code: String,
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfirmBody {
    status: String,
    method: Option<String>,
    transaction_key: String,
    approved_at: DateTime<Utc>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelEntryBody {
    transaction_key: String,
    cancel_amount: Decimal,
    cancel_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CancelBody {
    status: String,
    transaction_key: Option<String>,
    #[serde(default)]
    cancels: Vec<CancelEntryBody>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotBody {
    order_id: String,
    total_amount: Decimal,
    status: String,
}

impl HttpGateway {
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
            secret_key,
        }
    }

    pub fn from_config(config: &GatewayConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        match (config.base_url.clone(), config.secret_key.clone()) {
            (Some(base_url), Some(secret_key)) => Some(Self::new(base_url, secret_key)),
            _ => None,
        }
    }

    async fn decode_error(response: reqwest::Response) -> GatewayError {
        let status = response.status();
        match response.json::<ErrorBody>().await {
            Ok(body) => GatewayError::new(body.code, body.message),
            Err(_) => GatewayError::new(
                "UNEXPECTED_RESPONSE",
                format!("Gateway returned {} with an unreadable body", status),
            ),
        }
    }
}

#[async_trait]
impl PaymentGateway for HttpGateway {
    async fn confirm(
        &self,
        payment_key: &str,
        order_id: &str,
        amount: Decimal,
    ) -> std::result::Result<GatewayConfirmation, GatewayError> {
        let response = self
            .client
            .post(format!("{}/v1/payments/confirm", self.base_url))
            .basic_auth(&self.secret_key, Some(""))
            .json(&json!({
                "paymentKey": payment_key,
                "orderId": order_id,
                "amount": amount,
            }))
            .send()
            .await
            .map_err(|e| GatewayError::new("NETWORK_ERROR", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        let body: ConfirmBody = response
            .json()
            .await
            .map_err(|e| GatewayError::new("UNEXPECTED_RESPONSE", e.to_string()))?;

        Ok(GatewayConfirmation {
            status: body.status,
            method: body.method,
            transaction_key: body.transaction_key,
            approved_at: body.approved_at,
        })
    }

    async fn cancel(
        &self,
        payment_key: &str,
        reason: &str,
        amount: Option<Decimal>,
    ) -> std::result::Result<GatewayCancellation, GatewayError> {
        let mut payload = json!({ "cancelReason": reason });
        if let Some(amount) = amount {
            payload["cancelAmount"] = json!(amount);
        }

        let response = self
            .client
            .post(format!("{}/v1/payments/{}/cancel", self.base_url, payment_key))
            .basic_auth(&self.secret_key, Some(""))
            .json(&payload)
            .send()
            .await
            .map_err(|e| GatewayError::new("NETWORK_ERROR", e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        let body: CancelBody = response
            .json()
            .await
            .map_err(|e| GatewayError::new("UNEXPECTED_RESPONSE", e.to_string()))?;

        Ok(GatewayCancellation {
            status: body.status,
            transaction_key: body.transaction_key,
            cancels: body
                .cancels
                .into_iter()
                .map(|c| GatewayCancelEntry {
                    transaction_key: c.transaction_key,
                    amount: c.cancel_amount,
                    reason: c.cancel_reason,
                })
                .collect(),
        })
    }

    async fn lookup(
        &self,
        order_id: &str,
    ) -> std::result::Result<Option<GatewaySnapshot>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v1/payments/orders/{}", self.base_url, order_id))
            .basic_auth(&self.secret_key, Some(""))
            .send()
            .await
            .map_err(|e| GatewayError::new("NETWORK_ERROR", e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(Self::decode_error(response).await);
        }

        let body: SnapshotBody = response
            .json()
            .await
            .map_err(|e| GatewayError::new("UNEXPECTED_RESPONSE", e.to_string()))?;

        Ok(Some(GatewaySnapshot {
            order_id: body.order_id,
            amount: body.total_amount,
            status: body.status,
        }))
    }
}
