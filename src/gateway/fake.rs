use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::gateway::{
    GatewayCancelEntry, GatewayCancellation, GatewayConfirmation, GatewayError, GatewaySnapshot,
    PaymentGateway,
};

/// In-memory gateway double for integration tests: scripted failures,
/// recorded calls, deterministic transaction keys.
pub struct FakeGateway {
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    confirm_calls: Vec<String>,
    cancel_calls: Vec<(String, Option<Decimal>)>,
    fail_confirm: Option<GatewayError>,
    fail_cancel: Option<GatewayError>,
    missing_orders: HashSet<String>,
    key_in_history_only: bool,
    counter: u64,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState::default()),
        }
    }

    /// Makes every subsequent confirm call fail until cleared.
    pub fn fail_confirm(&self, code: &str, message: &str) {
        self.state.lock().unwrap().fail_confirm = Some(GatewayError::new(code, message));
    }

    /// Makes every subsequent cancel call fail until cleared.
    pub fn fail_cancel(&self, code: &str, message: &str) {
        self.state.lock().unwrap().fail_cancel = Some(GatewayError::new(code, message));
    }

    pub fn clear_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_confirm = None;
        state.fail_cancel = None;
    }

    /// Makes `lookup` report the order as unknown on the gateway side.
    pub fn mark_order_missing(&self, order_id: &str) {
        self.state
            .lock()
            .unwrap()
            .missing_orders
            .insert(order_id.to_string());
    }

    /// Omits the top-level transaction key from cancel responses, leaving it
    /// only in the cancellation history.
    pub fn put_cancel_key_in_history_only(&self) {
        self.state.lock().unwrap().key_in_history_only = true;
    }

    pub fn confirm_call_count(&self) -> usize {
        self.state.lock().unwrap().confirm_calls.len()
    }

    pub fn cancel_call_count(&self) -> usize {
        self.state.lock().unwrap().cancel_calls.len()
    }

    pub fn last_cancel_amount(&self) -> Option<Option<Decimal>> {
        self.state
            .lock()
            .unwrap()
            .cancel_calls
            .last()
            .map(|(_, amount)| *amount)
    }
}

impl Default for FakeGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn confirm(
        &self,
        payment_key: &str,
        _order_id: &str,
        _amount: Decimal,
    ) -> std::result::Result<GatewayConfirmation, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.confirm_calls.push(payment_key.to_string());
        if let Some(err) = state.fail_confirm.clone() {
            return Err(err);
        }
        state.counter += 1;
        Ok(GatewayConfirmation {
            status: "DONE".to_string(),
            method: Some("CARD".to_string()),
            transaction_key: format!("txn_{}", state.counter),
            approved_at: Utc::now(),
        })
    }

    async fn cancel(
        &self,
        payment_key: &str,
        reason: &str,
        amount: Option<Decimal>,
    ) -> std::result::Result<GatewayCancellation, GatewayError> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls.push((payment_key.to_string(), amount));
        if let Some(err) = state.fail_cancel.clone() {
            return Err(err);
        }
        state.counter += 1;
        let key = format!("cxl_{}", state.counter);
        Ok(GatewayCancellation {
            status: if amount.is_some() {
                "PARTIAL_CANCELED".to_string()
            } else {
                "CANCELED".to_string()
            },
            transaction_key: if state.key_in_history_only {
                None
            } else {
                Some(key.clone())
            },
            cancels: vec![GatewayCancelEntry {
                transaction_key: key,
                amount: amount.unwrap_or(Decimal::ZERO),
                reason: Some(reason.to_string()),
            }],
        })
    }

    async fn lookup(
        &self,
        order_id: &str,
    ) -> std::result::Result<Option<GatewaySnapshot>, GatewayError> {
        let state = self.state.lock().unwrap();
        if state.missing_orders.contains(order_id) {
            return Ok(None);
        }
        Ok(Some(GatewaySnapshot {
            order_id: order_id.to_string(),
            amount: Decimal::ZERO,
            status: "READY".to_string(),
        }))
    }
}
