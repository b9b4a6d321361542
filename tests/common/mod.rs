//! Shared fixtures for the integration tests

#![allow(dead_code)]

use aremxyplug_backend::bills::{BillService, ElectricityPurchase, RawResponse};
use aremxyplug_backend::providers::{BillProvider, ProviderError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

type Scripted = Result<Value, ProviderError>;

/// A provider that answers from queued documents, falling back to a fixed
/// answer once the queue is empty.
#[derive(Default)]
pub struct ScriptedProvider {
    purchases: Mutex<VecDeque<Scripted>>,
    requeries: Mutex<VecDeque<Scripted>>,
    fallback: Option<Value>,
    delay: Duration,
    purchase_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then_purchase(self, answer: Scripted) -> Self {
        self.purchases.lock().unwrap().push_back(answer);
        self
    }

    pub fn then_requery(self, answer: Scripted) -> Self {
        self.requeries.lock().unwrap().push_back(answer);
        self
    }

    pub fn always(mut self, document: Value) -> Self {
        self.fallback = Some(document);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn purchase_calls(&self) -> usize {
        self.purchase_calls.load(Ordering::SeqCst)
    }

    fn next(&self, queue: &Mutex<VecDeque<Scripted>>) -> Scripted {
        let queued = queue.lock().unwrap().pop_front();
        match (queued, &self.fallback) {
            (Some(answer), _) => answer,
            (None, Some(document)) => Ok(document.clone()),
            (None, None) => Err(ProviderError::Transport {
                message: "no scripted answer".to_string(),
            }),
        }
    }
}

fn decode<D: serde::de::DeserializeOwned>(answer: Scripted) -> Result<RawResponse<D>, ProviderError> {
    serde_json::from_value(answer?).map_err(|e| ProviderError::InvalidResponse {
        message: e.to_string(),
    })
}

#[async_trait]
impl<S: BillService> BillProvider<S> for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn purchase(
        &self,
        _request: &S::Request,
    ) -> Result<RawResponse<S::Details>, ProviderError> {
        self.purchase_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        decode(self.next(&self.purchases))
    }

    async fn requery(&self, _request_id: &str) -> Result<RawResponse<S::Details>, ProviderError> {
        decode(self.next(&self.requeries))
    }
}

/// A prepaid electricity purchase of 5000 for the given customer phone.
pub fn electricity_request(request_id: &str, phone: &str) -> ElectricityPurchase {
    serde_json::from_value(json!({
        "request_id": request_id,
        "disco_type": "ikeja-electric",
        "meter_number": "1234567890",
        "meter_type": "prepaid",
        "amount": 5000,
        "phone": phone
    }))
    .unwrap()
}

/// Provider answer for a delivered purchase.
pub fn delivered(request_id: &str, transaction_id: &str) -> Value {
    json!({
        "code": "000",
        "response_description": "TRANSACTION SUCCESSFUL",
        "requestId": request_id,
        "amount": 5000,
        "content": {
            "transactions": {
                "status": "delivered",
                "product_name": "Ikeja Electric Payment - IKEDC",
                "unique_element": "1234567890",
                "unit_price": 4925.5,
                "commission": 74.5,
                "type": "Prepaid",
                "transactionId": transaction_id
            }
        },
        "purchased_code": "Token : 1234-5678-9012-3456"
    })
}

/// Provider answer for a purchase still being processed.
pub fn pending(request_id: &str, transaction_id: &str) -> Value {
    json!({
        "code": "099",
        "requestId": request_id,
        "amount": 5000,
        "content": {
            "transactions": {
                "status": "pending",
                "product_name": "Ikeja Electric Payment - IKEDC",
                "transactionId": transaction_id
            }
        }
    })
}
