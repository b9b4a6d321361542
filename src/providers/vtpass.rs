//! VTpass HTTP client

use super::{BillProvider, ProviderError};
use crate::bills::{
    AirtimePurchase, BillService, DataPurchase, EducationPurchase, ElectricityPurchase,
    RawResponse, TvPurchase,
};
use crate::config::ProviderConfig;
use crate::middleware::logging::log_external_call;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value as JsonValue};
use std::time::Duration;
use tracing::{debug, warn};

const PROVIDER_NAME: &str = "vtpass";

/// Builds the `/api/pay` body for a purchase request.
pub trait VtpassPayload {
    fn pay_body(&self) -> JsonValue;
}

/// Common fields of every pay body
fn base_body(
    service_id: &str,
    request_id: &str,
    amount: &bigdecimal::BigDecimal,
    phone: &str,
    email: Option<&str>,
) -> Map<String, JsonValue> {
    let mut body = Map::new();
    body.insert("request_id".to_string(), json!(request_id));
    body.insert("serviceID".to_string(), json!(service_id));
    body.insert("amount".to_string(), json!(amount.to_string()));
    body.insert("phone".to_string(), json!(phone));
    if let Some(email) = email.filter(|e| !e.trim().is_empty()) {
        body.insert("email".to_string(), json!(email));
    }
    body
}

impl VtpassPayload for ElectricityPurchase {
    fn pay_body(&self) -> JsonValue {
        let mut body = base_body(
            &self.disco_type,
            &self.request_id,
            &self.amount,
            &self.phone,
            self.email.as_deref(),
        );
        body.insert("billersCode".to_string(), json!(self.meter_number));
        body.insert("variation_code".to_string(), json!(self.meter_type.to_lowercase()));
        JsonValue::Object(body)
    }
}

impl VtpassPayload for DataPurchase {
    fn pay_body(&self) -> JsonValue {
        let mut body = base_body(
            &self.network,
            &self.request_id,
            &self.amount,
            &self.phone,
            self.email.as_deref(),
        );
        body.insert("billersCode".to_string(), json!(self.phone));
        body.insert("variation_code".to_string(), json!(self.plan));
        JsonValue::Object(body)
    }
}

impl VtpassPayload for AirtimePurchase {
    fn pay_body(&self) -> JsonValue {
        JsonValue::Object(base_body(
            &self.network,
            &self.request_id,
            &self.amount,
            &self.phone,
            self.email.as_deref(),
        ))
    }
}

impl VtpassPayload for EducationPurchase {
    fn pay_body(&self) -> JsonValue {
        let mut body = base_body(
            &self.exam_type,
            &self.request_id,
            &self.amount,
            &self.phone,
            self.email.as_deref(),
        );
        body.insert("variation_code".to_string(), json!(self.variation_code));
        body.insert("quantity".to_string(), json!(self.quantity));
        if let Some(profile_id) = self.profile_id.as_deref() {
            body.insert("billersCode".to_string(), json!(profile_id));
        }
        JsonValue::Object(body)
    }
}

impl VtpassPayload for TvPurchase {
    fn pay_body(&self) -> JsonValue {
        let mut body = base_body(
            &self.decoder,
            &self.request_id,
            &self.amount,
            &self.phone,
            self.email.as_deref(),
        );
        body.insert("billersCode".to_string(), json!(self.smartcard_number));
        body.insert(
            "subscription_type".to_string(),
            json!(self.subscription_type.to_lowercase()),
        );
        if !self.is_renewal() {
            body.insert("variation_code".to_string(), json!(self.bouquet));
        }
        if let Some(months) = self.months {
            body.insert("quantity".to_string(), json!(months));
        }
        JsonValue::Object(body)
    }
}

pub struct VtpassClient {
    http: Client,
    config: ProviderConfig,
}

impl VtpassClient {
    pub fn new(config: ProviderConfig) -> Result<Self, ProviderError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::Configuration {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self { http, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    async fn post<D: DeserializeOwned>(
        &self,
        path: &str,
        body: &JsonValue,
    ) -> Result<RawResponse<D>, ProviderError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .header("api-key", &self.config.api_key)
            .header("secret-key", &self.config.secret_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout {
                        timeout_secs: self.config.timeout_secs,
                    }
                } else {
                    ProviderError::Transport {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Transport {
                message: format!("failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            warn!(status = status.as_u16(), path = path, "VTpass returned an error status");
            return Err(ProviderError::HttpStatus {
                status: status.as_u16(),
                body: text,
            });
        }

        debug!(path = path, "VTpass response received");
        serde_json::from_str(&text).map_err(|e| ProviderError::InvalidResponse {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl<S> BillProvider<S> for VtpassClient
where
    S: BillService,
    S::Request: VtpassPayload,
{
    fn name(&self) -> &'static str {
        PROVIDER_NAME
    }

    async fn purchase(
        &self,
        request: &S::Request,
    ) -> Result<RawResponse<S::Details>, ProviderError> {
        let body = request.pay_body();
        log_external_call(PROVIDER_NAME, "pay", self.post("/api/pay", &body)).await
    }

    async fn requery(&self, request_id: &str) -> Result<RawResponse<S::Details>, ProviderError> {
        let body = json!({ "request_id": request_id });
        log_external_call(PROVIDER_NAME, "requery", self.post("/api/requery", &body)).await
    }
}

/// Check a hex HMAC-SHA512 webhook signature over the raw body.
pub fn verify_signature(payload: &[u8], secret: &str, signature: &str) -> bool {
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    type HmacSha512 = Hmac<Sha512>;
    let mut mac = match HmacSha512::new_from_slice(secret.as_bytes()) {
        Ok(v) => v,
        Err(_) => return false,
    };
    mac.update(payload);
    let computed = hex::encode(mac.finalize().into_bytes());
    secure_eq(computed.as_bytes(), signature.trim().to_lowercase().as_bytes())
}

fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use hmac::{Hmac, Mac};
    use sha2::Sha512;

    #[test]
    fn electricity_body_uses_meter_as_billers_code() {
        let request = ElectricityPurchase {
            request_id: "req-1".to_string(),
            disco_type: "ikeja-electric".to_string(),
            meter_number: "1234567890".to_string(),
            meter_type: "Prepaid".to_string(),
            amount: BigDecimal::from(5000),
            phone: "08031234567".to_string(),
            email: Some("ada@example.com".to_string()),
        };

        let body = request.pay_body();
        assert_eq!(body["serviceID"], "ikeja-electric");
        assert_eq!(body["billersCode"], "1234567890");
        assert_eq!(body["variation_code"], "prepaid");
        assert_eq!(body["amount"], "5000");
        assert_eq!(body["email"], "ada@example.com");
    }

    #[test]
    fn tv_renewal_omits_bouquet() {
        let request = TvPurchase {
            request_id: "tv-1".to_string(),
            decoder: "gotv".to_string(),
            smartcard_number: "1212121212".to_string(),
            bouquet: String::new(),
            subscription_type: "renew".to_string(),
            months: Some(2),
            phone: "08031234567".to_string(),
            email: None,
            amount: BigDecimal::from(3000),
        };

        let body = request.pay_body();
        assert_eq!(body["subscription_type"], "renew");
        assert!(body.get("variation_code").is_none());
        assert!(body.get("email").is_none());
        assert_eq!(body["quantity"], 2);
    }

    #[test]
    fn airtime_body_has_no_variation() {
        let request = AirtimePurchase {
            request_id: "air-1".to_string(),
            network: "mtn".to_string(),
            phone: "08031234567".to_string(),
            email: None,
            amount: BigDecimal::from(100),
        };

        let body = request.pay_body();
        assert_eq!(body["serviceID"], "mtn");
        assert!(body.get("variation_code").is_none());
        assert!(body.get("billersCode").is_none());
    }

    #[test]
    fn signature_round_trip() {
        let payload = br#"{"type":"transaction-update"}"#;
        let mut mac = Hmac::<Sha512>::new_from_slice(b"whsec").unwrap();
        mac.update(payload);
        let signature = hex::encode(mac.finalize().into_bytes());

        assert!(verify_signature(payload, "whsec", &signature));
        assert!(verify_signature(payload, "whsec", &signature.to_uppercase()));
        assert!(!verify_signature(payload, "other", &signature));
        assert!(!verify_signature(payload, "whsec", "deadbeef"));
    }
}
