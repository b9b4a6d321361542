//! Cable TV subscriptions (DStv, GOtv, StarTimes, Showmax)

use super::mapper::{
    derive_status, describe, normalize_amount, require_details, transaction_id, MappingError,
};
use super::raw::{ProductDetails, RawResponse};
use super::types::{impl_bill_record, TransactionMeta};
use super::validation;
use super::{BillFamily, BillService};
use crate::error::ValidationError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

pub const SUBSCRIPTION_TYPES: [&str; 2] = ["change", "renew"];

fn default_subscription_type() -> String {
    "change".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvPurchase {
    #[serde(alias = "requestId")]
    pub request_id: String,
    /// `dstv`, `gotv`, `startimes` or `showmax`
    pub decoder: String,
    #[serde(alias = "billersCode")]
    pub smartcard_number: String,
    /// Bouquet variation code; renewals keep the current bouquet
    #[serde(default, alias = "variation_code")]
    pub bouquet: String,
    #[serde(default = "default_subscription_type")]
    pub subscription_type: String,
    /// Number of months, when the decoder supports prepaying
    #[serde(default)]
    pub months: Option<u32>,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub amount: BigDecimal,
}

impl TvPurchase {
    pub fn is_renewal(&self) -> bool {
        self.subscription_type.eq_ignore_ascii_case("renew")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TvTransaction {
    #[serde(flatten)]
    pub meta: TransactionMeta,
    pub decoder: String,
    pub smartcard_number: String,
    pub bouquet: String,
    pub subscription_type: String,
    pub phone: String,
}

impl_bill_record!(TvTransaction);

pub fn map(
    raw: &RawResponse<ProductDetails>,
    request: &TvPurchase,
) -> Result<TvTransaction, MappingError> {
    let details = require_details(raw)?;
    let status = derive_status(raw, details)?;
    let amount = normalize_amount("amount", raw.amount.as_ref().or(details.amount.as_ref()))?;
    let product = details.product_name.as_deref().unwrap_or_default();
    let variation = if request.is_renewal() {
        "renewal"
    } else {
        request.bouquet.as_str()
    };

    let mut meta = TransactionMeta::pending(
        request.request_id.clone(),
        amount,
        TvService::user_identifier(request),
        describe(&[product, variation]),
    );
    meta.status = status;
    meta.transaction_id = transaction_id(details);
    meta.provider_date = raw
        .transaction_date
        .as_ref()
        .map(|date| date.as_str().to_string());

    Ok(TvTransaction {
        meta,
        decoder: request.decoder.clone(),
        smartcard_number: details
            .unique_element
            .clone()
            .filter(|card| !card.trim().is_empty())
            .unwrap_or_else(|| request.smartcard_number.clone()),
        bouquet: request.bouquet.clone(),
        subscription_type: request.subscription_type.to_lowercase(),
        phone: request.phone.clone(),
    })
}

pub struct TvService;

impl BillService for TvService {
    type Request = TvPurchase;
    type Details = ProductDetails;
    type Record = TvTransaction;

    const FAMILY: BillFamily = BillFamily::Tv;

    fn validate(request: &TvPurchase) -> Result<(), ValidationError> {
        validation::require("request_id", &request.request_id)?;
        validation::require("decoder", &request.decoder)?;
        validation::validate_account_number("smartcard_number", &request.smartcard_number)?;
        validation::require_one_of(
            "subscription_type",
            &request.subscription_type,
            &SUBSCRIPTION_TYPES,
        )?;
        if !request.is_renewal() {
            validation::require("bouquet", &request.bouquet)?;
        }
        validation::validate_phone("phone", &request.phone)?;
        validation::require_positive_amount(&request.amount)?;
        validation::validate_optional_email(request.email.as_deref())
    }

    fn request_id(request: &TvPurchase) -> &str {
        &request.request_id
    }

    fn requested_amount(request: &TvPurchase) -> &BigDecimal {
        &request.amount
    }

    fn user_identifier(request: &TvPurchase) -> String {
        validation::user_identifier(request.email.as_deref(), &request.phone)
    }

    fn pending_record(request: &TvPurchase) -> TvTransaction {
        TvTransaction {
            meta: TransactionMeta::pending(
                request.request_id.clone(),
                request.amount.clone(),
                Self::user_identifier(request),
                describe(&[&request.decoder, &request.bouquet]),
            ),
            decoder: request.decoder.clone(),
            smartcard_number: request.smartcard_number.clone(),
            bouquet: request.bouquet.clone(),
            subscription_type: request.subscription_type.to_lowercase(),
            phone: request.phone.clone(),
        }
    }

    fn map(
        raw: &RawResponse<ProductDetails>,
        request: &TvPurchase,
    ) -> Result<TvTransaction, MappingError> {
        map(raw, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::types::TransactionStatus;
    use serde_json::json;

    fn request() -> TvPurchase {
        TvPurchase {
            request_id: "tv-1".to_string(),
            decoder: "dstv".to_string(),
            smartcard_number: "1212121212".to_string(),
            bouquet: "dstv-padi".to_string(),
            subscription_type: "change".to_string(),
            months: None,
            phone: "08031234567".to_string(),
            email: Some("ada@example.com".to_string()),
            amount: BigDecimal::from(2500),
        }
    }

    #[test]
    fn maps_bouquet_change() {
        let raw: RawResponse<ProductDetails> = serde_json::from_value(json!({
            "code": "000",
            "content": { "transactions": {
                "status": "delivered",
                "product_name": "DSTV Subscription",
                "unique_element": "1212121212",
                "transactionId": "1710"
            }},
            "amount": 2500
        }))
        .unwrap();

        let record = map(&raw, &request()).unwrap();
        assert_eq!(record.meta.status, TransactionStatus::Success);
        assert_eq!(record.meta.product_descriptor, "DSTV Subscription dstv-padi");
        assert_eq!(record.smartcard_number, "1212121212");
    }

    #[test]
    fn renewal_does_not_need_bouquet() {
        let mut renewal = request();
        renewal.subscription_type = "renew".to_string();
        renewal.bouquet = String::new();
        assert!(TvService::validate(&renewal).is_ok());

        let mut change = request();
        change.bouquet = String::new();
        assert!(TvService::validate(&change).is_err());
    }

    #[test]
    fn unknown_subscription_type_rejected() {
        let mut bad = request();
        bad.subscription_type = "upgrade".to_string();
        assert!(matches!(
            TvService::validate(&bad),
            Err(ValidationError::UnsupportedValue { .. })
        ));
    }
}
