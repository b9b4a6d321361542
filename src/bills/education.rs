//! Exam result-checker PINs and registration tokens (WAEC, JAMB)

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

const MAX_QUANTITY: u32 = 10;

fn default_quantity() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationPurchase {
    #[serde(alias = "requestId")]
    pub request_id: String,
    /// `waec`, `waec-registration` or `jamb`
    pub exam_type: String,
    pub variation_code: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    /// JAMB profile id; other exams bill against the phone number
    #[serde(default)]
    pub profile_id: Option<String>,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EducationPin {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    pub pin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EducationTransaction {
    #[serde(flatten)]
    pub meta: TransactionMeta,
    pub exam_type: String,
    pub variation_code: String,
    pub quantity: u32,
    pub phone: String,
    #[serde(default)]
    pub pins: Vec<EducationPin>,
}

impl_bill_record!(EducationTransaction);

/// PINs from whichever field the exam body uses.
fn collect_pins(raw: &RawResponse<ProductDetails>) -> Vec<EducationPin> {
    if let Some(cards) = raw.cards.as_ref().filter(|cards| !cards.is_empty()) {
        return cards
            .iter()
            .map(|card| EducationPin {
                serial: card.serial.clone(),
                pin: card.pin.clone(),
            })
            .collect();
    }

    if let Some(tokens) = raw.tokens.as_ref().filter(|tokens| !tokens.is_empty()) {
        return tokens
            .iter()
            .map(|token| EducationPin {
                serial: None,
                pin: token.clone(),
            })
            .collect();
    }

    raw.purchased_code
        .iter()
        .filter(|code| !code.trim().is_empty())
        .map(|code| EducationPin {
            serial: None,
            pin: code.trim().to_string(),
        })
        .collect()
}

pub fn map(
    raw: &RawResponse<ProductDetails>,
    request: &EducationPurchase,
) -> Result<EducationTransaction, MappingError> {
    let details = require_details(raw)?;
    let status = derive_status(raw, details)?;
    let amount = normalize_amount("amount", raw.amount.as_ref().or(details.amount.as_ref()))?;
    let product = details.product_name.as_deref().unwrap_or_default();

    let mut meta = TransactionMeta::pending(
        request.request_id.clone(),
        amount,
        EducationService::user_identifier(request),
        describe(&[product, &request.variation_code]),
    );
    meta.status = status;
    meta.transaction_id = transaction_id(details);
    meta.provider_date = raw
        .transaction_date
        .as_ref()
        .map(|date| date.as_str().to_string());

    Ok(EducationTransaction {
        meta,
        exam_type: request.exam_type.clone(),
        variation_code: request.variation_code.clone(),
        quantity: request.quantity,
        phone: request.phone.clone(),
        pins: collect_pins(raw),
    })
}

pub struct EducationService;

impl BillService for EducationService {
    type Request = EducationPurchase;
    type Details = ProductDetails;
    type Record = EducationTransaction;

    const FAMILY: BillFamily = BillFamily::Education;

    fn validate(request: &EducationPurchase) -> Result<(), ValidationError> {
        validation::require("request_id", &request.request_id)?;
        validation::require("exam_type", &request.exam_type)?;
        validation::require("variation_code", &request.variation_code)?;
        if request.quantity == 0 || request.quantity > MAX_QUANTITY {
            return Err(ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: format!("Must be between 1 and {}", MAX_QUANTITY),
            });
        }
        if request.exam_type.eq_ignore_ascii_case("jamb") {
            validation::require("profile_id", request.profile_id.as_deref().unwrap_or_default())?;
        }
        validation::validate_phone("phone", &request.phone)?;
        validation::require_positive_amount(&request.amount)?;
        validation::validate_optional_email(request.email.as_deref())
    }

    fn request_id(request: &EducationPurchase) -> &str {
        &request.request_id
    }

    fn requested_amount(request: &EducationPurchase) -> &BigDecimal {
        &request.amount
    }

    fn user_identifier(request: &EducationPurchase) -> String {
        validation::user_identifier(request.email.as_deref(), &request.phone)
    }

    fn pending_record(request: &EducationPurchase) -> EducationTransaction {
        EducationTransaction {
            meta: TransactionMeta::pending(
                request.request_id.clone(),
                request.amount.clone(),
                Self::user_identifier(request),
                describe(&[&request.exam_type, &request.variation_code]),
            ),
            exam_type: request.exam_type.clone(),
            variation_code: request.variation_code.clone(),
            quantity: request.quantity,
            phone: request.phone.clone(),
            pins: Vec::new(),
        }
    }

    fn map(
        raw: &RawResponse<ProductDetails>,
        request: &EducationPurchase,
    ) -> Result<EducationTransaction, MappingError> {
        map(raw, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::types::TransactionStatus;
    use serde_json::json;

    fn request() -> EducationPurchase {
        EducationPurchase {
            request_id: "edu-1".to_string(),
            exam_type: "waec".to_string(),
            variation_code: "waecdirect".to_string(),
            quantity: 2,
            profile_id: None,
            phone: "08031234567".to_string(),
            email: None,
            amount: BigDecimal::from(1900),
        }
    }

    #[test]
    fn collects_result_checker_cards() {
        let raw: RawResponse<ProductDetails> = serde_json::from_value(json!({
            "code": "000",
            "content": { "transactions": {
                "status": "delivered",
                "product_name": "WAEC Result Checker PIN",
                "transactionId": "1650"
            }},
            "amount": 1900,
            "cards": [
                { "Serial": "WRN182134784", "Pin": "493969941405" },
                { "Serial": "WRN182134785", "Pin": "493969941406" }
            ]
        }))
        .unwrap();

        let record = map(&raw, &request()).unwrap();
        assert_eq!(record.meta.status, TransactionStatus::Success);
        assert_eq!(record.pins.len(), 2);
        assert_eq!(record.pins[0].serial.as_deref(), Some("WRN182134784"));
        assert_eq!(record.pins[1].pin, "493969941406");
        assert_eq!(record.meta.product_descriptor, "WAEC Result Checker PIN waecdirect");
    }

    #[test]
    fn falls_back_to_tokens_then_purchased_code() {
        let tokens: RawResponse<ProductDetails> = serde_json::from_value(json!({
            "code": "000",
            "content": { "transactions": { "status": "delivered" } },
            "amount": 1900,
            "tokens": ["TOKEN-1"]
        }))
        .unwrap();
        assert_eq!(map(&tokens, &request()).unwrap().pins[0].pin, "TOKEN-1");

        let code: RawResponse<ProductDetails> = serde_json::from_value(json!({
            "code": "000",
            "content": { "transactions": { "status": "delivered" } },
            "amount": 1900,
            "purchased_code": "Pin : 367574683050773"
        }))
        .unwrap();
        assert_eq!(
            map(&code, &request()).unwrap().pins,
            vec![EducationPin {
                serial: None,
                pin: "Pin : 367574683050773".to_string()
            }]
        );
    }

    #[test]
    fn jamb_needs_profile_id() {
        let mut jamb = request();
        jamb.exam_type = "jamb".to_string();
        assert!(EducationService::validate(&jamb).is_err());

        jamb.profile_id = Some("0123456789".to_string());
        assert!(EducationService::validate(&jamb).is_ok());
    }

    #[test]
    fn quantity_bounds() {
        let mut bad = request();
        bad.quantity = 0;
        assert!(EducationService::validate(&bad).is_err());
        bad.quantity = 11;
        assert!(EducationService::validate(&bad).is_err());
    }
}
