//! Airtime (VTU) top-ups

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

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtimePurchase {
    #[serde(alias = "requestId")]
    pub request_id: String,
    /// `mtn`, `glo`, `airtel` or `etisalat`
    pub network: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AirtimeTransaction {
    #[serde(flatten)]
    pub meta: TransactionMeta,
    pub network: String,
    pub phone: String,
}

impl_bill_record!(AirtimeTransaction);

pub fn map(
    raw: &RawResponse<ProductDetails>,
    request: &AirtimePurchase,
) -> Result<AirtimeTransaction, MappingError> {
    let details = require_details(raw)?;
    let status = derive_status(raw, details)?;
    let amount = normalize_amount("amount", raw.amount.as_ref().or(details.amount.as_ref()))?;
    let product = details.product_name.as_deref().unwrap_or_default();

    let mut meta = TransactionMeta::pending(
        request.request_id.clone(),
        amount,
        AirtimeService::user_identifier(request),
        describe(&[product, &request.network]),
    );
    meta.status = status;
    meta.transaction_id = transaction_id(details);
    meta.provider_date = raw
        .transaction_date
        .as_ref()
        .map(|date| date.as_str().to_string());

    Ok(AirtimeTransaction {
        meta,
        network: request.network.clone(),
        phone: request.phone.clone(),
    })
}

pub struct AirtimeService;

impl BillService for AirtimeService {
    type Request = AirtimePurchase;
    type Details = ProductDetails;
    type Record = AirtimeTransaction;

    const FAMILY: BillFamily = BillFamily::Airtime;

    fn validate(request: &AirtimePurchase) -> Result<(), ValidationError> {
        validation::require("request_id", &request.request_id)?;
        validation::require("network", &request.network)?;
        validation::validate_phone("phone", &request.phone)?;
        validation::require_positive_amount(&request.amount)?;
        validation::validate_optional_email(request.email.as_deref())
    }

    fn request_id(request: &AirtimePurchase) -> &str {
        &request.request_id
    }

    fn requested_amount(request: &AirtimePurchase) -> &BigDecimal {
        &request.amount
    }

    fn user_identifier(request: &AirtimePurchase) -> String {
        validation::user_identifier(request.email.as_deref(), &request.phone)
    }

    fn pending_record(request: &AirtimePurchase) -> AirtimeTransaction {
        AirtimeTransaction {
            meta: TransactionMeta::pending(
                request.request_id.clone(),
                request.amount.clone(),
                Self::user_identifier(request),
                describe(&["Airtime", &request.network]),
            ),
            network: request.network.clone(),
            phone: request.phone.clone(),
        }
    }

    fn map(
        raw: &RawResponse<ProductDetails>,
        request: &AirtimePurchase,
    ) -> Result<AirtimeTransaction, MappingError> {
        map(raw, request)
    }
}
