//! Mobile data bundle purchases

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
pub struct DataPurchase {
    #[serde(alias = "requestId")]
    pub request_id: String,
    /// Provider service, e.g. `mtn-data`, `smile-direct`, `spectranet`
    pub network: String,
    /// Bundle variation code, e.g. `mtn-10mb-100`
    #[serde(alias = "variation_code")]
    pub plan: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    pub amount: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTransaction {
    #[serde(flatten)]
    pub meta: TransactionMeta,
    pub network: String,
    pub plan: String,
    pub phone: String,
}

impl_bill_record!(DataTransaction);

pub fn map(
    raw: &RawResponse<ProductDetails>,
    request: &DataPurchase,
) -> Result<DataTransaction, MappingError> {
    let details = require_details(raw)?;
    let status = derive_status(raw, details)?;
    // Top-level amount wins; some bundles only report it per item.
    let amount = normalize_amount("amount", raw.amount.as_ref().or(details.amount.as_ref()))?;
    let product = details.product_name.as_deref().unwrap_or_default();

    let mut meta = TransactionMeta::pending(
        request.request_id.clone(),
        amount,
        DataService::user_identifier(request),
        describe(&[product, &request.plan]),
    );
    meta.status = status;
    meta.transaction_id = transaction_id(details);
    meta.provider_date = raw
        .transaction_date
        .as_ref()
        .map(|date| date.as_str().to_string());

    Ok(DataTransaction {
        meta,
        network: request.network.clone(),
        plan: request.plan.clone(),
        phone: details
            .unique_element
            .clone()
            .filter(|phone| !phone.trim().is_empty())
            .unwrap_or_else(|| request.phone.clone()),
    })
}

pub struct DataService;

impl BillService for DataService {
    type Request = DataPurchase;
    type Details = ProductDetails;
    type Record = DataTransaction;

    const FAMILY: BillFamily = BillFamily::Data;

    fn validate(request: &DataPurchase) -> Result<(), ValidationError> {
        validation::require("request_id", &request.request_id)?;
        validation::require("network", &request.network)?;
        validation::require("plan", &request.plan)?;
        validation::validate_phone("phone", &request.phone)?;
        validation::require_positive_amount(&request.amount)?;
        validation::validate_optional_email(request.email.as_deref())
    }

    fn request_id(request: &DataPurchase) -> &str {
        &request.request_id
    }

    fn requested_amount(request: &DataPurchase) -> &BigDecimal {
        &request.amount
    }

    fn user_identifier(request: &DataPurchase) -> String {
        validation::user_identifier(request.email.as_deref(), &request.phone)
    }

    fn pending_record(request: &DataPurchase) -> DataTransaction {
        DataTransaction {
            meta: TransactionMeta::pending(
                request.request_id.clone(),
                request.amount.clone(),
                Self::user_identifier(request),
                describe(&[&request.network, &request.plan]),
            ),
            network: request.network.clone(),
            plan: request.plan.clone(),
            phone: request.phone.clone(),
        }
    }

    fn map(
        raw: &RawResponse<ProductDetails>,
        request: &DataPurchase,
    ) -> Result<DataTransaction, MappingError> {
        map(raw, request)
    }
}
