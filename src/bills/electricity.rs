//! Electricity token (prepaid) and bill (postpaid) purchases

use super::mapper::{
    derive_status, describe, normalize_amount, require_details, transaction_id, MappingError,
};
use super::raw::{lenient_string, RawAmount, RawResponse, TransactionDetails};
use super::types::{impl_bill_record, TransactionMeta};
use super::validation;
use super::{BillFamily, BillService};
use crate::error::ValidationError;
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

pub const METER_TYPES: [&str; 2] = ["prepaid", "postpaid"];

fn default_meter_type() -> String {
    "prepaid".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectricityPurchase {
    #[serde(alias = "requestId")]
    pub request_id: String,
    /// Distribution company, e.g. `ikeja-electric`
    #[serde(alias = "discoType")]
    pub disco_type: String,
    #[serde(alias = "meter_no", alias = "meterNo")]
    pub meter_number: String,
    #[serde(default = "default_meter_type", alias = "meterType")]
    pub meter_type: String,
    pub amount: BigDecimal,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// `content.transactions` of an electricity purchase
#[derive(Debug, Clone, Deserialize)]
pub struct ElectricityDetails {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub product_name: Option<String>,
    /// Meter number as echoed by the provider
    #[serde(default, deserialize_with = "lenient_string")]
    pub unique_element: Option<String>,
    #[serde(default)]
    pub unit_price: Option<RawAmount>,
    #[serde(default)]
    pub commission: Option<RawAmount>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub phone: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, rename = "transactionId", deserialize_with = "lenient_string")]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider order number
    #[serde(default)]
    pub id: Option<i64>,
}

impl TransactionDetails for ElectricityDetails {
    fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElectricityTransaction {
    #[serde(flatten)]
    pub meta: TransactionMeta,
    pub disco_type: String,
    pub meter_number: String,
    pub meter_type: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Provider product name, e.g. `Ikeja Electric Payment - IKEDC`
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub bill_generated: String,
    #[serde(default)]
    pub order_id: Option<i64>,
    /// Prepaid token or postpaid receipt
    #[serde(default)]
    pub token: Option<String>,
}

impl_bill_record!(ElectricityTransaction);

/// Display string of the provider's price breakdown.
pub fn bill_generated(details: &ElectricityDetails) -> Result<String, MappingError> {
    let unit_price = match &details.unit_price {
        Some(price) => normalize_amount("content.transactions.unit_price", Some(price))?,
        None => BigDecimal::from(0),
    };
    let commission = match &details.commission {
        Some(commission) => normalize_amount("content.transactions.commission", Some(commission))?,
        None => BigDecimal::from(0),
    };

    Ok(format!(
        "Unit price: {} | Commission: {}",
        unit_price, commission
    ))
}

pub fn map(
    raw: &RawResponse<ElectricityDetails>,
    request: &ElectricityPurchase,
) -> Result<ElectricityTransaction, MappingError> {
    let details = require_details(raw)?;
    let status = derive_status(raw, details)?;
    let amount = normalize_amount("amount", raw.amount.as_ref())?;
    let product = details.product_name.clone().unwrap_or_default();
    let meter_number = details
        .unique_element
        .as_deref()
        .map(str::trim)
        .filter(|meter| !meter.is_empty())
        .unwrap_or(request.meter_number.trim())
        .to_string();

    let mut meta = TransactionMeta::pending(
        request.request_id.clone(),
        amount,
        ElectricityService::user_identifier(request),
        describe(&[&product, &request.disco_type]),
    );
    meta.status = status;
    meta.transaction_id = transaction_id(details);
    meta.provider_date = raw
        .transaction_date
        .as_ref()
        .map(|date| date.as_str().to_string());

    Ok(ElectricityTransaction {
        meta,
        disco_type: request.disco_type.clone(),
        meter_number,
        meter_type: details
            .kind
            .clone()
            .filter(|kind| !kind.trim().is_empty())
            .unwrap_or_else(|| request.meter_type.clone())
            .to_lowercase(),
        phone: request.phone.clone(),
        email: request.email.clone(),
        product,
        bill_generated: bill_generated(details)?,
        order_id: details.id,
        token: raw
            .purchased_code
            .clone()
            .filter(|code| !code.trim().is_empty()),
    })
}

pub struct ElectricityService;

impl BillService for ElectricityService {
    type Request = ElectricityPurchase;
    type Details = ElectricityDetails;
    type Record = ElectricityTransaction;

    const FAMILY: BillFamily = BillFamily::Electricity;

    fn validate(request: &ElectricityPurchase) -> Result<(), ValidationError> {
        validation::require("request_id", &request.request_id)?;
        validation::require("disco_type", &request.disco_type)?;
        validation::validate_account_number("meter_number", &request.meter_number)?;
        validation::require_one_of("meter_type", &request.meter_type, &METER_TYPES)?;
        validation::require_positive_amount(&request.amount)?;
        validation::validate_optional_phone("phone", &request.phone)?;
        validation::validate_optional_email(request.email.as_deref())
    }

    fn request_id(request: &ElectricityPurchase) -> &str {
        &request.request_id
    }

    fn requested_amount(request: &ElectricityPurchase) -> &BigDecimal {
        &request.amount
    }

    /// Falls back to the meter number when no contact was given.
    fn user_identifier(request: &ElectricityPurchase) -> String {
        let contact = if request.phone.trim().is_empty() {
            &request.meter_number
        } else {
            &request.phone
        };
        validation::user_identifier(request.email.as_deref(), contact)
    }

    fn pending_record(request: &ElectricityPurchase) -> ElectricityTransaction {
        ElectricityTransaction {
            meta: TransactionMeta::pending(
                request.request_id.clone(),
                request.amount.clone(),
                Self::user_identifier(request),
                describe(&["Electricity", &request.disco_type]),
            ),
            disco_type: request.disco_type.clone(),
            meter_number: request.meter_number.trim().to_string(),
            meter_type: request.meter_type.to_lowercase(),
            phone: request.phone.clone(),
            email: request.email.clone(),
            product: String::new(),
            bill_generated: String::new(),
            order_id: None,
            token: None,
        }
    }

    fn map(
        raw: &RawResponse<ElectricityDetails>,
        request: &ElectricityPurchase,
    ) -> Result<ElectricityTransaction, MappingError> {
        map(raw, request)
    }
}
