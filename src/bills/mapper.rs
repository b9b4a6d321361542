//! Rules shared by every family's response mapper
//!
//! Mapping is pure: no I/O, no clock reads beyond record timestamps, and the
//! same raw input always produces the same canonical fields.

use super::raw::{RawAmount, RawResponse, TransactionDetails};
use super::types::{StatusUpdate, TransactionStatus};
use bigdecimal::BigDecimal;
use tracing::warn;

/// Provider codes meaning "accepted"; any other code is a failed purchase.
const ACCEPTED_CODES: [&str; 2] = ["000", "099"];

/// A provider response that cannot be turned into a canonical record.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MappingError {
    #[error("provider response is missing '{0}'")]
    MissingField(&'static str),

    #[error("provider response field '{field}' has invalid value '{value}'")]
    InvalidValue { field: &'static str, value: String },
}

/// Collapse the provider's code and status text into the three canonical states.
///
/// Unknown status text is treated as a failure so it is never silently
/// reported as delivered.
pub fn normalize_status(code: Option<&str>, raw_status: &str) -> TransactionStatus {
    if let Some(code) = code {
        if !ACCEPTED_CODES.contains(&code.trim()) {
            return TransactionStatus::Failed;
        }
    }

    match raw_status.trim().to_lowercase().as_str() {
        "delivered" | "successful" | "success" | "completed" => TransactionStatus::Success,
        "pending" | "initiated" | "processing" => TransactionStatus::Pending,
        "failed" | "reversed" | "cancelled" | "canceled" => TransactionStatus::Failed,
        other => {
            warn!(raw_status = %other, "Unrecognised provider status, treating as failed");
            TransactionStatus::Failed
        }
    }
}

/// The detail block, or `MissingField` when the provider left it out.
pub fn require_details<D>(raw: &RawResponse<D>) -> Result<&D, MappingError> {
    raw.details()
        .ok_or(MappingError::MissingField("content.transactions"))
}

/// Normalized status from the envelope code and the detail block's status.
pub fn derive_status<D: TransactionDetails>(
    raw: &RawResponse<D>,
    details: &D,
) -> Result<TransactionStatus, MappingError> {
    let status = details
        .status()
        .ok_or(MappingError::MissingField("content.transactions.status"))?;
    Ok(normalize_status(raw.code.as_deref(), status))
}

/// Convert a provider amount, rejecting unparsable and negative values.
pub fn normalize_amount(
    field: &'static str,
    amount: Option<&RawAmount>,
) -> Result<BigDecimal, MappingError> {
    let raw = amount.ok_or(MappingError::MissingField(field))?;
    let value = raw.to_decimal().ok_or_else(|| MappingError::InvalidValue {
        field,
        value: raw.to_string(),
    })?;

    if value < BigDecimal::from(0) {
        return Err(MappingError::InvalidValue {
            field,
            value: raw.to_string(),
        });
    }

    Ok(value)
}

/// Provider transaction id, empty when absent.
pub fn transaction_id<D: TransactionDetails>(details: &D) -> String {
    details
        .transaction_id()
        .map(|id| id.trim().to_string())
        .unwrap_or_default()
}

/// Join descriptor parts, skipping blanks.
pub fn describe(parts: &[&str]) -> String {
    parts
        .iter()
        .map(|part| part.trim())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the status change carried by a requery answer or webhook.
pub fn status_update<D: TransactionDetails>(
    raw: &RawResponse<D>,
) -> Result<StatusUpdate, MappingError> {
    let request_id = raw
        .request_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or(MappingError::MissingField("requestId"))?;
    let details = require_details(raw)?;
    let status = derive_status(raw, details)?;
    let transaction_id = Some(transaction_id(details)).filter(|id| !id.is_empty());

    Ok(StatusUpdate {
        request_id: request_id.to_string(),
        status,
        transaction_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bills::raw::StatusDetails;
    use std::str::FromStr;

    #[test]
    fn accepted_codes_use_status_text() {
        assert_eq!(
            normalize_status(Some("000"), "delivered"),
            TransactionStatus::Success
        );
        assert_eq!(
            normalize_status(Some("000"), "Completed"),
            TransactionStatus::Success
        );
        assert_eq!(
            normalize_status(Some("099"), "pending"),
            TransactionStatus::Pending
        );
        assert_eq!(normalize_status(None, "reversed"), TransactionStatus::Failed);
    }

    #[test]
    fn rejected_code_wins_over_status_text() {
        assert_eq!(
            normalize_status(Some("016"), "delivered"),
            TransactionStatus::Failed
        );
    }

    #[test]
    fn unknown_status_is_failed() {
        assert_eq!(
            normalize_status(Some("000"), "on-hold"),
            TransactionStatus::Failed
        );
        assert_eq!(normalize_status(Some("000"), ""), TransactionStatus::Failed);
    }

    #[test]
    fn negative_amounts_are_rejected() {
        let err = normalize_amount("amount", Some(&RawAmount::Int(-5))).unwrap_err();
        assert_eq!(
            err,
            MappingError::InvalidValue {
                field: "amount",
                value: "-5".to_string()
            }
        );
        assert_eq!(
            normalize_amount("amount", None).unwrap_err(),
            MappingError::MissingField("amount")
        );
        assert_eq!(
            normalize_amount("amount", Some(&RawAmount::Text("250.50".to_string()))).unwrap(),
            BigDecimal::from_str("250.50").unwrap()
        );
    }

    #[test]
    fn describe_skips_blank_parts() {
        assert_eq!(describe(&["Prepaid Token", " ", "IKEDC"]), "Prepaid Token IKEDC");
        assert_eq!(describe(&["", ""]), "");
    }

    #[test]
    fn status_update_from_webhook_payload() {
        let raw: RawResponse<StatusDetails> = serde_json::from_value(serde_json::json!({
            "code": "000",
            "requestId": "req-7",
            "content": { "transactions": { "status": "delivered", "transactionId": "1700" } }
        }))
        .unwrap();

        let update = status_update(&raw).unwrap();
        assert_eq!(update.request_id, "req-7");
        assert_eq!(update.status, TransactionStatus::Success);
        assert_eq!(update.transaction_id.as_deref(), Some("1700"));
    }

    #[test]
    fn status_update_requires_request_id() {
        let raw: RawResponse<StatusDetails> = serde_json::from_value(serde_json::json!({
            "code": "000",
            "content": { "transactions": { "status": "delivered" } }
        }))
        .unwrap();

        assert_eq!(
            status_update(&raw).unwrap_err(),
            MappingError::MissingField("requestId")
        );
    }
}
