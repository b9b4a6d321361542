//! Canonical transaction model shared by every bill family

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a purchase. Only `Pending` may change, and only once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Success => "success",
            TransactionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransactionStatus::Pending)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(TransactionStatus::Pending),
            "success" => Ok(TransactionStatus::Success),
            "failed" => Ok(TransactionStatus::Failed),
            other => Err(format!("unknown transaction status '{}'", other)),
        }
    }
}

/// Fields every family's record carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionMeta {
    /// Client-supplied idempotency key
    pub request_id: String,
    /// Provider-assigned id; empty until the provider answers
    #[serde(default)]
    pub transaction_id: String,
    pub status: TransactionStatus,
    pub amount: BigDecimal,
    /// E-mail when the purchaser gave one, otherwise the phone number
    pub user_identifier: String,
    pub product_descriptor: String,
    /// Transaction date as reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_date: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionMeta {
    /// A fresh record that has not reached the provider yet.
    pub fn pending(
        request_id: impl Into<String>,
        amount: BigDecimal,
        user_identifier: impl Into<String>,
        product_descriptor: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            request_id: request_id.into(),
            transaction_id: String::new(),
            status: TransactionStatus::Pending,
            amount,
            user_identifier: user_identifier.into(),
            product_descriptor: product_descriptor.into(),
            provider_date: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A family-specific canonical record.
pub trait BillRecord:
    Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    fn meta(&self) -> &TransactionMeta;
    fn meta_mut(&mut self) -> &mut TransactionMeta;

    fn request_id(&self) -> &str {
        &self.meta().request_id
    }

    fn status(&self) -> TransactionStatus {
        self.meta().status
    }
}

/// A provider-reported status change for an existing purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub request_id: String,
    pub status: TransactionStatus,
    pub transaction_id: Option<String>,
}

/// Fold a later write for the same request id into the stored record.
///
/// A terminal record is returned untouched. A pending record takes the
/// incoming content once the incoming write is terminal; `request_id`,
/// `created_at` and an already assigned `transaction_id` always survive.
pub fn reconcile<R: BillRecord>(stored: R, incoming: R) -> R {
    let current = stored.meta();
    if current.status.is_terminal() {
        return stored;
    }

    let request_id = current.request_id.clone();
    let created_at = current.created_at;
    let transaction_id = if current.transaction_id.is_empty() {
        incoming.meta().transaction_id.clone()
    } else {
        current.transaction_id.clone()
    };

    let mut merged = if incoming.meta().status.is_terminal() {
        incoming
    } else {
        stored
    };

    let meta = merged.meta_mut();
    meta.request_id = request_id;
    meta.created_at = created_at;
    meta.transaction_id = transaction_id;
    meta.updated_at = Utc::now();
    merged
}

/// Implements [`BillRecord`] for a record struct with a `meta` field.
macro_rules! impl_bill_record {
    ($record:ty) => {
        impl $crate::bills::types::BillRecord for $record {
            fn meta(&self) -> &$crate::bills::types::TransactionMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut $crate::bills::types::TransactionMeta {
                &mut self.meta
            }
        }
    };
}

pub(crate) use impl_bill_record;
