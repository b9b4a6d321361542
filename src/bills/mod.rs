//! Bill purchase domain: canonical records, provider response mapping and
//! the purchase handler shared by every bill family.
//!
//! Each family module pairs a purchase request, the provider's detail block,
//! the canonical record and a pure `map` function, and ties them together
//! with a [`BillService`] implementation.

pub mod airtime;
pub mod data;
pub mod education;
pub mod electricity;
pub mod handler;
pub mod mapper;
pub mod raw;
pub mod tv;
pub mod types;
pub mod validation;

pub use airtime::{AirtimePurchase, AirtimeService, AirtimeTransaction};
pub use data::{DataPurchase, DataService, DataTransaction};
pub use education::{EducationPurchase, EducationService, EducationTransaction};
pub use electricity::{ElectricityPurchase, ElectricityService, ElectricityTransaction};
pub use handler::{PurchaseHandler, PurchaseOutcome, StatusUpdateTarget};
pub use mapper::MappingError;
pub use raw::{RawResponse, TransactionDetails};
pub use tv::{TvPurchase, TvService, TvTransaction};
pub use types::{BillRecord, StatusUpdate, TransactionMeta, TransactionStatus};

use crate::error::ValidationError;
use bigdecimal::BigDecimal;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

/// Product categories, each persisted in its own table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillFamily {
    Electricity,
    Data,
    Airtime,
    Education,
    Tv,
}

impl BillFamily {
    pub const ALL: [BillFamily; 5] = [
        BillFamily::Electricity,
        BillFamily::Data,
        BillFamily::Airtime,
        BillFamily::Education,
        BillFamily::Tv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BillFamily::Electricity => "electricity",
            BillFamily::Data => "data",
            BillFamily::Airtime => "airtime",
            BillFamily::Education => "education",
            BillFamily::Tv => "tv",
        }
    }

    pub fn table_name(&self) -> &'static str {
        match self {
            BillFamily::Electricity => "electricity_transactions",
            BillFamily::Data => "data_transactions",
            BillFamily::Airtime => "airtime_transactions",
            BillFamily::Education => "education_transactions",
            BillFamily::Tv => "tv_transactions",
        }
    }

    /// Base path of the family's HTTP routes
    pub fn route_base(&self) -> &'static str {
        match self {
            BillFamily::Electricity => "/api/v1/electric-bill",
            BillFamily::Data => "/api/v1/data",
            BillFamily::Airtime => "/api/v1/airtime",
            BillFamily::Education => "/api/v1/edu",
            BillFamily::Tv => "/api/v1/tvsub",
        }
    }
}

impl fmt::Display for BillFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything the handler, store and provider client need to know about one
/// bill family.
pub trait BillService: Send + Sync + 'static {
    type Request: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static;
    type Details: TransactionDetails + fmt::Debug + DeserializeOwned + Send + Sync + 'static;
    type Record: BillRecord;

    const FAMILY: BillFamily;

    /// Reject malformed requests before anything is stored or dispatched.
    fn validate(request: &Self::Request) -> Result<(), ValidationError>;

    fn request_id(request: &Self::Request) -> &str;

    fn requested_amount(request: &Self::Request) -> &BigDecimal;

    fn user_identifier(request: &Self::Request) -> String;

    /// The record persisted before the provider is called.
    fn pending_record(request: &Self::Request) -> Self::Record;

    /// Translate the provider's answer. The request supplies the context the
    /// response lacks, such as the variation the customer picked.
    fn map(
        raw: &RawResponse<Self::Details>,
        request: &Self::Request,
    ) -> Result<Self::Record, MappingError>;

    /// The auditable record left behind when the provider call or mapping failed.
    fn failed_record(request: &Self::Request) -> Self::Record {
        let mut record = Self::pending_record(request);
        record.meta_mut().status = TransactionStatus::Failed;
        record
    }
}
