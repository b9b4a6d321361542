//! Storage seams shared by the Postgres and in-memory backends

use crate::bills::BillRecord;
use crate::database::error::DbResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What [`TransactionRepository::insert_if_absent`] found.
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion<R> {
    /// The record was written; the caller owns this request id.
    Created(R),
    /// A row already held this request id and was left untouched.
    Existing(R),
}

/// Durable store for one bill family's transactions.
///
/// `save` is keyed by the record's `request_id`: a second save for the same
/// key is folded into the stored row with [`crate::bills::types::reconcile`],
/// and the stored (possibly unchanged) record is returned.
#[async_trait]
pub trait TransactionRepository<R: BillRecord>: Send + Sync {
    async fn save(&self, record: &R) -> DbResult<R>;

    /// Write `record` only if its `request_id` is new. Exactly one of any
    /// number of concurrent callers sees `Created`.
    async fn insert_if_absent(&self, record: &R) -> DbResult<Insertion<R>>;

    /// Look up by `request_id`, falling back to the provider `transaction_id`.
    async fn get_by_id(&self, id: &str) -> DbResult<R>;

    /// Every transaction for a user, oldest first.
    async fn list_by_user(&self, user_identifier: &str) -> DbResult<Vec<R>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, full_name: impl Into<String>, phone: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            email: email.into(),
            full_name: full_name.into(),
            phone,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn save_user(&self, user: &User) -> DbResult<()>;
    async fn get_user_by_email(&self, email: &str) -> DbResult<User>;
}

/// An outbound customer message, queued for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(
        recipient: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipient: recipient.into(),
            subject: subject.into(),
            body: body.into(),
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait MessageSink: Send + Sync {
    async fn create_message(&self, message: &Message) -> DbResult<()>;
}
