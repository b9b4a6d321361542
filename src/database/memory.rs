//! In-process stores used when `SKIP_EXTERNALS` is set and in tests

use crate::bills::types::reconcile;
use crate::bills::BillRecord;
use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::repository::{
    Insertion, Message, MessageSink, TransactionRepository, User, UserRepository,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct Rows<R> {
    /// Insertion order doubles as the listing order
    records: Vec<R>,
    by_request_id: HashMap<String, usize>,
}

pub struct InMemoryTransactionRepository<R> {
    rows: RwLock<Rows<R>>,
}

impl<R: BillRecord> InMemoryTransactionRepository<R> {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Rows {
                records: Vec::new(),
                by_request_id: HashMap::new(),
            }),
        }
    }

    pub async fn len(&self) -> usize {
        self.rows.read().await.records.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<R: BillRecord> Default for InMemoryTransactionRepository<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: BillRecord> TransactionRepository<R> for InMemoryTransactionRepository<R> {
    async fn save(&self, record: &R) -> DbResult<R> {
        let mut rows = self.rows.write().await;

        match rows.by_request_id.get(record.request_id()).copied() {
            Some(index) => {
                let merged = reconcile(rows.records[index].clone(), record.clone());
                rows.records[index] = merged.clone();
                Ok(merged)
            }
            None => {
                let index = rows.records.len();
                rows.records.push(record.clone());
                rows.by_request_id
                    .insert(record.request_id().to_string(), index);
                Ok(record.clone())
            }
        }
    }

    async fn insert_if_absent(&self, record: &R) -> DbResult<Insertion<R>> {
        let mut rows = self.rows.write().await;

        if let Some(index) = rows.by_request_id.get(record.request_id()) {
            return Ok(Insertion::Existing(rows.records[*index].clone()));
        }

        let index = rows.records.len();
        rows.records.push(record.clone());
        rows.by_request_id
            .insert(record.request_id().to_string(), index);
        Ok(Insertion::Created(record.clone()))
    }

    async fn get_by_id(&self, id: &str) -> DbResult<R> {
        let rows = self.rows.read().await;

        if let Some(index) = rows.by_request_id.get(id) {
            return Ok(rows.records[*index].clone());
        }

        rows.records
            .iter()
            .find(|record| {
                let transaction_id = &record.meta().transaction_id;
                !transaction_id.is_empty() && transaction_id == id
            })
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("Transaction", id))
    }

    async fn list_by_user(&self, user_identifier: &str) -> DbResult<Vec<R>> {
        let rows = self.rows.read().await;
        Ok(rows
            .records
            .iter()
            .filter(|record| record.meta().user_identifier == user_identifier)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

impl InMemoryUserRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn save_user(&self, user: &User) -> DbResult<()> {
        let mut users = self.users.write().await;
        let key = user.email.to_lowercase();
        if users.contains_key(&key) {
            return Err(DatabaseError::new(
                DatabaseErrorKind::UniqueConstraintViolation {
                    column: "email".to_string(),
                    value: user.email.clone(),
                },
            ));
        }
        users.insert(key, user.clone());
        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<User> {
        self.users
            .read()
            .await
            .get(&email.to_lowercase())
            .cloned()
            .ok_or_else(|| DatabaseError::not_found("User", email))
    }
}

#[derive(Default)]
pub struct InMemoryMessageSink {
    messages: RwLock<Vec<Message>>,
}

impl InMemoryMessageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.messages.read().await.clone()
    }
}

#[async_trait]
impl MessageSink for InMemoryMessageSink {
    async fn create_message(&self, message: &Message) -> DbResult<()> {
        self.messages.write().await.push(message.clone());
        Ok(())
    }
}
