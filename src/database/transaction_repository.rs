use crate::bills::types::reconcile;
use crate::bills::{BillFamily, BillRecord};
use crate::database::error::{DatabaseError, DbResult};
use crate::database::repository::{Insertion, TransactionRepository};
use async_trait::async_trait;
use sqlx::PgPool;
use std::marker::PhantomData;
use tracing::debug;

/// Postgres-backed transaction store, one table per bill family.
///
/// The indexed columns mirror the common record fields; the full
/// family-specific record lives in the `payload` JSONB column.
pub struct PgTransactionRepository<R> {
    pool: PgPool,
    family: BillFamily,
    _record: PhantomData<fn() -> R>,
}

impl<R: BillRecord> PgTransactionRepository<R> {
    pub fn new(pool: PgPool, family: BillFamily) -> Self {
        Self {
            pool,
            family,
            _record: PhantomData,
        }
    }

    fn table(&self) -> &'static str {
        self.family.table_name()
    }

    fn decode(payload: serde_json::Value) -> DbResult<R> {
        serde_json::from_value(payload).map_err(DatabaseError::from_json)
    }
}

#[async_trait]
impl<R: BillRecord> TransactionRepository<R> for PgTransactionRepository<R> {
    async fn save(&self, record: &R) -> DbResult<R> {
        let meta = record.meta();
        let payload = serde_json::to_value(record).map_err(DatabaseError::from_json)?;

        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        let inserted: Option<(i64,)> = sqlx::query_as(&format!(
            "INSERT INTO {}
             (request_id, transaction_id, status, amount, user_identifier,
              product_descriptor, payload, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (request_id) DO NOTHING
             RETURNING id",
            self.table()
        ))
        .bind(&meta.request_id)
        .bind(&meta.transaction_id)
        .bind(meta.status.as_str())
        .bind(&meta.amount)
        .bind(&meta.user_identifier)
        .bind(&meta.product_descriptor)
        .bind(&payload)
        .bind(meta.created_at)
        .bind(meta.updated_at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if inserted.is_some() {
            tx.commit().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(record.clone());
        }

        // The row exists: lock it so concurrent writers reconcile one at a time.
        let (stored_payload,): (serde_json::Value,) = sqlx::query_as(&format!(
            "SELECT payload FROM {} WHERE request_id = $1 FOR UPDATE",
            self.table()
        ))
        .bind(&meta.request_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        let stored = Self::decode(stored_payload)?;
        if stored.status().is_terminal() {
            debug!(
                family = %self.family,
                request_id = %meta.request_id,
                "Stored transaction is terminal, write ignored"
            );
            tx.commit().await.map_err(DatabaseError::from_sqlx)?;
            return Ok(stored);
        }

        let merged = reconcile(stored, record.clone());
        let merged_meta = merged.meta();
        let merged_payload = serde_json::to_value(&merged).map_err(DatabaseError::from_json)?;

        sqlx::query(&format!(
            "UPDATE {}
             SET transaction_id = $2, status = $3, amount = $4, user_identifier = $5,
                 product_descriptor = $6, payload = $7, updated_at = $8
             WHERE request_id = $1",
            self.table()
        ))
        .bind(&merged_meta.request_id)
        .bind(&merged_meta.transaction_id)
        .bind(merged_meta.status.as_str())
        .bind(&merged_meta.amount)
        .bind(&merged_meta.user_identifier)
        .bind(&merged_meta.product_descriptor)
        .bind(&merged_payload)
        .bind(merged_meta.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(merged)
    }

    async fn insert_if_absent(&self, record: &R) -> DbResult<Insertion<R>> {
        let meta = record.meta();
        let payload = serde_json::to_value(record).map_err(DatabaseError::from_json)?;

        let inserted: Option<(i64,)> = sqlx::query_as(&format!(
            "INSERT INTO {}
             (request_id, transaction_id, status, amount, user_identifier,
              product_descriptor, payload, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             ON CONFLICT (request_id) DO NOTHING
             RETURNING id",
            self.table()
        ))
        .bind(&meta.request_id)
        .bind(&meta.transaction_id)
        .bind(meta.status.as_str())
        .bind(&meta.amount)
        .bind(&meta.user_identifier)
        .bind(&meta.product_descriptor)
        .bind(&payload)
        .bind(meta.created_at)
        .bind(meta.updated_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        if inserted.is_some() {
            return Ok(Insertion::Created(record.clone()));
        }

        let (stored_payload,): (serde_json::Value,) = sqlx::query_as(&format!(
            "SELECT payload FROM {} WHERE request_id = $1",
            self.table()
        ))
        .bind(&meta.request_id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(Insertion::Existing(Self::decode(stored_payload)?))
    }

    async fn get_by_id(&self, id: &str) -> DbResult<R> {
        let row: Option<(serde_json::Value,)> = sqlx::query_as(&format!(
            "SELECT payload FROM {}
             WHERE request_id = $1 OR (transaction_id <> '' AND transaction_id = $1)
             ORDER BY (request_id = $1) DESC
             LIMIT 1",
            self.table()
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        match row {
            Some((payload,)) => Self::decode(payload),
            None => Err(DatabaseError::not_found("Transaction", id)),
        }
    }

    async fn list_by_user(&self, user_identifier: &str) -> DbResult<Vec<R>> {
        let rows: Vec<(serde_json::Value,)> = sqlx::query_as(&format!(
            "SELECT payload FROM {} WHERE user_identifier = $1 ORDER BY id",
            self.table()
        ))
        .bind(user_identifier)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter()
            .map(|(payload,)| Self::decode(payload))
            .collect()
    }
}
