use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use crate::database::repository::{Message, MessageSink, User, UserRepository};
use async_trait::async_trait;
use sqlx::{FromRow, PgPool};

#[derive(Debug, FromRow)]
struct UserRow {
    id: uuid::Uuid,
    email: String,
    full_name: String,
    phone: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            email: row.email,
            full_name: row.full_name,
            phone: row.phone,
            created_at: row.created_at,
        }
    }
}

/// Repository for customer accounts
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn save_user(&self, user: &User) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO users (id, email, full_name, phone, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            let err = DatabaseError::from_sqlx(e);
            if matches!(err.kind, DatabaseErrorKind::UniqueConstraintViolation { .. }) {
                // Report the email rather than the constraint name
                DatabaseError::new(DatabaseErrorKind::UniqueConstraintViolation {
                    column: "email".to_string(),
                    value: user.email.clone(),
                })
            } else {
                err
            }
        })?;

        Ok(())
    }

    async fn get_user_by_email(&self, email: &str) -> DbResult<User> {
        sqlx::query_as::<_, UserRow>(
            "SELECT id, email, full_name, phone, created_at
             FROM users WHERE lower(email) = lower($1)",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?
        .map(User::from)
        .ok_or_else(|| DatabaseError::not_found("User", email))
    }
}

/// Outbound message queue table; delivery happens out of process.
pub struct PgMessageSink {
    pool: PgPool,
}

impl PgMessageSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessageSink for PgMessageSink {
    async fn create_message(&self, message: &Message) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO messages (id, recipient, subject, body, created_at)
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(message.id)
        .bind(&message.recipient)
        .bind(&message.subject)
        .bind(&message.body)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
