//! Customer profiles

use crate::bills::validation;
use crate::database::repository::{User, UserRepository};
use crate::error::{AppError, AppResult, ValidationError};
use crate::middleware::error::success_response;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

type UserState = Arc<dyn UserRepository>;

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    #[serde(alias = "fullName")]
    pub full_name: String,
    #[serde(default)]
    pub phone: Option<String>,
}

impl CreateUserRequest {
    fn validate(&self) -> Result<(), ValidationError> {
        validation::require("email", &self.email)?;
        validation::validate_optional_email(Some(&self.email))?;
        validation::require("full_name", &self.full_name)?;
        if let Some(phone) = self.phone.as_deref().filter(|p| !p.trim().is_empty()) {
            validation::validate_phone("phone", phone)?;
        }
        Ok(())
    }
}

/// POST /api/v1/users
async fn create_user(
    State(users): State<UserState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(request) = body.map_err(|rejection| {
        AppError::from(ValidationError::InvalidFormat {
            field: "body".to_string(),
            reason: rejection.body_text(),
        })
    })?;
    request.validate()?;

    let user = User::new(
        request.email.trim(),
        request.full_name.trim(),
        request.phone.filter(|p| !p.trim().is_empty()),
    );
    users.save_user(&user).await?;
    info!(user_id = %user.id, "User created");

    Ok((StatusCode::CREATED, success_response(user)).into_response())
}

/// GET /api/v1/users/{email}
async fn get_user(
    State(users): State<UserState>,
    Path(email): Path<String>,
) -> AppResult<Response> {
    let user = users.get_user_by_email(&email).await?;
    Ok(success_response(user).into_response())
}

pub fn routes(users: UserState) -> Router {
    Router::new()
        .route("/api/v1/users", post(create_user))
        .route("/api/v1/users/{email}", get(get_user))
        .with_state(users)
}
