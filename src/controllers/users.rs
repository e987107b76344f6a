use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::BookingError;
use crate::models::NewUser;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/users", post(register))
}

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 150))]
    pub username: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub full_name: String,
}

// POST /api/users
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;

    let cost = state.config.auth.password_hash_cost;
    let RegisterRequest {
        username,
        email,
        password,
        full_name,
    } = req;
    let new_user = tokio::task::spawn_blocking(move || {
        NewUser::with_password(username, email, &password, full_name, cost)
    })
    .await
    .map_err(|e| BookingError::Internal(e.to_string()))?
    .map_err(|e| BookingError::Internal(e.to_string()))?;

    let user = state.catalog.create_user(new_user).await?;
    info!("User {} registered as {}", user.id, user.username);

    Ok((StatusCode::CREATED, Json(user)))
}
