use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::engine::HoldRequest;
use crate::error::BookingError;
use crate::middleware::AuthUser;
use crate::models::{SeatId, ShowtimeId};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", post(hold_seats))
        .route(
            "/reservations/{token}",
            get(get_reservation).delete(cancel_reservation),
        )
        .route("/reservations/{token}/confirm", post(confirm_reservation))
}

#[derive(Debug, Deserialize, Validate)]
pub struct HoldSeatsRequest {
    #[validate(range(min = 1))]
    pub showtime_id: ShowtimeId,
    #[validate(length(min = 1))]
    pub seat_ids: Vec<SeatId>,
    #[validate(range(min = 1))]
    pub ttl_seconds: Option<u64>,
}

// POST /api/reservations
async fn hold_seats(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Json(req): Json<HoldSeatsRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;

    let receipt = state
        .engine
        .hold(HoldRequest {
            showtime_id: req.showtime_id,
            user_id: user.user_id,
            seat_ids: req.seat_ids,
            ttl: req.ttl_seconds.map(Duration::from_secs),
        })
        .await?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

// GET /api/reservations/{token}
async fn get_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.engine.reservation_for(token, user.user_id)?))
}

// POST /api/reservations/{token}/confirm
async fn confirm_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    state.engine.reservation_for(token, user.user_id)?;
    Ok(Json(state.engine.confirm(token).await?))
}

// DELETE /api/reservations/{token}
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(token): Path<Uuid>,
) -> Result<impl IntoResponse, BookingError> {
    state.engine.cancel_reservation(token, user.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
