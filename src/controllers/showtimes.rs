use axum::{
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::error::BookingError;
use crate::models::ShowtimeId;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/showtimes", get(list_showtimes))
        .route("/showtimes/{id}/seats", get(seat_map))
        .route("/showtimes/{id}/seats/available", get(available_seats))
}

// GET /api/showtimes - только сеансы, где ещё есть места
async fn list_showtimes(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.engine.bookable_showtimes().await?))
}

// GET /api/showtimes/{id}/seats
async fn seat_map(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<ShowtimeId>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.engine.seat_map(showtime_id).await?))
}

// GET /api/showtimes/{id}/seats/available
async fn available_seats(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<ShowtimeId>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(state.engine.list_available(showtime_id).await?))
}
