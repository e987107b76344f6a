use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use uuid::Uuid;

use crate::models::{CinemaId, SeatId, ShowtimeId};

pub type BookingResult<T> = Result<T, BookingError>;

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("seat {seat_id} is not available for showtime {showtime_id}")]
    SeatUnavailable { showtime_id: ShowtimeId, seat_id: SeatId },

    #[error("reservation {0} has expired")]
    ReservationExpired(Uuid),

    #[error("seat {seat_id} already has a confirmed booking for showtime {showtime_id}")]
    DuplicateBooking { showtime_id: ShowtimeId, seat_id: SeatId },

    #[error("unknown showtime {0}")]
    UnknownShowtime(ShowtimeId),

    #[error("unknown seat {0}")]
    UnknownSeat(SeatId),

    #[error("unknown movie {0}")]
    UnknownMovie(i64),

    #[error("unknown cinema {0}")]
    UnknownCinema(CinemaId),

    #[error("unknown user {0}")]
    UnknownUser(i64),

    #[error("unknown booking {0}")]
    UnknownBooking(i64),

    #[error("unknown reservation {0}")]
    UnknownReservation(Uuid),

    #[error("showtime overlaps showtime {conflicting} in cinema {cinema_id}")]
    Overlap { cinema_id: CinemaId, conflicting: ShowtimeId },

    #[error("reservation {token} is {state} and can no longer change")]
    ReservationClosed { token: Uuid, state: &'static str },

    #[error("reservation {0} is already being confirmed")]
    ReservationBusy(Uuid),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl BookingError {
    /// Errors the client can fix by retrying with another seat or a fresh hold.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BookingError::SeatUnavailable { .. }
                | BookingError::ReservationExpired(_)
                | BookingError::ReservationBusy(_)
        )
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            BookingError::SeatUnavailable { .. }
            | BookingError::Overlap { .. }
            | BookingError::ReservationBusy(_) => StatusCode::CONFLICT,
            BookingError::ReservationExpired(_) | BookingError::ReservationClosed { .. } => {
                StatusCode::GONE
            }
            BookingError::UnknownShowtime(_)
            | BookingError::UnknownSeat(_)
            | BookingError::UnknownMovie(_)
            | BookingError::UnknownCinema(_)
            | BookingError::UnknownUser(_)
            | BookingError::UnknownBooking(_)
            | BookingError::UnknownReservation(_) => StatusCode::NOT_FOUND,
            BookingError::Forbidden(_) => StatusCode::FORBIDDEN,
            BookingError::Validation(_) => StatusCode::BAD_REQUEST,
            BookingError::DuplicateBooking { .. }
            | BookingError::Database(_)
            | BookingError::Redis(_)
            | BookingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<validator::ValidationErrors> for BookingError {
    fn from(errors: validator::ValidationErrors) -> Self {
        BookingError::Validation(errors.to_string())
    }
}

impl IntoResponse for BookingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("request failed: {}", self);
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
