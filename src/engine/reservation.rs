use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;
use uuid::Uuid;

use crate::models::{BookingId, HoldState, Seat, SeatId, Showtime, ShowtimeId, UserId};

/// Lifecycle of one booking attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationState {
    Initiated,
    Held,
    Confirming,
    Confirmed,
    Released,
    Rejected,
}

impl ReservationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationState::Initiated => "initiated",
            ReservationState::Held => "held",
            ReservationState::Confirming => "confirming",
            ReservationState::Confirmed => "confirmed",
            ReservationState::Released => "released",
            ReservationState::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationState::Confirmed | ReservationState::Released | ReservationState::Rejected
        )
    }
}

impl fmt::Display for ReservationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Reservation {
    pub token: Uuid,
    pub showtime_id: ShowtimeId,
    pub user_id: UserId,
    /// Ascending; this is also the acquisition order.
    pub seat_ids: Vec<SeatId>,
    pub state: ReservationState,
    pub expires_at: Instant,
    pub expires_at_utc: DateTime<Utc>,
    pub booking_ids: Vec<BookingId>,
    pub closed_at: Option<Instant>,
}

impl Reservation {
    pub(crate) fn close(&mut self, state: ReservationState, now: Instant) {
        self.state = state;
        self.closed_at = Some(now);
    }

    pub fn view(&self) -> ReservationView {
        ReservationView {
            token: self.token,
            showtime_id: self.showtime_id,
            user_id: self.user_id,
            seat_ids: self.seat_ids.clone(),
            state: self.state,
            expires_at: self.expires_at_utc,
            booking_ids: self.booking_ids.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HoldRequest {
    pub showtime_id: ShowtimeId,
    pub user_id: UserId,
    pub seat_ids: Vec<SeatId>,
    /// Falls back to the configured hold TTL.
    pub ttl: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldReceipt {
    pub token: Uuid,
    pub showtime_id: ShowtimeId,
    pub seat_ids: Vec<SeatId>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReservationView {
    pub token: Uuid,
    pub showtime_id: ShowtimeId,
    pub user_id: UserId,
    pub seat_ids: Vec<SeatId>,
    pub state: ReservationState,
    pub expires_at: DateTime<Utc>,
    pub booking_ids: Vec<BookingId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeatStatus {
    #[serde(flatten)]
    pub seat: Seat,
    pub state: HoldState,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShowtimeListing {
    #[serde(flatten)]
    pub showtime: Showtime,
    pub movie_title: String,
    pub showroom: String,
    pub available_seats: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired_holds: usize,
    pub released_reservations: usize,
    pub purged_reservations: usize,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired_holds == 0 && self.released_reservations == 0 && self.purged_reservations == 0
    }
}
