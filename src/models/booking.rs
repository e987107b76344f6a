use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::{BookingId, SeatCategory, SeatId, ShowtimeId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Confirmed,
    Cancelled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "confirmed" => Ok(BookingStatus::Confirmed),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => Err(format!("unknown booking status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub showtime_id: ShowtimeId,
    pub seat_id: SeatId,
    pub user_id: UserId,
    pub reservation_token: Uuid,
    /// Price in cents, fixed at confirmation time.
    pub confirmed_price: i64,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn is_confirmed(&self) -> bool {
        self.status == BookingStatus::Confirmed
    }
}

/// A booking about to be written to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBooking {
    pub showtime_id: ShowtimeId,
    pub seat_id: SeatId,
    pub user_id: UserId,
    pub reservation_token: Uuid,
    pub confirmed_price: i64,
}

/// What the customer sees on their ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub booking_id: BookingId,
    pub status: BookingStatus,
    pub showtime_id: ShowtimeId,
    pub movie_title: String,
    pub showroom: String,
    pub starts_at: DateTime<Utc>,
    pub seat_label: String,
    pub seat_category: SeatCategory,
    pub price: i64,
    pub booked_at: DateTime<Utc>,
}
