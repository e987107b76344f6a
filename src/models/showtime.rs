use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{CinemaId, MovieId, ShowtimeId};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Showtime {
    pub id: ShowtimeId,
    pub movie_id: MovieId,
    pub cinema_id: CinemaId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Price in cents before any seat category premium.
    pub base_price: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Showtime {
    /// Half-open interval check, so back-to-back screenings do not collide.
    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time
    }

    pub fn has_started(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewShowtime {
    pub movie_id: MovieId,
    pub cinema_id: CinemaId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub base_price: i64,
}

impl NewShowtime {
    pub fn validate_times(&self) -> Result<(), String> {
        if self.start_time >= self.end_time {
            return Err("showtime must end after it starts".to_string());
        }
        if self.base_price < 0 {
            return Err("base price must not be negative".to_string());
        }
        Ok(())
    }
}
