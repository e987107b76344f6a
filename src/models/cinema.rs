use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::CinemaId;

/// A showroom of the cinema. Seats are configured once per showroom and
/// shared by every showtime scheduled in it.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Cinema {
    pub id: CinemaId,
    pub showroom: String,
    pub capacity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
