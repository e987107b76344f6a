use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{SeatCategory, ShowtimeId};

/// Percentage premium for a seat category. A rule without a showtime is the
/// cinema-wide default for that category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingRule {
    pub id: i64,
    pub showtime_id: Option<ShowtimeId>,
    pub category: SeatCategory,
    pub premium_percentage: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
