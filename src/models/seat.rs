use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{CinemaId, SeatId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatCategory {
    Standard,
    Vip,
    SuperVip,
    Couple,
}

impl SeatCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatCategory::Standard => "standard",
            SeatCategory::Vip => "vip",
            SeatCategory::SuperVip => "super_vip",
            SeatCategory::Couple => "couple",
        }
    }
}

impl fmt::Display for SeatCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SeatCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(SeatCategory::Standard),
            "vip" => Ok(SeatCategory::Vip),
            "super_vip" => Ok(SeatCategory::SuperVip),
            "couple" => Ok(SeatCategory::Couple),
            other => Err(format!("unknown seat category {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub cinema_id: CinemaId,
    pub label: String,
    pub category: SeatCategory,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSeat {
    pub cinema_id: CinemaId,
    pub label: String,
    pub category: SeatCategory,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_names_match_storage_format() {
        for category in [
            SeatCategory::Standard,
            SeatCategory::Vip,
            SeatCategory::SuperVip,
            SeatCategory::Couple,
        ] {
            assert_eq!(category.as_str().parse::<SeatCategory>(), Ok(category));
        }
        assert_eq!(
            serde_json::to_string(&SeatCategory::SuperVip).unwrap(),
            "\"super_vip\""
        );
        assert!("balcony".parse::<SeatCategory>().is_err());
    }
}
