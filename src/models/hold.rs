use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

/// Hold state of one (showtime, seat) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatHold {
    Free,
    Held { token: Uuid, expires_at: Instant },
    Confirmed { token: Uuid },
}

impl Default for SeatHold {
    fn default() -> Self {
        SeatHold::Free
    }
}

impl SeatHold {
    /// State as seen at `now`; a lapsed hold reads as free even before the
    /// sweep has reclaimed it.
    pub fn state_at(&self, now: Instant) -> HoldState {
        match self {
            SeatHold::Free => HoldState::Free,
            SeatHold::Held { expires_at, .. } if *expires_at <= now => HoldState::Free,
            SeatHold::Held { .. } => HoldState::Held,
            SeatHold::Confirmed { .. } => HoldState::Confirmed,
        }
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        matches!(self, SeatHold::Held { expires_at, .. } if *expires_at <= now)
    }

    pub fn is_held_by(&self, holder: Uuid, now: Instant) -> bool {
        matches!(self, SeatHold::Held { token, expires_at } if *token == holder && *expires_at > now)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldState {
    Free,
    Held,
    Confirmed,
}
