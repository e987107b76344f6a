use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use super::SeatInventory;
use crate::error::{BookingError, BookingResult};
use crate::models::{HoldState, SeatHold, SeatId, ShowtimeId};

type SlotKey = (ShowtimeId, SeatId);
type Slot = Arc<Mutex<SeatHold>>;

/// In-process seat inventory.
///
/// The outer map is only locked to find or create a slot; each transition
/// then runs under that slot's own mutex, so unrelated seats never contend.
#[derive(Default)]
pub struct MemorySeatInventory {
    slots: RwLock<HashMap<SlotKey, Slot>>,
}

fn lock(slot: &Slot) -> MutexGuard<'_, SeatHold> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemorySeatInventory {
    pub fn new() -> Self {
        Self::default()
    }

    fn existing_slot(&self, key: SlotKey) -> Option<Slot> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    /// Slots are created lazily on first touch, starting FREE.
    fn slot(&self, key: SlotKey) -> Slot {
        if let Some(slot) = self.existing_slot(key) {
            return slot;
        }
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone()
    }

    fn snapshot(&self) -> Vec<Slot> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Drops FREE slots nobody else references. Under the write lock no new
    /// clone can appear, and a slot some caller still holds has a strong
    /// count above one and is kept.
    fn prune_free_slots(&self) -> usize {
        let mut slots = self.slots.write().unwrap_or_else(PoisonError::into_inner);
        let before = slots.len();
        slots.retain(|_, slot| {
            Arc::strong_count(slot) > 1 || !matches!(*lock(slot), SeatHold::Free)
        });
        before - slots.len()
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.slots.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

#[async_trait]
impl SeatInventory for MemorySeatInventory {
    async fn list_available(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatId],
    ) -> BookingResult<Vec<SeatId>> {
        let now = Instant::now();
        Ok(seats
            .iter()
            .copied()
            .filter(|seat_id| match self.existing_slot((showtime_id, *seat_id)) {
                Some(slot) => lock(&slot).state_at(now) == HoldState::Free,
                None => true,
            })
            .collect())
    }

    async fn try_hold(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
        ttl: Duration,
    ) -> BookingResult<()> {
        let slot = self.slot((showtime_id, seat_id));
        let mut hold = lock(&slot);
        let now = Instant::now();
        if hold.state_at(now) != HoldState::Free {
            return Err(BookingError::SeatUnavailable {
                showtime_id,
                seat_id,
            });
        }
        *hold = SeatHold::Held {
            token,
            expires_at: now + ttl,
        };
        Ok(())
    }

    async fn release(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        let Some(slot) = self.existing_slot((showtime_id, seat_id)) else {
            return Ok(false);
        };
        let mut hold = lock(&slot);
        match *hold {
            SeatHold::Held { token: holder, .. } if holder == token => {
                *hold = SeatHold::Free;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn confirm(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<()> {
        let slot = self
            .existing_slot((showtime_id, seat_id))
            .ok_or(BookingError::ReservationExpired(token))?;
        let mut hold = lock(&slot);
        if !hold.is_held_by(token, Instant::now()) {
            return Err(BookingError::ReservationExpired(token));
        }
        *hold = SeatHold::Confirmed { token };
        Ok(())
    }

    async fn release_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        let Some(slot) = self.existing_slot((showtime_id, seat_id)) else {
            return Ok(false);
        };
        let mut hold = lock(&slot);
        match *hold {
            SeatHold::Confirmed { token: holder } if holder == token => {
                *hold = SeatHold::Free;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn restore_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        let slot = self.slot((showtime_id, seat_id));
        let mut hold = lock(&slot);
        if let SeatHold::Confirmed { .. } = *hold {
            return Ok(false);
        }
        // Живой hold на проданном месте всё равно не подтвердится
        *hold = SeatHold::Confirmed { token };
        Ok(true)
    }

    async fn expire_stale_holds(&self) -> BookingResult<usize> {
        let now = Instant::now();
        let mut expired = 0;
        for slot in self.snapshot() {
            let mut hold = lock(&slot);
            if hold.is_stale(now) {
                *hold = SeatHold::Free;
                expired += 1;
            }
        }
        let pruned = self.prune_free_slots();
        if expired > 0 || pruned > 0 {
            debug!(
                "Expired {} stale seat holds, dropped {} free slots",
                expired, pruned
            );
        }
        Ok(expired)
    }

    async fn state(&self, showtime_id: ShowtimeId, seat_id: SeatId) -> BookingResult<HoldState> {
        Ok(self
            .existing_slot((showtime_id, seat_id))
            .map(|slot| lock(&slot).state_at(Instant::now()))
            .unwrap_or(HoldState::Free))
    }
}
