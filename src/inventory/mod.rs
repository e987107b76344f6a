//! Seat Inventory: the authoritative hold state of every (showtime, seat)
//! pair.
//!
//! Every transition is a conditional update of a single pair. Nothing here
//! blocks on another holder: a busy seat is reported as unavailable right
//! away.

pub mod memory;
pub mod redis_store;

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::error::BookingResult;
use crate::models::{HoldState, SeatId, ShowtimeId};

pub use self::memory::MemorySeatInventory;
pub use self::redis_store::RedisSeatInventory;

#[async_trait]
pub trait SeatInventory: Send + Sync {
    /// The subset of `seats` that is free for the showtime. Lapsed holds
    /// count as free.
    async fn list_available(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatId],
    ) -> BookingResult<Vec<SeatId>>;

    /// FREE → HELD until `now + ttl`. Fails with `SeatUnavailable` when the
    /// seat is held by anyone (unexpired) or confirmed.
    async fn try_hold(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
        ttl: Duration,
    ) -> BookingResult<()>;

    /// HELD → FREE when `token` owns the hold; otherwise a no-op.
    async fn release(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool>;

    /// HELD(token, unexpired) → CONFIRMED. Fails with `ReservationExpired`
    /// in every other case.
    async fn confirm(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<()>;

    /// CONFIRMED(token) → FREE. Used to compensate a confirm that could not
    /// be committed and to reopen the seat of a cancelled booking. The token
    /// check keeps a stale cancel from freeing a seat sold again since.
    async fn release_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool>;

    /// Marks the seat CONFIRMED(token) for a booking already in the ledger.
    /// Runs at startup, when the inventory may have lost its state. Returns
    /// false when the seat was already confirmed under some token.
    async fn restore_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool>;

    /// Returns every lapsed hold to FREE and reports how many were reclaimed.
    async fn expire_stale_holds(&self) -> BookingResult<usize>;

    async fn state(&self, showtime_id: ShowtimeId, seat_id: SeatId) -> BookingResult<HoldState>;
}
