//! Booking Ledger: the durable, append-mostly record of confirmed and
//! cancelled bookings. Rows are never deleted; cancellation is terminal.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::BookingResult;
use crate::models::{Booking, BookingId, NewBooking, ShowtimeId, UserId};

pub use memory::MemoryLedger;
pub use postgres::PgLedger;

#[async_trait]
pub trait BookingLedger: Send + Sync {
    /// Fails with `DuplicateBooking` when (showtime, seat) already has a
    /// confirmed booking.
    async fn record(&self, booking: NewBooking) -> BookingResult<Booking>;

    /// All-or-nothing version of [`BookingLedger::record`].
    async fn record_batch(&self, bookings: Vec<NewBooking>) -> BookingResult<Vec<Booking>>;

    async fn get(&self, booking_id: BookingId) -> BookingResult<Option<Booking>>;

    /// Marks the booking cancelled. Cancelling twice returns the already
    /// cancelled booking.
    async fn cancel(&self, booking_id: BookingId) -> BookingResult<Booking>;

    /// Newest first.
    async fn history_for_user(&self, user_id: UserId) -> BookingResult<Vec<Booking>>;

    async fn confirmed_for_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<Booking>>;
}
