use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, PoisonError};

use super::BookingLedger;
use crate::error::{BookingError, BookingResult};
use crate::models::{
    Booking, BookingId, BookingStatus, NewBooking, SeatId, ShowtimeId, UserId,
};

#[derive(Default)]
struct LedgerState {
    next_id: BookingId,
    bookings: BTreeMap<BookingId, Booking>,
    confirmed_seats: HashSet<(ShowtimeId, SeatId)>,
}

impl LedgerState {
    fn check_free(&self, batch: &[NewBooking]) -> BookingResult<()> {
        let mut seen = HashSet::new();
        for booking in batch {
            let key = (booking.showtime_id, booking.seat_id);
            if self.confirmed_seats.contains(&key) || !seen.insert(key) {
                return Err(BookingError::DuplicateBooking {
                    showtime_id: booking.showtime_id,
                    seat_id: booking.seat_id,
                });
            }
        }
        Ok(())
    }

    fn insert(&mut self, booking: NewBooking) -> Booking {
        self.next_id += 1;
        let now = Utc::now();
        let booking = Booking {
            id: self.next_id,
            showtime_id: booking.showtime_id,
            seat_id: booking.seat_id,
            user_id: booking.user_id,
            reservation_token: booking.reservation_token,
            confirmed_price: booking.confirmed_price,
            status: BookingStatus::Confirmed,
            created_at: now,
            updated_at: now,
        };
        self.confirmed_seats
            .insert((booking.showtime_id, booking.seat_id));
        self.bookings.insert(booking.id, booking.clone());
        booking
    }
}

/// Ledger kept in process memory.
#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut LedgerState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[async_trait]
impl BookingLedger for MemoryLedger {
    async fn record(&self, booking: NewBooking) -> BookingResult<Booking> {
        self.with_state(|state| {
            state.check_free(std::slice::from_ref(&booking))?;
            Ok(state.insert(booking))
        })
    }

    async fn record_batch(&self, bookings: Vec<NewBooking>) -> BookingResult<Vec<Booking>> {
        self.with_state(|state| {
            state.check_free(&bookings)?;
            Ok(bookings.into_iter().map(|b| state.insert(b)).collect())
        })
    }

    async fn get(&self, booking_id: BookingId) -> BookingResult<Option<Booking>> {
        Ok(self.with_state(|state| state.bookings.get(&booking_id).cloned()))
    }

    async fn cancel(&self, booking_id: BookingId) -> BookingResult<Booking> {
        self.with_state(|state| {
            let booking = state
                .bookings
                .get_mut(&booking_id)
                .ok_or(BookingError::UnknownBooking(booking_id))?;
            if booking.status == BookingStatus::Confirmed {
                booking.status = BookingStatus::Cancelled;
                booking.updated_at = Utc::now();
                let key = (booking.showtime_id, booking.seat_id);
                let cancelled = booking.clone();
                state.confirmed_seats.remove(&key);
                return Ok(cancelled);
            }
            Ok(booking.clone())
        })
    }

    async fn history_for_user(&self, user_id: UserId) -> BookingResult<Vec<Booking>> {
        let mut history: Vec<Booking> = self.with_state(|state| {
            state
                .bookings
                .values()
                .filter(|b| b.user_id == user_id)
                .cloned()
                .collect()
        });
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(history)
    }

    async fn confirmed_for_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<Booking>> {
        Ok(self.with_state(|state| {
            state
                .bookings
                .values()
                .filter(|b| b.showtime_id == showtime_id && b.is_confirmed())
                .cloned()
                .collect()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn new_booking(showtime_id: ShowtimeId, seat_id: SeatId, user_id: UserId) -> NewBooking {
        NewBooking {
            showtime_id,
            seat_id,
            user_id,
            reservation_token: Uuid::new_v4(),
            confirmed_price: 1000,
        }
    }

    #[tokio::test]
    async fn second_confirmed_booking_for_seat_is_rejected() {
        let ledger = MemoryLedger::new();
        ledger.record(new_booking(1, 10, 100)).await.unwrap();

        let err = ledger.record(new_booking(1, 10, 200)).await.unwrap_err();
        assert!(matches!(
            err,
            BookingError::DuplicateBooking { showtime_id: 1, seat_id: 10 }
        ));
    }

    #[tokio::test]
    async fn batch_is_all_or_nothing() {
        let ledger = MemoryLedger::new();
        ledger.record(new_booking(1, 11, 100)).await.unwrap();

        let err = ledger
            .record_batch(vec![new_booking(1, 10, 200), new_booking(1, 11, 200)])
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DuplicateBooking { seat_id: 11, .. }));
        assert!(ledger.history_for_user(200).await.unwrap().is_empty());

        let err = ledger
            .record_batch(vec![new_booking(1, 12, 200), new_booking(1, 12, 200)])
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DuplicateBooking { seat_id: 12, .. }));
    }

    #[tokio::test]
    async fn cancelled_booking_frees_the_seat_and_keeps_the_row() {
        let ledger = MemoryLedger::new();
        let booking = ledger.record(new_booking(1, 10, 100)).await.unwrap();

        let cancelled = ledger.cancel(booking.id).await.unwrap();
        assert_eq!(cancelled.status, BookingStatus::Cancelled);
        assert_eq!(ledger.cancel(booking.id).await.unwrap().status, BookingStatus::Cancelled);
        assert!(ledger.confirmed_for_showtime(1).await.unwrap().is_empty());

        ledger.record(new_booking(1, 10, 200)).await.unwrap();
        assert_eq!(ledger.history_for_user(100).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn cancelling_unknown_booking_fails() {
        let ledger = MemoryLedger::new();
        assert!(matches!(
            ledger.cancel(404).await,
            Err(BookingError::UnknownBooking(404))
        ));
    }

    #[tokio::test]
    async fn history_is_newest_first() {
        let ledger = MemoryLedger::new();
        let first = ledger.record(new_booking(1, 10, 100)).await.unwrap();
        let second = ledger.record(new_booking(2, 10, 100)).await.unwrap();
        ledger.record(new_booking(3, 10, 999)).await.unwrap();

        let ids: Vec<BookingId> = ledger
            .history_for_user(100)
            .await
            .unwrap()
            .iter()
            .map(|b| b.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }
}
