//! Shared fixture: one showroom with three seats and one showtime tomorrow.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use cinema_booking::catalog::{Catalog, MemoryCatalog};
use cinema_booking::config::Config;
use cinema_booking::engine::{HoldRequest, ReservationEngine};
use cinema_booking::error::{BookingError, BookingResult};
use cinema_booking::inventory::{MemorySeatInventory, SeatInventory};
use cinema_booking::ledger::{BookingLedger, MemoryLedger};
use cinema_booking::models::{
    Booking, BookingId, CinemaId, HoldState, NewBooking, NewSeat, NewShowtime, NewUser,
    SeatCategory, SeatId, ShowtimeId, UserId,
};
use cinema_booking::AppState;

/// Cheapest bcrypt cost, keeps tests fast.
pub const TEST_HASH_COST: u32 = 4;
pub const BASE_PRICE: i64 = 1000;

pub struct Cinema {
    pub catalog: Arc<MemoryCatalog>,
    pub engine: Arc<ReservationEngine>,
    pub cinema_id: CinemaId,
    pub showtime_id: ShowtimeId,
    /// A1 standard, A2 vip, A3 standard.
    pub seats: Vec<SeatId>,
}

pub fn test_config() -> Config {
    let mut config = Config::in_memory();
    config.auth.password_hash_cost = TEST_HASH_COST;
    config
}

pub async fn seed(catalog: &dyn Catalog) -> (CinemaId, ShowtimeId, Vec<SeatId>) {
    let movie = catalog.create_movie("Stalker").await.unwrap();
    let cinema = catalog.create_cinema("Hall 1", 3).await.unwrap();

    let mut seats = Vec::new();
    for (label, category) in [
        ("A1", SeatCategory::Standard),
        ("A2", SeatCategory::Vip),
        ("A3", SeatCategory::Standard),
    ] {
        let seat = catalog
            .create_seat(NewSeat {
                cinema_id: cinema.id,
                label: label.to_string(),
                category,
            })
            .await
            .unwrap();
        seats.push(seat.id);
    }

    let start = Utc::now() + Duration::days(1);
    let showtime = catalog
        .create_showtime(NewShowtime {
            movie_id: movie.id,
            cinema_id: cinema.id,
            start_time: start,
            end_time: start + Duration::hours(2),
            base_price: BASE_PRICE,
        })
        .await
        .unwrap();
    catalog
        .set_pricing_rule(None, SeatCategory::Vip, 50)
        .await
        .unwrap();

    (cinema.id, showtime.id, seats)
}

pub async fn cinema() -> Cinema {
    cinema_with(
        Arc::new(MemorySeatInventory::new()),
        Arc::new(MemoryLedger::new()),
    )
    .await
}

/// Same fixture over caller-provided inventory and ledger.
pub async fn cinema_with(
    inventory: Arc<dyn SeatInventory>,
    ledger: Arc<dyn BookingLedger>,
) -> Cinema {
    let catalog = Arc::new(MemoryCatalog::new());
    let (cinema_id, showtime_id, seats) = seed(catalog.as_ref()).await;
    let engine = Arc::new(ReservationEngine::new(
        catalog.clone(),
        inventory,
        ledger,
        test_config().reservation,
    ));
    Cinema {
        catalog,
        engine,
        cinema_id,
        showtime_id,
        seats,
    }
}

/// In-memory application state seeded with the same fixture.
pub async fn app_state() -> (Arc<AppState>, ShowtimeId, Vec<SeatId>) {
    let state = AppState::in_memory(test_config());
    let (_, showtime_id, seats) = seed(state.catalog.as_ref()).await;
    (state, showtime_id, seats)
}

pub async fn user(catalog: &dyn Catalog, username: &str) -> UserId {
    let new_user = NewUser::with_password(
        username,
        format!("{username}@example.com"),
        "correct-horse",
        username,
        TEST_HASH_COST,
    )
    .unwrap();
    catalog.create_user(new_user).await.unwrap().id
}

pub fn hold(showtime_id: ShowtimeId, user_id: UserId, seats: &[SeatId]) -> HoldRequest {
    HoldRequest {
        showtime_id,
        user_id,
        seat_ids: seats.to_vec(),
        ttl: None,
    }
}

/// A second engine over the same catalog and ledger, as after a restart.
pub fn restarted(c: &Cinema, inventory: Arc<dyn SeatInventory>) -> Arc<ReservationEngine> {
    Arc::new(ReservationEngine::new(
        c.catalog.clone(),
        inventory,
        c.engine.ledger().clone(),
        test_config().reservation,
    ))
}

fn injected(what: &str) -> BookingError {
    BookingError::Internal(format!("injected {what} failure"))
}

/// Takes one pending failure, if any.
fn trip(failures: &AtomicUsize) -> bool {
    failures
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Memory inventory that fails the next N calls of selected operations.
#[derive(Default)]
pub struct FaultyInventory {
    pub inner: MemorySeatInventory,
    pub fail_confirm: AtomicUsize,
    pub fail_release_confirmed: AtomicUsize,
}

#[async_trait]
impl SeatInventory for FaultyInventory {
    async fn list_available(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatId],
    ) -> BookingResult<Vec<SeatId>> {
        self.inner.list_available(showtime_id, seats).await
    }

    async fn try_hold(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
        ttl: std::time::Duration,
    ) -> BookingResult<()> {
        self.inner.try_hold(showtime_id, seat_id, token, ttl).await
    }

    async fn release(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        self.inner.release(showtime_id, seat_id, token).await
    }

    async fn confirm(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<()> {
        if trip(&self.fail_confirm) {
            return Err(injected("confirm"));
        }
        self.inner.confirm(showtime_id, seat_id, token).await
    }

    async fn release_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        if trip(&self.fail_release_confirmed) {
            return Err(injected("release_confirmed"));
        }
        self.inner.release_confirmed(showtime_id, seat_id, token).await
    }

    async fn restore_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        self.inner.restore_confirmed(showtime_id, seat_id, token).await
    }

    async fn expire_stale_holds(&self) -> BookingResult<usize> {
        self.inner.expire_stale_holds().await
    }

    async fn state(&self, showtime_id: ShowtimeId, seat_id: SeatId) -> BookingResult<HoldState> {
        self.inner.state(showtime_id, seat_id).await
    }
}

/// Memory ledger whose next N batch writes fail.
#[derive(Default)]
pub struct FaultyLedger {
    pub inner: MemoryLedger,
    pub fail_record_batch: AtomicUsize,
}

#[async_trait]
impl BookingLedger for FaultyLedger {
    async fn record(&self, booking: NewBooking) -> BookingResult<Booking> {
        self.inner.record(booking).await
    }

    async fn record_batch(&self, bookings: Vec<NewBooking>) -> BookingResult<Vec<Booking>> {
        if trip(&self.fail_record_batch) {
            return Err(injected("record_batch"));
        }
        self.inner.record_batch(bookings).await
    }

    async fn get(&self, booking_id: BookingId) -> BookingResult<Option<Booking>> {
        self.inner.get(booking_id).await
    }

    async fn cancel(&self, booking_id: BookingId) -> BookingResult<Booking> {
        self.inner.cancel(booking_id).await
    }

    async fn history_for_user(&self, user_id: UserId) -> BookingResult<Vec<Booking>> {
        self.inner.history_for_user(user_id).await
    }

    async fn confirmed_for_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<Booking>> {
        self.inner.confirmed_for_showtime(showtime_id).await
    }
}
