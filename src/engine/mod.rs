//! Reservation Engine.
//!
//! Drives each booking attempt through hold → confirm or release. Seats are
//! always acquired in ascending id order and a failed multi-seat hold is
//! rolled back before the error is returned, so an attempt never leaves a
//! partial hold behind and never waits on another attempt.

pub mod reservation;

use chrono::Utc;
use futures::future::try_join_all;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::catalog::Catalog;
use crate::config::ReservationConfig;
use crate::error::{BookingError, BookingResult};
use crate::inventory::SeatInventory;
use crate::ledger::BookingLedger;
use crate::models::{
    Booking, BookingId, HoldState, NewBooking, Seat, SeatId, Showtime, ShowtimeId, Ticket,
    UserId,
};
use crate::pricing;

pub use reservation::{
    HoldReceipt, HoldRequest, Reservation, ReservationState, ReservationView, SeatStatus,
    ShowtimeListing, SweepReport,
};

/// What `confirm` decided while holding the registry lock.
enum ConfirmStep {
    Commit(Reservation),
    Lapsed(Reservation),
    AlreadyConfirmed(Vec<BookingId>),
}

pub struct ReservationEngine {
    catalog: Arc<dyn Catalog>,
    inventory: Arc<dyn SeatInventory>,
    ledger: Arc<dyn BookingLedger>,
    settings: ReservationConfig,
    attempts: Mutex<HashMap<Uuid, Reservation>>,
}

impl ReservationEngine {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        inventory: Arc<dyn SeatInventory>,
        ledger: Arc<dyn BookingLedger>,
        settings: ReservationConfig,
    ) -> Self {
        Self {
            catalog,
            inventory,
            ledger,
            settings,
            attempts: Mutex::new(HashMap::new()),
        }
    }

    pub fn catalog(&self) -> &Arc<dyn Catalog> {
        &self.catalog
    }

    pub fn inventory(&self) -> &Arc<dyn SeatInventory> {
        &self.inventory
    }

    pub fn ledger(&self) -> &Arc<dyn BookingLedger> {
        &self.ledger
    }

    pub fn settings(&self) -> &ReservationConfig {
        &self.settings
    }

    // Never held across an await point.
    fn attempts(&self) -> MutexGuard<'_, HashMap<Uuid, Reservation>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, token: Uuid, f: impl FnOnce(&mut Reservation)) {
        if let Some(reservation) = self.attempts().get_mut(&token) {
            f(reservation);
        }
    }

    async fn showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Showtime> {
        self.catalog
            .get_showtime(showtime_id)
            .await?
            .ok_or(BookingError::UnknownShowtime(showtime_id))
    }

    async fn seat(&self, seat_id: SeatId) -> BookingResult<Seat> {
        self.catalog
            .get_seat(seat_id)
            .await?
            .ok_or(BookingError::UnknownSeat(seat_id))
    }

    /// Best effort: a release that fails here still lapses with the TTL.
    async fn release_seats(&self, showtime_id: ShowtimeId, seat_ids: &[SeatId], token: Uuid) {
        for seat_id in seat_ids {
            if let Err(e) = self.inventory.release(showtime_id, *seat_id, token).await {
                warn!(
                    "Failed to release seat {} of showtime {} for {}: {}",
                    seat_id, showtime_id, token, e
                );
            }
        }
    }

    async fn unconfirm_seats(&self, showtime_id: ShowtimeId, seat_ids: &[SeatId], token: Uuid) {
        for seat_id in seat_ids {
            if let Err(e) = self
                .inventory
                .release_confirmed(showtime_id, *seat_id, token)
                .await
            {
                error!(
                    "Failed to roll back confirmed seat {} of showtime {} for {}: {}",
                    seat_id, showtime_id, token, e
                );
            }
        }
    }

    fn validate_seat_ids(&self, seat_ids: &[SeatId]) -> BookingResult<Vec<SeatId>> {
        if seat_ids.is_empty() {
            return Err(BookingError::Validation(
                "at least one seat must be requested".to_string(),
            ));
        }
        if seat_ids.len() > self.settings.max_seats_per_hold {
            return Err(BookingError::Validation(format!(
                "at most {} seats can be held at once",
                self.settings.max_seats_per_hold
            )));
        }
        let mut sorted = seat_ids.to_vec();
        sorted.sort_unstable();
        if let Some(pair) = sorted.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(BookingError::Validation(format!(
                "seat {} requested twice",
                pair[0]
            )));
        }
        Ok(sorted)
    }

    /// Places a TTL-bounded hold on every requested seat, or on none.
    pub async fn hold(&self, request: HoldRequest) -> BookingResult<HoldReceipt> {
        let seat_ids = self.validate_seat_ids(&request.seat_ids)?;

        let showtime = self.showtime(request.showtime_id).await?;
        if showtime.has_started(Utc::now()) {
            return Err(BookingError::Validation(format!(
                "showtime {} has already started",
                showtime.id
            )));
        }
        if self.catalog.get_user(request.user_id).await?.is_none() {
            return Err(BookingError::UnknownUser(request.user_id));
        }
        for seat_id in &seat_ids {
            let seat = self.seat(*seat_id).await?;
            if seat.cinema_id != showtime.cinema_id {
                return Err(BookingError::UnknownSeat(*seat_id));
            }
        }

        let ttl = request
            .ttl
            .unwrap_or(self.settings.hold_ttl)
            .min(self.settings.max_hold_ttl);
        if ttl.is_zero() {
            return Err(BookingError::Validation(
                "hold ttl must be positive".to_string(),
            ));
        }

        let token = Uuid::new_v4();
        let started = Instant::now();
        let expires_at_utc = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| BookingError::Internal(e.to_string()))?;
        self.attempts().insert(
            token,
            Reservation {
                token,
                showtime_id: showtime.id,
                user_id: request.user_id,
                seat_ids: seat_ids.clone(),
                state: ReservationState::Initiated,
                expires_at: started + ttl,
                expires_at_utc,
                booking_ids: Vec::new(),
                closed_at: None,
            },
        );

        let mut held = Vec::with_capacity(seat_ids.len());
        for seat_id in &seat_ids {
            match self
                .inventory
                .try_hold(showtime.id, *seat_id, token, ttl)
                .await
            {
                Ok(()) => held.push(*seat_id),
                Err(err) => {
                    self.release_seats(showtime.id, &held, token).await;
                    self.update(token, |r| r.close(ReservationState::Rejected, Instant::now()));
                    debug!(
                        "Reservation {} rejected on seat {} (rolled back {} holds): {}",
                        token,
                        seat_id,
                        held.len(),
                        err
                    );
                    return Err(err);
                }
            }
        }

        self.update(token, |r| r.state = ReservationState::Held);
        info!(
            "Reservation {} holds seats {:?} of showtime {} for user {}",
            token, seat_ids, showtime.id, request.user_id
        );

        Ok(HoldReceipt {
            token,
            showtime_id: showtime.id,
            seat_ids,
            expires_at: expires_at_utc,
        })
    }

    /// Turns a live hold into confirmed bookings. Confirming an already
    /// confirmed reservation returns the same bookings.
    pub async fn confirm(&self, token: Uuid) -> BookingResult<Vec<Booking>> {
        let step = {
            let now = Instant::now();
            let mut attempts = self.attempts();
            let reservation = attempts
                .get_mut(&token)
                .ok_or(BookingError::UnknownReservation(token))?;
            match reservation.state {
                ReservationState::Held if reservation.expires_at > now => {
                    reservation.state = ReservationState::Confirming;
                    ConfirmStep::Commit(reservation.clone())
                }
                ReservationState::Held => {
                    reservation.close(ReservationState::Released, now);
                    ConfirmStep::Lapsed(reservation.clone())
                }
                ReservationState::Confirmed => {
                    ConfirmStep::AlreadyConfirmed(reservation.booking_ids.clone())
                }
                ReservationState::Released => return Err(BookingError::ReservationExpired(token)),
                ReservationState::Initiated | ReservationState::Confirming => {
                    return Err(BookingError::ReservationBusy(token))
                }
                ReservationState::Rejected => {
                    return Err(BookingError::ReservationClosed {
                        token,
                        state: reservation.state.as_str(),
                    })
                }
            }
        };

        let reservation = match step {
            ConfirmStep::Commit(reservation) => reservation,
            ConfirmStep::Lapsed(reservation) => {
                self.release_seats(reservation.showtime_id, &reservation.seat_ids, token)
                    .await;
                return Err(BookingError::ReservationExpired(token));
            }
            ConfirmStep::AlreadyConfirmed(booking_ids) => {
                let mut bookings = Vec::with_capacity(booking_ids.len());
                for id in booking_ids {
                    match self.ledger.get(id).await? {
                        Some(booking) => bookings.push(booking),
                        None => {
                            error!(
                                "Reservation {} is confirmed but booking {} is missing from the ledger",
                                token, id
                            );
                            return Err(BookingError::Internal(format!(
                                "booking {} of reservation {} is missing",
                                id, token
                            )));
                        }
                    }
                }
                return Ok(bookings);
            }
        };

        match self.commit(&reservation).await {
            Ok(bookings) => {
                let ids: Vec<BookingId> = bookings.iter().map(|b| b.id).collect();
                self.update(token, |r| {
                    r.booking_ids = ids;
                    r.close(ReservationState::Confirmed, Instant::now());
                });
                info!(
                    "Reservation {} confirmed: {} bookings for showtime {}",
                    token,
                    bookings.len(),
                    reservation.showtime_id
                );
                Ok(bookings)
            }
            Err(err) => {
                self.release_seats(reservation.showtime_id, &reservation.seat_ids, token)
                    .await;
                self.update(token, |r| r.close(ReservationState::Released, Instant::now()));
                Err(err)
            }
        }
    }

    /// Prices the seats, re-checks every hold and writes the bookings. Any
    /// seat already moved to CONFIRMED is rolled back on failure.
    async fn commit(&self, reservation: &Reservation) -> BookingResult<Vec<Booking>> {
        let token = reservation.token;
        let showtime = self.showtime(reservation.showtime_id).await?;

        let mut new_bookings = Vec::with_capacity(reservation.seat_ids.len());
        for seat_id in &reservation.seat_ids {
            let seat = self.seat(*seat_id).await?;
            let price = pricing::resolve_price(self.catalog.as_ref(), &showtime, seat.category).await?;
            new_bookings.push(NewBooking {
                showtime_id: showtime.id,
                seat_id: seat.id,
                user_id: reservation.user_id,
                reservation_token: token,
                confirmed_price: price,
            });
        }

        let mut confirmed = Vec::with_capacity(reservation.seat_ids.len());
        for seat_id in &reservation.seat_ids {
            if let Err(err) = self.inventory.confirm(showtime.id, *seat_id, token).await {
                self.unconfirm_seats(showtime.id, &confirmed, token).await;
                return Err(err);
            }
            confirmed.push(*seat_id);
        }

        match self.ledger.record_batch(new_bookings).await {
            Ok(bookings) => Ok(bookings),
            Err(err) => {
                if let BookingError::DuplicateBooking { showtime_id, seat_id } = &err {
                    error!(
                        "Consistency violation: seat {} of showtime {} was held by {} but already booked",
                        seat_id, showtime_id, token
                    );
                }
                self.unconfirm_seats(showtime.id, &confirmed, token).await;
                Err(err)
            }
        }
    }

    /// Client-driven release of a live hold. Releasing twice is a no-op.
    pub async fn cancel_reservation(&self, token: Uuid, user_id: UserId) -> BookingResult<()> {
        let released = {
            let mut attempts = self.attempts();
            let reservation = attempts
                .get_mut(&token)
                .ok_or(BookingError::UnknownReservation(token))?;
            if reservation.user_id != user_id {
                return Err(BookingError::Forbidden(format!(
                    "reservation {} belongs to another user",
                    token
                )));
            }
            match reservation.state {
                ReservationState::Held => {
                    reservation.close(ReservationState::Released, Instant::now());
                    Some(reservation.clone())
                }
                ReservationState::Released | ReservationState::Rejected => None,
                ReservationState::Confirmed => {
                    return Err(BookingError::ReservationClosed {
                        token,
                        state: reservation.state.as_str(),
                    })
                }
                ReservationState::Initiated | ReservationState::Confirming => {
                    return Err(BookingError::ReservationBusy(token))
                }
            }
        };

        if let Some(reservation) = released {
            self.release_seats(reservation.showtime_id, &reservation.seat_ids, token)
                .await;
            info!("Reservation {} cancelled by user {}", token, user_id);
        }
        Ok(())
    }

    pub fn reservation(&self, token: Uuid) -> BookingResult<ReservationView> {
        self.attempts()
            .get(&token)
            .map(Reservation::view)
            .ok_or(BookingError::UnknownReservation(token))
    }

    /// Same as [`ReservationEngine::reservation`], restricted to the owner.
    pub fn reservation_for(&self, token: Uuid, user_id: UserId) -> BookingResult<ReservationView> {
        let view = self.reservation(token)?;
        if view.user_id != user_id {
            return Err(BookingError::Forbidden(format!(
                "reservation {} belongs to another user",
                token
            )));
        }
        Ok(view)
    }

    /// Cancels a booking in the ledger and, while the showtime is still
    /// ahead, puts its seat back on sale.
    pub async fn cancel_booking(&self, booking_id: BookingId, user_id: UserId) -> BookingResult<Booking> {
        let booking = self
            .ledger
            .get(booking_id)
            .await?
            .ok_or(BookingError::UnknownBooking(booking_id))?;
        if booking.user_id != user_id {
            return Err(BookingError::Forbidden(format!(
                "booking {} belongs to another user",
                booking_id
            )));
        }

        let cancelled = self.ledger.cancel(booking_id).await?;

        // Повторная отмена тоже освобождает место: прошлая попытка могла
        // упасть после записи в ledger. Токен не даст освободить перепроданное.
        let showtime = self.showtime(booking.showtime_id).await?;
        if !showtime.has_started(Utc::now()) {
            let reopened = self
                .inventory
                .release_confirmed(booking.showtime_id, booking.seat_id, booking.reservation_token)
                .await?;
            if reopened {
                info!(
                    "Booking {} cancelled, seat {} of showtime {} reopened",
                    booking_id, booking.seat_id, booking.showtime_id
                );
            }
        }
        Ok(cancelled)
    }

    /// Seats of the showtime's room that are currently free.
    pub async fn list_available(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<Seat>> {
        let showtime = self.showtime(showtime_id).await?;
        let seats = self.catalog.seats_for_cinema(showtime.cinema_id).await?;
        let ids: Vec<SeatId> = seats.iter().map(|s| s.id).collect();
        let free: HashSet<SeatId> = self
            .inventory
            .list_available(showtime_id, &ids)
            .await?
            .into_iter()
            .collect();
        Ok(seats.into_iter().filter(|s| free.contains(&s.id)).collect())
    }

    /// Every seat of the room with its current state.
    pub async fn seat_map(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<SeatStatus>> {
        let showtime = self.showtime(showtime_id).await?;
        let seats = self.catalog.seats_for_cinema(showtime.cinema_id).await?;
        let ids: Vec<SeatId> = seats.iter().map(|s| s.id).collect();
        let free: HashSet<SeatId> = self
            .inventory
            .list_available(showtime_id, &ids)
            .await?
            .into_iter()
            .collect();

        let mut map = Vec::with_capacity(seats.len());
        for seat in seats {
            let state = if free.contains(&seat.id) {
                HoldState::Free
            } else {
                self.inventory.state(showtime_id, seat.id).await?
            };
            map.push(SeatStatus { seat, state });
        }
        Ok(map)
    }

    async fn listing(&self, showtime: Showtime) -> BookingResult<ShowtimeListing> {
        let movie = self
            .catalog
            .get_movie(showtime.movie_id)
            .await?
            .ok_or(BookingError::UnknownMovie(showtime.movie_id))?;
        let cinema = self
            .catalog
            .get_cinema(showtime.cinema_id)
            .await?
            .ok_or(BookingError::UnknownCinema(showtime.cinema_id))?;
        let available_seats = self.list_available(showtime.id).await?.len();
        Ok(ShowtimeListing {
            showtime,
            movie_title: movie.title,
            showroom: cinema.showroom,
            available_seats,
        })
    }

    /// Upcoming showtimes that still have at least one free seat.
    pub async fn bookable_showtimes(&self) -> BookingResult<Vec<ShowtimeListing>> {
        let upcoming = self.catalog.upcoming_showtimes(Utc::now()).await?;
        let listings = try_join_all(upcoming.into_iter().map(|s| self.listing(s))).await?;
        Ok(listings
            .into_iter()
            .filter(|listing| listing.available_seats > 0)
            .collect())
    }

    async fn ticket(&self, booking: Booking) -> BookingResult<Ticket> {
        let showtime = self.showtime(booking.showtime_id).await?;
        let seat = self.seat(booking.seat_id).await?;
        let movie = self
            .catalog
            .get_movie(showtime.movie_id)
            .await?
            .ok_or(BookingError::UnknownMovie(showtime.movie_id))?;
        let cinema = self
            .catalog
            .get_cinema(showtime.cinema_id)
            .await?
            .ok_or(BookingError::UnknownCinema(showtime.cinema_id))?;

        Ok(Ticket {
            booking_id: booking.id,
            status: booking.status,
            showtime_id: showtime.id,
            movie_title: movie.title,
            showroom: cinema.showroom,
            starts_at: showtime.start_time,
            seat_label: seat.label,
            seat_category: seat.category,
            price: booking.confirmed_price,
            booked_at: booking.created_at,
        })
    }

    /// Booking history of a user as tickets, newest first.
    pub async fn tickets_for_user(&self, user_id: UserId) -> BookingResult<Vec<Ticket>> {
        let history = self.ledger.history_for_user(user_id).await?;
        try_join_all(history.into_iter().map(|b| self.ticket(b))).await
    }

    /// Rebuilds CONFIRMED seats from the ledger for every upcoming showtime.
    /// Run once at startup so an inventory that lost its state never offers
    /// a seat that is already sold.
    pub async fn restore_from_ledger(&self) -> BookingResult<usize> {
        let upcoming = self.catalog.upcoming_showtimes(Utc::now()).await?;
        let mut restored = 0;
        for showtime in &upcoming {
            for booking in self.ledger.confirmed_for_showtime(showtime.id).await? {
                if self
                    .inventory
                    .restore_confirmed(booking.showtime_id, booking.seat_id, booking.reservation_token)
                    .await?
                {
                    restored += 1;
                }
            }
        }
        info!(
            "Restored {} confirmed seats across {} upcoming showtimes",
            restored,
            upcoming.len()
        );
        Ok(restored)
    }

    /// Reclaims lapsed seat holds, times out attempts past their TTL and
    /// forgets attempts that have been closed longer than the retention.
    pub async fn sweep(&self) -> BookingResult<SweepReport> {
        let expired_holds = self.inventory.expire_stale_holds().await?;

        let now = Instant::now();
        let lapsed: Vec<Reservation> = {
            let mut attempts = self.attempts();
            let closed: Vec<Reservation> = attempts
                .values_mut()
                .filter(|r| r.state == ReservationState::Held && r.expires_at <= now)
                .map(|r| {
                    r.close(ReservationState::Released, now);
                    r.clone()
                })
                .collect();
            closed
        };
        for reservation in &lapsed {
            self.release_seats(reservation.showtime_id, &reservation.seat_ids, reservation.token)
                .await;
        }

        let retention = self.settings.attempt_retention;
        let purged = {
            let mut attempts = self.attempts();
            let before = attempts.len();
            attempts.retain(|_, r| match r.closed_at {
                Some(closed_at) if r.state.is_terminal() => {
                    now.saturating_duration_since(closed_at) < retention
                }
                _ => true,
            });
            before - attempts.len()
        };

        Ok(SweepReport {
            expired_holds,
            released_reservations: lapsed.len(),
            purged_reservations: purged,
        })
    }
}
