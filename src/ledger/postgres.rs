use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::BookingLedger;
use crate::error::{BookingError, BookingResult};
use crate::models::{Booking, BookingId, NewBooking, ShowtimeId, UserId};

const BOOKING_COLUMNS: &str = "id, showtime_id, seat_id, user_id, reservation_token, \
     confirmed_price, status, created_at, updated_at";

#[derive(FromRow)]
struct BookingRow {
    id: i64,
    showtime_id: i64,
    seat_id: i64,
    user_id: i64,
    reservation_token: Uuid,
    confirmed_price: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = BookingError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            showtime_id: row.showtime_id,
            seat_id: row.seat_id,
            user_id: row.user_id,
            reservation_token: row.reservation_token,
            confirmed_price: row.confirmed_price,
            status: row.status.parse().map_err(BookingError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn rows_to_bookings(rows: Vec<BookingRow>) -> BookingResult<Vec<Booking>> {
    rows.into_iter().map(Booking::try_from).collect()
}

/// Ledger stored in `movie_booking`. The partial unique index on confirmed
/// (showtime_id, seat_id) backs the single-booking invariant.
#[derive(Clone)]
pub struct PgLedger {
    pool: PgPool,
}

impl PgLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert(
        tx: &mut Transaction<'static, Postgres>,
        booking: &NewBooking,
    ) -> BookingResult<Booking> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "INSERT INTO movie_booking
                 (showtime_id, seat_id, user_id, reservation_token, status, confirmed_price)
             VALUES ($1, $2, $3, $4, 'confirmed', $5)
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking.showtime_id)
        .bind(booking.seat_id)
        .bind(booking.user_id)
        .bind(booking.reservation_token)
        .bind(booking.confirmed_price)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                BookingError::DuplicateBooking {
                    showtime_id: booking.showtime_id,
                    seat_id: booking.seat_id,
                }
            }
            _ => BookingError::from(e),
        })?;
        row.try_into()
    }
}

#[async_trait]
impl BookingLedger for PgLedger {
    async fn record(&self, booking: NewBooking) -> BookingResult<Booking> {
        let mut tx = self.pool.begin().await?;
        let recorded = Self::insert(&mut tx, &booking).await?;
        tx.commit().await?;
        Ok(recorded)
    }

    async fn record_batch(&self, bookings: Vec<NewBooking>) -> BookingResult<Vec<Booking>> {
        // Начинаем транзакцию: либо все места, либо ни одного
        let mut tx = self.pool.begin().await?;
        let mut recorded = Vec::with_capacity(bookings.len());
        for booking in &bookings {
            recorded.push(Self::insert(&mut tx, booking).await?);
        }
        tx.commit().await?;
        Ok(recorded)
    }

    async fn get(&self, booking_id: BookingId) -> BookingResult<Option<Booking>> {
        sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM movie_booking WHERE id = $1"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?
        .map(Booking::try_from)
        .transpose()
    }

    async fn cancel(&self, booking_id: BookingId) -> BookingResult<Booking> {
        let cancelled = sqlx::query_as::<_, BookingRow>(&format!(
            "UPDATE movie_booking
             SET status = 'cancelled', updated_at = NOW()
             WHERE id = $1 AND status = 'confirmed'
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;

        match cancelled {
            Some(row) => row.try_into(),
            None => self
                .get(booking_id)
                .await?
                .ok_or(BookingError::UnknownBooking(booking_id)),
        }
    }

    async fn history_for_user(&self, user_id: UserId) -> BookingResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM movie_booking
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows_to_bookings(rows)
    }

    async fn confirmed_for_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM movie_booking
             WHERE showtime_id = $1 AND status = 'confirmed'
             ORDER BY seat_id"
        ))
        .bind(showtime_id)
        .fetch_all(&self.pool)
        .await?;
        rows_to_bookings(rows)
    }
}
