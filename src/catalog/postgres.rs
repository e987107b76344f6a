use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::Catalog;
use crate::error::{BookingError, BookingResult};
use crate::models::{
    Cinema, CinemaId, Movie, MovieId, NewSeat, NewShowtime, NewUser, PricingRule, Seat,
    SeatCategory, SeatId, Showtime, ShowtimeId, User, UserId,
};

const SHOWTIME_COLUMNS: &str =
    "id, movie_id, cinema_id, start_time, end_time, base_price, created_at, updated_at";

#[derive(FromRow)]
struct SeatRow {
    id: i64,
    cinema_id: i64,
    label: String,
    category: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SeatRow> for Seat {
    type Error = BookingError;

    fn try_from(row: SeatRow) -> Result<Self, Self::Error> {
        Ok(Seat {
            id: row.id,
            cinema_id: row.cinema_id,
            label: row.label,
            category: row.category.parse().map_err(BookingError::Internal)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct PricingRow {
    id: i64,
    showtime_id: Option<i64>,
    category: String,
    premium_percentage: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PricingRow> for PricingRule {
    type Error = BookingError;

    fn try_from(row: PricingRow) -> Result<Self, Self::Error> {
        Ok(PricingRule {
            id: row.id,
            showtime_id: row.showtime_id,
            category: row.category.parse().map_err(BookingError::Internal)?,
            premium_percentage: row.premium_percentage,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

/// Catalog backed by the PostgreSQL schema in `src/migrations`.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Catalog for PgCatalog {
    async fn create_user(&self, user: NewUser) -> BookingResult<User> {
        let username = user.username.clone();
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, email, password_hash, full_name)
             VALUES ($1, $2, $3, $4)
             RETURNING id, username, email, password_hash, full_name, created_at, updated_at",
        )
        .bind(user.username)
        .bind(user.email)
        .bind(user.password_hash)
        .bind(user.full_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                BookingError::Validation(format!("username {username} is already taken"))
            } else {
                e.into()
            }
        })
    }

    async fn get_user(&self, id: UserId) -> BookingResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, full_name, created_at, updated_at
             FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> BookingResult<Option<User>> {
        Ok(sqlx::query_as::<_, User>(
            "SELECT id, username, email, password_hash, full_name, created_at, updated_at
             FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_movie(&self, title: &str) -> BookingResult<Movie> {
        Ok(sqlx::query_as::<_, Movie>(
            "INSERT INTO movie (title) VALUES ($1)
             RETURNING id, title, created_at, updated_at",
        )
        .bind(title)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_movie(&self, id: MovieId) -> BookingResult<Option<Movie>> {
        Ok(sqlx::query_as::<_, Movie>(
            "SELECT id, title, created_at, updated_at FROM movie WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_cinema(&self, showroom: &str, capacity: i32) -> BookingResult<Cinema> {
        if capacity <= 0 {
            return Err(BookingError::Validation(
                "capacity must be positive".to_string(),
            ));
        }
        Ok(sqlx::query_as::<_, Cinema>(
            "INSERT INTO cinema (showroom, capacity) VALUES ($1, $2)
             RETURNING id, showroom, capacity, created_at, updated_at",
        )
        .bind(showroom)
        .bind(capacity)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn get_cinema(&self, id: CinemaId) -> BookingResult<Option<Cinema>> {
        Ok(sqlx::query_as::<_, Cinema>(
            "SELECT id, showroom, capacity, created_at, updated_at FROM cinema WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn create_seat(&self, seat: NewSeat) -> BookingResult<Seat> {
        let mut tx = self.pool.begin().await?;

        // Блокируем зал, чтобы параллельные вставки не превысили вместимость
        let cinema = sqlx::query_as::<_, Cinema>(
            "SELECT id, showroom, capacity, created_at, updated_at
             FROM cinema WHERE id = $1 FOR UPDATE",
        )
        .bind(seat.cinema_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(BookingError::UnknownCinema(seat.cinema_id))?;

        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM seat WHERE cinema_id = $1")
            .bind(seat.cinema_id)
            .fetch_one(&mut *tx)
            .await?;
        if existing >= i64::from(cinema.capacity) {
            return Err(BookingError::Validation(format!(
                "showroom {} is full ({} seats)",
                cinema.showroom, cinema.capacity
            )));
        }

        let row = sqlx::query_as::<_, SeatRow>(
            "INSERT INTO seat (cinema_id, label, category) VALUES ($1, $2, $3)
             RETURNING id, cinema_id, label, category, created_at, updated_at",
        )
        .bind(seat.cinema_id)
        .bind(&seat.label)
        .bind(seat.category.as_str())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                BookingError::Validation(format!(
                    "seat {} already exists in showroom {}",
                    seat.label, cinema.showroom
                ))
            } else {
                e.into()
            }
        })?;

        tx.commit().await?;
        row.try_into()
    }

    async fn get_seat(&self, id: SeatId) -> BookingResult<Option<Seat>> {
        sqlx::query_as::<_, SeatRow>(
            "SELECT id, cinema_id, label, category, created_at, updated_at
             FROM seat WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(Seat::try_from)
        .transpose()
    }

    async fn seats_for_cinema(&self, cinema_id: CinemaId) -> BookingResult<Vec<Seat>> {
        sqlx::query_as::<_, SeatRow>(
            "SELECT id, cinema_id, label, category, created_at, updated_at
             FROM seat WHERE cinema_id = $1 ORDER BY id",
        )
        .bind(cinema_id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(Seat::try_from)
        .collect()
    }

    async fn create_showtime(&self, showtime: NewShowtime) -> BookingResult<Showtime> {
        showtime.validate_times().map_err(BookingError::Validation)?;

        let mut tx = self.pool.begin().await?;

        let movie_exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM movie WHERE id = $1)")
                .bind(showtime.movie_id)
                .fetch_one(&mut *tx)
                .await?;
        if !movie_exists {
            return Err(BookingError::UnknownMovie(showtime.movie_id));
        }

        // FOR UPDATE on the room serialises schedule changes per showroom.
        let cinema: Option<i64> =
            sqlx::query_scalar("SELECT id FROM cinema WHERE id = $1 FOR UPDATE")
                .bind(showtime.cinema_id)
                .fetch_optional(&mut *tx)
                .await?;
        if cinema.is_none() {
            return Err(BookingError::UnknownCinema(showtime.cinema_id));
        }

        let conflicting: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM showtime
             WHERE cinema_id = $1 AND start_time < $3 AND $2 < end_time
             ORDER BY start_time
             LIMIT 1",
        )
        .bind(showtime.cinema_id)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .fetch_optional(&mut *tx)
        .await?;
        if let Some(conflicting) = conflicting {
            return Err(BookingError::Overlap {
                cinema_id: showtime.cinema_id,
                conflicting,
            });
        }

        let created = sqlx::query_as::<_, Showtime>(&format!(
            "INSERT INTO showtime (movie_id, cinema_id, start_time, end_time, base_price)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {SHOWTIME_COLUMNS}"
        ))
        .bind(showtime.movie_id)
        .bind(showtime.cinema_id)
        .bind(showtime.start_time)
        .bind(showtime.end_time)
        .bind(showtime.base_price)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(created)
    }

    async fn get_showtime(&self, id: ShowtimeId) -> BookingResult<Option<Showtime>> {
        Ok(sqlx::query_as::<_, Showtime>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtime WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn upcoming_showtimes(&self, now: DateTime<Utc>) -> BookingResult<Vec<Showtime>> {
        Ok(sqlx::query_as::<_, Showtime>(&format!(
            "SELECT {SHOWTIME_COLUMNS} FROM showtime
             WHERE start_time > $1
             ORDER BY start_time, id"
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn set_pricing_rule(
        &self,
        showtime_id: Option<ShowtimeId>,
        category: SeatCategory,
        premium_percentage: i32,
    ) -> BookingResult<PricingRule> {
        if premium_percentage < 0 {
            return Err(BookingError::Validation(
                "premium percentage must not be negative".to_string(),
            ));
        }

        let conflict_target = if showtime_id.is_some() {
            "(showtime_id, category) WHERE showtime_id IS NOT NULL"
        } else {
            "(category) WHERE showtime_id IS NULL"
        };
        let query = format!(
            "INSERT INTO pricing (showtime_id, category, premium_percentage)
             VALUES ($1, $2, $3)
             ON CONFLICT {conflict_target}
             DO UPDATE SET premium_percentage = EXCLUDED.premium_percentage, updated_at = NOW()
             RETURNING id, showtime_id, category, premium_percentage, created_at, updated_at"
        );

        let row = sqlx::query_as::<_, PricingRow>(&query)
            .bind(showtime_id)
            .bind(category.as_str())
            .bind(premium_percentage)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match showtime_id {
                Some(id) if is_foreign_key_violation(&e) => BookingError::UnknownShowtime(id),
                _ => e.into(),
            })?;
        row.try_into()
    }

    async fn get_pricing_rule(
        &self,
        showtime_id: ShowtimeId,
        category: SeatCategory,
    ) -> BookingResult<Option<PricingRule>> {
        sqlx::query_as::<_, PricingRow>(
            "SELECT id, showtime_id, category, premium_percentage, created_at, updated_at
             FROM pricing
             WHERE category = $2 AND (showtime_id = $1 OR showtime_id IS NULL)
             ORDER BY showtime_id NULLS LAST
             LIMIT 1",
        )
        .bind(showtime_id)
        .bind(category.as_str())
        .fetch_optional(&self.pool)
        .await?
        .map(PricingRule::try_from)
        .transpose()
    }
}
