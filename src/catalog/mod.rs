//! Read-mostly catalog: users, movies, showrooms, seats, showtimes and
//! pricing rules.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::BookingResult;
use crate::models::{
    Cinema, CinemaId, Movie, MovieId, NewSeat, NewShowtime, NewUser, PricingRule, Seat,
    SeatCategory, SeatId, Showtime, ShowtimeId, User, UserId,
};

pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;

#[async_trait]
pub trait Catalog: Send + Sync {
    async fn create_user(&self, user: NewUser) -> BookingResult<User>;
    async fn get_user(&self, id: UserId) -> BookingResult<Option<User>>;
    async fn find_user_by_username(&self, username: &str) -> BookingResult<Option<User>>;

    async fn create_movie(&self, title: &str) -> BookingResult<Movie>;
    async fn get_movie(&self, id: MovieId) -> BookingResult<Option<Movie>>;

    async fn create_cinema(&self, showroom: &str, capacity: i32) -> BookingResult<Cinema>;
    async fn get_cinema(&self, id: CinemaId) -> BookingResult<Option<Cinema>>;

    /// Fails with `Validation` when the showroom is full or the label is taken.
    async fn create_seat(&self, seat: NewSeat) -> BookingResult<Seat>;
    async fn get_seat(&self, id: SeatId) -> BookingResult<Option<Seat>>;
    /// Seats of a showroom in ascending id order.
    async fn seats_for_cinema(&self, cinema_id: CinemaId) -> BookingResult<Vec<Seat>>;

    /// Fails with `Overlap` when the showroom is already busy in that interval.
    async fn create_showtime(&self, showtime: NewShowtime) -> BookingResult<Showtime>;
    async fn get_showtime(&self, id: ShowtimeId) -> BookingResult<Option<Showtime>>;
    /// Showtimes starting after `now`, earliest first.
    async fn upcoming_showtimes(&self, now: DateTime<Utc>) -> BookingResult<Vec<Showtime>>;

    /// Upserts the premium for (showtime, category); `None` sets the default.
    async fn set_pricing_rule(
        &self,
        showtime_id: Option<ShowtimeId>,
        category: SeatCategory,
        premium_percentage: i32,
    ) -> BookingResult<PricingRule>;
    /// Showtime-specific rule first, then the default for the category.
    async fn get_pricing_rule(
        &self,
        showtime_id: ShowtimeId,
        category: SeatCategory,
    ) -> BookingResult<Option<PricingRule>>;
}
