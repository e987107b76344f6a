use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};

use super::Catalog;
use crate::error::{BookingError, BookingResult};
use crate::models::{
    Cinema, CinemaId, Movie, MovieId, NewSeat, NewShowtime, NewUser, PricingRule, Seat,
    SeatCategory, SeatId, Showtime, ShowtimeId, User, UserId,
};

#[derive(Default)]
struct CatalogState {
    next_id: i64,
    users: BTreeMap<UserId, User>,
    movies: BTreeMap<MovieId, Movie>,
    cinemas: BTreeMap<CinemaId, Cinema>,
    seats: BTreeMap<SeatId, Seat>,
    showtimes: BTreeMap<ShowtimeId, Showtime>,
    pricing: HashMap<(Option<ShowtimeId>, SeatCategory), PricingRule>,
}

impl CatalogState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Catalog kept in process memory. Used for tests and the `memory` backend.
#[derive(Default)]
pub struct MemoryCatalog {
    state: RwLock<CatalogState>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read<T>(&self, f: impl FnOnce(&CatalogState) -> T) -> T {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }

    fn write<T>(&self, f: impl FnOnce(&mut CatalogState) -> T) -> T {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn create_user(&self, user: NewUser) -> BookingResult<User> {
        self.write(|state| {
            if state.users.values().any(|u| u.username == user.username) {
                return Err(BookingError::Validation(format!(
                    "username {} is already taken",
                    user.username
                )));
            }
            let now = Utc::now();
            let user = User {
                id: state.next_id(),
                username: user.username,
                email: user.email,
                password_hash: user.password_hash,
                full_name: user.full_name,
                created_at: now,
                updated_at: now,
            };
            state.users.insert(user.id, user.clone());
            Ok(user)
        })
    }

    async fn get_user(&self, id: UserId) -> BookingResult<Option<User>> {
        Ok(self.read(|state| state.users.get(&id).cloned()))
    }

    async fn find_user_by_username(&self, username: &str) -> BookingResult<Option<User>> {
        Ok(self.read(|state| {
            state
                .users
                .values()
                .find(|u| u.username == username)
                .cloned()
        }))
    }

    async fn create_movie(&self, title: &str) -> BookingResult<Movie> {
        Ok(self.write(|state| {
            let now = Utc::now();
            let movie = Movie {
                id: state.next_id(),
                title: title.to_string(),
                created_at: now,
                updated_at: now,
            };
            state.movies.insert(movie.id, movie.clone());
            movie
        }))
    }

    async fn get_movie(&self, id: MovieId) -> BookingResult<Option<Movie>> {
        Ok(self.read(|state| state.movies.get(&id).cloned()))
    }

    async fn create_cinema(&self, showroom: &str, capacity: i32) -> BookingResult<Cinema> {
        if capacity <= 0 {
            return Err(BookingError::Validation(
                "capacity must be positive".to_string(),
            ));
        }
        Ok(self.write(|state| {
            let now = Utc::now();
            let cinema = Cinema {
                id: state.next_id(),
                showroom: showroom.to_string(),
                capacity,
                created_at: now,
                updated_at: now,
            };
            state.cinemas.insert(cinema.id, cinema.clone());
            cinema
        }))
    }

    async fn get_cinema(&self, id: CinemaId) -> BookingResult<Option<Cinema>> {
        Ok(self.read(|state| state.cinemas.get(&id).cloned()))
    }

    async fn create_seat(&self, seat: NewSeat) -> BookingResult<Seat> {
        self.write(|state| {
            let cinema = state
                .cinemas
                .get(&seat.cinema_id)
                .ok_or(BookingError::UnknownCinema(seat.cinema_id))?;
            let existing: Vec<&Seat> = state
                .seats
                .values()
                .filter(|s| s.cinema_id == seat.cinema_id)
                .collect();
            if existing.len() >= cinema.capacity as usize {
                return Err(BookingError::Validation(format!(
                    "showroom {} is full ({} seats)",
                    cinema.showroom, cinema.capacity
                )));
            }
            if existing.iter().any(|s| s.label == seat.label) {
                return Err(BookingError::Validation(format!(
                    "seat {} already exists in showroom {}",
                    seat.label, cinema.showroom
                )));
            }

            let now = Utc::now();
            let seat = Seat {
                id: state.next_id(),
                cinema_id: seat.cinema_id,
                label: seat.label,
                category: seat.category,
                created_at: now,
                updated_at: now,
            };
            state.seats.insert(seat.id, seat.clone());
            Ok(seat)
        })
    }

    async fn get_seat(&self, id: SeatId) -> BookingResult<Option<Seat>> {
        Ok(self.read(|state| state.seats.get(&id).cloned()))
    }

    async fn seats_for_cinema(&self, cinema_id: CinemaId) -> BookingResult<Vec<Seat>> {
        Ok(self.read(|state| {
            state
                .seats
                .values()
                .filter(|s| s.cinema_id == cinema_id)
                .cloned()
                .collect()
        }))
    }

    async fn create_showtime(&self, showtime: NewShowtime) -> BookingResult<Showtime> {
        showtime.validate_times().map_err(BookingError::Validation)?;

        self.write(|state| {
            if !state.movies.contains_key(&showtime.movie_id) {
                return Err(BookingError::UnknownMovie(showtime.movie_id));
            }
            if !state.cinemas.contains_key(&showtime.cinema_id) {
                return Err(BookingError::UnknownCinema(showtime.cinema_id));
            }
            if let Some(conflict) = state.showtimes.values().find(|existing| {
                existing.cinema_id == showtime.cinema_id
                    && existing.overlaps(showtime.start_time, showtime.end_time)
            }) {
                return Err(BookingError::Overlap {
                    cinema_id: showtime.cinema_id,
                    conflicting: conflict.id,
                });
            }

            let now = Utc::now();
            let created = Showtime {
                id: state.next_id(),
                movie_id: showtime.movie_id,
                cinema_id: showtime.cinema_id,
                start_time: showtime.start_time,
                end_time: showtime.end_time,
                base_price: showtime.base_price,
                created_at: now,
                updated_at: now,
            };
            state.showtimes.insert(created.id, created.clone());
            Ok(created)
        })
    }

    async fn get_showtime(&self, id: ShowtimeId) -> BookingResult<Option<Showtime>> {
        Ok(self.read(|state| state.showtimes.get(&id).cloned()))
    }

    async fn upcoming_showtimes(&self, now: DateTime<Utc>) -> BookingResult<Vec<Showtime>> {
        let mut showtimes: Vec<Showtime> = self.read(|state| {
            state
                .showtimes
                .values()
                .filter(|s| s.start_time > now)
                .cloned()
                .collect()
        });
        showtimes.sort_by_key(|s| (s.start_time, s.id));
        Ok(showtimes)
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
        self.write(|state| {
            if let Some(id) = showtime_id {
                if !state.showtimes.contains_key(&id) {
                    return Err(BookingError::UnknownShowtime(id));
                }
            }
            let now = Utc::now();
            let key = (showtime_id, category);
            let rule = match state.pricing.get(&key) {
                Some(existing) => PricingRule {
                    premium_percentage,
                    updated_at: now,
                    ..existing.clone()
                },
                None => PricingRule {
                    id: state.next_id(),
                    showtime_id,
                    category,
                    premium_percentage,
                    created_at: now,
                    updated_at: now,
                },
            };
            state.pricing.insert(key, rule.clone());
            Ok(rule)
        })
    }

    async fn get_pricing_rule(
        &self,
        showtime_id: ShowtimeId,
        category: SeatCategory,
    ) -> BookingResult<Option<PricingRule>> {
        Ok(self.read(|state| {
            state
                .pricing
                .get(&(Some(showtime_id), category))
                .or_else(|| state.pricing.get(&(None, category)))
                .cloned()
        }))
    }
}
