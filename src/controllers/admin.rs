use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::BookingError;
use crate::models::{
    CinemaId, MovieId, NewSeat, NewShowtime, SeatCategory, ShowtimeId,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/movies", post(create_movie))
        .route("/cinemas", post(create_cinema))
        .route("/cinemas/{id}/seats", post(create_seat))
        .route("/showtimes", post(create_showtime))
        .route("/showtimes/{id}/bookings", get(showtime_bookings))
        .route("/pricing", put(set_pricing_rule))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateMovieRequest {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
}

async fn create_movie(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateMovieRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let movie = state.catalog.create_movie(&req.title).await?;
    info!("Movie {} created: {}", movie.id, movie.title);
    Ok((StatusCode::CREATED, Json(movie)))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateCinemaRequest {
    #[validate(length(min = 1, max = 100))]
    pub showroom: String,
    #[validate(range(min = 1))]
    pub capacity: i32,
}

async fn create_cinema(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateCinemaRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let cinema = state
        .catalog
        .create_cinema(&req.showroom, req.capacity)
        .await?;
    Ok((StatusCode::CREATED, Json(cinema)))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateSeatRequest {
    #[validate(length(min = 1, max = 10))]
    pub label: String,
    pub category: SeatCategory,
}

async fn create_seat(
    State(state): State<Arc<AppState>>,
    Path(cinema_id): Path<CinemaId>,
    Json(req): Json<CreateSeatRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let seat = state
        .catalog
        .create_seat(NewSeat {
            cinema_id,
            label: req.label,
            category: req.category,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(seat)))
}

#[derive(Debug, Deserialize, Validate)]
struct CreateShowtimeRequest {
    pub movie_id: MovieId,
    pub cinema_id: CinemaId,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[validate(range(min = 0))]
    pub base_price: i64,
}

async fn create_showtime(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateShowtimeRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let showtime = state
        .catalog
        .create_showtime(NewShowtime {
            movie_id: req.movie_id,
            cinema_id: req.cinema_id,
            start_time: req.start_time,
            end_time: req.end_time,
            base_price: req.base_price,
        })
        .await?;
    info!(
        "Showtime {} scheduled in cinema {} at {}",
        showtime.id, showtime.cinema_id, showtime.start_time
    );
    Ok((StatusCode::CREATED, Json(showtime)))
}

#[derive(Debug, Deserialize, Validate)]
struct PricingRuleRequest {
    /// Omitted for the default rule of the category.
    pub showtime_id: Option<ShowtimeId>,
    pub category: SeatCategory,
    #[validate(range(min = 0, max = 1000))]
    pub premium_percentage: i32,
}

async fn set_pricing_rule(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PricingRuleRequest>,
) -> Result<impl IntoResponse, BookingError> {
    req.validate()?;
    let rule = state
        .catalog
        .set_pricing_rule(req.showtime_id, req.category, req.premium_percentage)
        .await?;
    Ok(Json(rule))
}

// Аудит: подтверждённые брони сеанса
async fn showtime_bookings(
    State(state): State<Arc<AppState>>,
    Path(showtime_id): Path<ShowtimeId>,
) -> Result<impl IntoResponse, BookingError> {
    Ok(Json(
        state.engine.ledger().confirmed_for_showtime(showtime_id).await?,
    ))
}
