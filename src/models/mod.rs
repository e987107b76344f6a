pub mod booking;
pub mod cinema;
pub mod hold;
pub mod movie;
pub mod pricing;
pub mod seat;
pub mod showtime;
pub mod user;

pub use booking::{Booking, BookingStatus, NewBooking, Ticket};
pub use cinema::Cinema;
pub use hold::{HoldState, SeatHold};
pub use movie::Movie;
pub use pricing::PricingRule;
pub use seat::{NewSeat, Seat, SeatCategory};
pub use showtime::{NewShowtime, Showtime};
pub use user::{NewUser, User};

pub type UserId = i64;
pub type MovieId = i64;
pub type CinemaId = i64;
pub type SeatId = i64;
pub type ShowtimeId = i64;
pub type BookingId = i64;
