//! End-to-end reservation protocol over the in-memory backends.

#![allow(clippy::unwrap_used)]

mod common;

use chrono::{TimeZone, Utc};
use std::time::Duration;

use cinema_booking::catalog::Catalog;
use cinema_booking::engine::ReservationState;
use cinema_booking::error::BookingError;
use cinema_booking::inventory::SeatInventory;
use cinema_booking::ledger::BookingLedger;
use cinema_booking::models::{BookingStatus, HoldState, NewShowtime};

use common::{cinema, hold, user};

#[tokio::test(start_paused = true)]
async fn test_competing_attempts_on_shared_seat() {
    let c = cinema().await;
    let x = user(c.catalog.as_ref(), "xavier").await;
    let y = user(c.catalog.as_ref(), "yolanda").await;
    let (a1, a2) = (c.seats[0], c.seats[1]);

    let mut request = hold(c.showtime_id, x, &[a1, a2]);
    request.ttl = Some(Duration::from_secs(60));
    let receipt = c.engine.hold(request).await.unwrap();

    let err = c.engine.hold(hold(c.showtime_id, y, &[a2])).await.unwrap_err();
    assert!(matches!(err, BookingError::SeatUnavailable { seat_id, .. } if seat_id == a2));
    assert!(err.is_recoverable());

    let bookings = c.engine.confirm(receipt.token).await.unwrap();
    assert_eq!(bookings.len(), 2);
    // A1 standard at base price, A2 vip with a 50% premium.
    assert_eq!(bookings[0].confirmed_price, 1000);
    assert_eq!(bookings[1].confirmed_price, 1500);
    assert!(bookings.iter().all(|b| b.status == BookingStatus::Confirmed));

    // Y retries: A2 is now confirmed, not just held.
    assert!(matches!(
        c.engine.hold(hold(c.showtime_id, y, &[a2])).await,
        Err(BookingError::SeatUnavailable { .. })
    ));
    assert_eq!(
        c.engine.inventory().state(c.showtime_id, a2).await.unwrap(),
        HoldState::Confirmed
    );
}

#[tokio::test(start_paused = true)]
async fn test_lapsed_hold_is_holdable_by_a_new_attempt() {
    let c = cinema().await;
    let first = user(c.catalog.as_ref(), "first").await;
    let second = user(c.catalog.as_ref(), "second").await;
    let a1 = c.seats[0];

    let mut request = hold(c.showtime_id, first, &[a1]);
    request.ttl = Some(Duration::from_secs(60));
    let stale = c.engine.hold(request).await.unwrap();

    tokio::time::advance(Duration::from_secs(61)).await;
    let report = c.engine.sweep().await.unwrap();
    assert_eq!(report.expired_holds, 1);
    assert_eq!(report.released_reservations, 1);

    let fresh = c.engine.hold(hold(c.showtime_id, second, &[a1])).await.unwrap();

    assert!(matches!(
        c.engine.confirm(stale.token).await,
        Err(BookingError::ReservationExpired(t)) if t == stale.token
    ));
    // The stale confirm must not disturb the new holder.
    let bookings = c.engine.confirm(fresh.token).await.unwrap();
    assert_eq!(bookings[0].user_id, second);
}

#[tokio::test(start_paused = true)]
async fn test_partial_failure_leaves_no_holds_behind() {
    let c = cinema().await;
    let blocker = user(c.catalog.as_ref(), "blocker").await;
    let buyer = user(c.catalog.as_ref(), "buyer").await;
    let (s1, s2, s3) = (c.seats[0], c.seats[1], c.seats[2]);

    c.engine.hold(hold(c.showtime_id, blocker, &[s2])).await.unwrap();

    let err = c
        .engine
        .hold(hold(c.showtime_id, buyer, &[s3, s2, s1]))
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::SeatUnavailable { seat_id, .. } if seat_id == s2));

    let inventory = c.engine.inventory();
    assert_eq!(inventory.state(c.showtime_id, s1).await.unwrap(), HoldState::Free);
    assert_eq!(inventory.state(c.showtime_id, s3).await.unwrap(), HoldState::Free);
    assert_eq!(inventory.state(c.showtime_id, s2).await.unwrap(), HoldState::Held);

    let available: Vec<_> = c
        .engine
        .list_available(c.showtime_id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.id)
        .collect();
    assert_eq!(available, vec![s1, s3]);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_booking_reopens_the_seat() {
    let c = cinema().await;
    let owner = user(c.catalog.as_ref(), "owner").await;
    let other = user(c.catalog.as_ref(), "other").await;
    let a1 = c.seats[0];

    let receipt = c.engine.hold(hold(c.showtime_id, owner, &[a1])).await.unwrap();
    let booking = c.engine.confirm(receipt.token).await.unwrap().remove(0);

    assert!(matches!(
        c.engine.cancel_booking(booking.id, other).await,
        Err(BookingError::Forbidden(_))
    ));
    assert!(matches!(
        c.engine.cancel_reservation(receipt.token, owner).await,
        Err(BookingError::ReservationClosed { .. })
    ));

    let cancelled = c.engine.cancel_booking(booking.id, owner).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(
        c.engine.inventory().state(c.showtime_id, a1).await.unwrap(),
        HoldState::Free
    );

    // Seat is sold again; a repeated cancel must not free it.
    let resale = c.engine.hold(hold(c.showtime_id, other, &[a1])).await.unwrap();
    c.engine.confirm(resale.token).await.unwrap();
    c.engine.cancel_booking(booking.id, owner).await.unwrap();
    assert_eq!(
        c.engine.inventory().state(c.showtime_id, a1).await.unwrap(),
        HoldState::Confirmed
    );

    let confirmed = c
        .engine
        .ledger()
        .confirmed_for_showtime(c.showtime_id)
        .await
        .unwrap();
    assert_eq!(confirmed.len(), 1);
    assert_eq!(confirmed[0].user_id, other);
}

#[tokio::test]
async fn test_overlapping_showtime_is_rejected() {
    let c = cinema().await;
    let movie = c.catalog.create_movie("Mirror").await.unwrap();
    let at = |h: u32| Utc.with_ymd_and_hms(2031, 3, 1, h, 0, 0).unwrap();

    c.catalog
        .create_showtime(NewShowtime {
            movie_id: movie.id,
            cinema_id: c.cinema_id,
            start_time: at(10),
            end_time: at(12),
            base_price: 800,
        })
        .await
        .unwrap();

    let err = c
        .catalog
        .create_showtime(NewShowtime {
            movie_id: movie.id,
            cinema_id: c.cinema_id,
            start_time: at(11),
            end_time: at(13),
            base_price: 800,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Overlap { .. }));

    // Back-to-back is fine.
    c.catalog
        .create_showtime(NewShowtime {
            movie_id: movie.id,
            cinema_id: c.cinema_id,
            start_time: at(12),
            end_time: at(14),
            base_price: 800,
        })
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_booked_out_showtime_is_not_listed() {
    let c = cinema().await;
    let buyer = user(c.catalog.as_ref(), "buyer").await;

    let listings = c.engine.bookable_showtimes().await.unwrap();
    assert_eq!(listings.len(), 1);
    assert_eq!(listings[0].available_seats, 3);
    assert_eq!(listings[0].movie_title, "Stalker");

    let receipt = c
        .engine
        .hold(hold(c.showtime_id, buyer, &c.seats))
        .await
        .unwrap();
    // Held seats already count as taken.
    assert!(c.engine.bookable_showtimes().await.unwrap().is_empty());

    c.engine.cancel_reservation(receipt.token, buyer).await.unwrap();
    assert_eq!(c.engine.bookable_showtimes().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_tickets_show_where_the_user_sits() {
    let c = cinema().await;
    let buyer = user(c.catalog.as_ref(), "buyer").await;

    let receipt = c
        .engine
        .hold(hold(c.showtime_id, buyer, &[c.seats[1]]))
        .await
        .unwrap();
    c.engine.confirm(receipt.token).await.unwrap();

    let tickets = c.engine.tickets_for_user(buyer).await.unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].seat_label, "A2");
    assert_eq!(tickets[0].showroom, "Hall 1");
    assert_eq!(tickets[0].movie_title, "Stalker");
    assert_eq!(tickets[0].price, 1500);
}

#[tokio::test(start_paused = true)]
async fn test_showtime_specific_premium_overrides_default() {
    let c = cinema().await;
    let buyer = user(c.catalog.as_ref(), "buyer").await;
    c.catalog
        .set_pricing_rule(
            Some(c.showtime_id),
            cinema_booking::models::SeatCategory::Vip,
            25,
        )
        .await
        .unwrap();

    let receipt = c
        .engine
        .hold(hold(c.showtime_id, buyer, &[c.seats[1]]))
        .await
        .unwrap();
    let bookings = c.engine.confirm(receipt.token).await.unwrap();
    assert_eq!(bookings[0].confirmed_price, 1250);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_status_follows_the_lifecycle() {
    let c = cinema().await;
    let buyer = user(c.catalog.as_ref(), "buyer").await;

    let receipt = c
        .engine
        .hold(hold(c.showtime_id, buyer, &[c.seats[0]]))
        .await
        .unwrap();
    assert_eq!(
        c.engine.reservation(receipt.token).unwrap().state,
        ReservationState::Held
    );

    let bookings = c.engine.confirm(receipt.token).await.unwrap();
    let view = c.engine.reservation(receipt.token).unwrap();
    assert_eq!(view.state, ReservationState::Confirmed);
    assert_eq!(view.booking_ids, vec![bookings[0].id]);

    let history = c.engine.ledger().history_for_user(buyer).await.unwrap();
    assert_eq!(history.len(), 1);
}
