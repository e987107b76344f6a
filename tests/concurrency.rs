//! Race tests: many attempts contending for the same seats on a
//! multi-threaded runtime.

#![allow(clippy::unwrap_used)]

mod common;

use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use cinema_booking::error::BookingError;
use cinema_booking::inventory::{MemorySeatInventory, SeatInventory};
use cinema_booking::ledger::BookingLedger;
use cinema_booking::models::HoldState;

use common::{cinema, hold, user};

const ATTEMPTS: usize = 64;

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_exactly_one_concurrent_try_hold_wins() {
    let inventory = Arc::new(MemorySeatInventory::new());

    let handles: Vec<_> = (0..ATTEMPTS)
        .map(|_| {
            let inventory = inventory.clone();
            tokio::spawn(async move {
                inventory
                    .try_hold(1, 1, Uuid::new_v4(), Duration::from_secs(60))
                    .await
            })
        })
        .collect();

    let mut won = 0;
    let mut lost = 0;
    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(()) => won += 1,
            Err(BookingError::SeatUnavailable { .. }) => lost += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!(won, 1);
    assert_eq!(lost, ATTEMPTS - 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn test_overlapping_multi_seat_holds_never_share_a_seat() {
    let c = cinema().await;
    let mut users = Vec::new();
    for i in 0..16 {
        users.push(user(c.catalog.as_ref(), &format!("user{i}")).await);
    }
    let seats = c.seats.clone();

    // Every attempt asks for two of the three seats, in varying order.
    let handles: Vec<_> = users
        .iter()
        .enumerate()
        .map(|(i, user_id)| {
            let engine = c.engine.clone();
            let pick = match i % 3 {
                0 => vec![seats[0], seats[1]],
                1 => vec![seats[2], seats[1]],
                _ => vec![seats[2], seats[0]],
            };
            let request = hold(c.showtime_id, *user_id, &pick);
            tokio::spawn(async move {
                match engine.hold(request).await {
                    Ok(receipt) => engine.confirm(receipt.token).await.map(Some),
                    Err(BookingError::SeatUnavailable { .. }) => Ok(None),
                    Err(other) => Err(other),
                }
            })
        })
        .collect();

    let mut confirmed = 0;
    for result in join_all(handles).await {
        if result.unwrap().unwrap().is_some() {
            confirmed += 1;
        }
    }
    // Three seats, two per attempt: one attempt at most can win.
    assert_eq!(confirmed, 1);

    let bookings = c
        .engine
        .ledger()
        .confirmed_for_showtime(c.showtime_id)
        .await
        .unwrap();
    assert_eq!(bookings.len(), 2);

    let mut held = 0;
    for seat in &seats {
        if c.engine.inventory().state(c.showtime_id, *seat).await.unwrap() == HoldState::Held {
            held += 1;
        }
    }
    assert_eq!(held, 0, "rejected attempts left partial holds behind");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_confirms_of_one_token_book_once() {
    let c = cinema().await;
    let buyer = user(c.catalog.as_ref(), "buyer").await;
    let receipt = c
        .engine
        .hold(hold(c.showtime_id, buyer, &[c.seats[0]]))
        .await
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let engine = c.engine.clone();
            tokio::spawn(async move { engine.confirm(receipt.token).await })
        })
        .collect();

    for result in join_all(handles).await {
        match result.unwrap() {
            Ok(bookings) => assert_eq!(bookings.len(), 1),
            Err(BookingError::ReservationBusy(_)) => {}
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    let bookings = c
        .engine
        .ledger()
        .confirmed_for_showtime(c.showtime_id)
        .await
        .unwrap();
    assert_eq!(bookings.len(), 1);
}
