//! Redis-backed seat inventory.
//!
//! One key per (showtime, seat). A hold is `SET NX PX`, so Redis expires it
//! on its own; token-checked transitions run as Lua scripts so the compare
//! and the write happen in one step.

use async_trait::async_trait;
use redis::Script;
use std::time::Duration;
use uuid::Uuid;

use super::SeatInventory;
use crate::error::{BookingError, BookingResult};
use crate::models::{HoldState, SeatId, ShowtimeId};
use crate::redis_client::RedisClient;

const HELD_PREFIX: &str = "held:";
const CONFIRMED_PREFIX: &str = "confirmed:";

// KEYS[1] = hold key, ARGV[1] = expected value
const DELETE_IF_EQUALS: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

// KEYS[1] = hold key, ARGV[1] = held value, ARGV[2] = confirmed value.
// Plain SET drops the TTL, so a confirmed seat never expires.
const CONFIRM_IF_HELD: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    redis.call('SET', KEYS[1], ARGV[2])
    return 1
end
return 0
"#;

// KEYS[1] = hold key, ARGV[1] = confirmed value, ARGV[2] = confirmed prefix.
// Overwrites a hold, keeps an existing confirmation.
const RESTORE_CONFIRMED: &str = r#"
local current = redis.call('GET', KEYS[1])
if current and string.sub(current, 1, string.len(ARGV[2])) == ARGV[2] then
    return 0
end
redis.call('SET', KEYS[1], ARGV[1])
return 1
"#;

pub fn hold_key(showtime_id: ShowtimeId, seat_id: SeatId) -> String {
    format!("hold:{}:{}", showtime_id, seat_id)
}

fn held_value(token: Uuid) -> String {
    format!("{HELD_PREFIX}{token}")
}

fn confirmed_value(token: Uuid) -> String {
    format!("{CONFIRMED_PREFIX}{token}")
}

/// A missing key is a free seat.
pub fn parse_state(value: Option<&str>) -> HoldState {
    match value {
        Some(v) if v.starts_with(CONFIRMED_PREFIX) => HoldState::Confirmed,
        Some(v) if v.starts_with(HELD_PREFIX) => HoldState::Held,
        _ => HoldState::Free,
    }
}

pub struct RedisSeatInventory {
    redis: RedisClient,
    delete_if_equals: Script,
    confirm_if_held: Script,
    restore_confirmed: Script,
}

impl RedisSeatInventory {
    pub fn new(redis: RedisClient) -> Self {
        Self {
            redis,
            delete_if_equals: Script::new(DELETE_IF_EQUALS),
            confirm_if_held: Script::new(CONFIRM_IF_HELD),
            restore_confirmed: Script::new(RESTORE_CONFIRMED),
        }
    }
}

#[async_trait]
impl SeatInventory for RedisSeatInventory {
    async fn list_available(
        &self,
        showtime_id: ShowtimeId,
        seats: &[SeatId],
    ) -> BookingResult<Vec<SeatId>> {
        if seats.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = seats.iter().map(|s| hold_key(showtime_id, *s)).collect();
        let mut conn = self.redis.conn.clone();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(&keys)
            .query_async(&mut conn)
            .await?;

        Ok(seats
            .iter()
            .zip(values)
            .filter(|(_, value)| parse_state(value.as_deref()) == HoldState::Free)
            .map(|(seat_id, _)| *seat_id)
            .collect())
    }

    async fn try_hold(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
        ttl: Duration,
    ) -> BookingResult<()> {
        let mut conn = self.redis.conn.clone();
        let ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1);

        // SET NX PX - атомарная операция без гонок
        let result: Option<String> = redis::cmd("SET")
            .arg(hold_key(showtime_id, seat_id))
            .arg(held_value(token))
            .arg("NX") // только если ключа нет
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await?;

        match result {
            Some(_) => Ok(()),
            None => Err(BookingError::SeatUnavailable {
                showtime_id,
                seat_id,
            }),
        }
    }

    async fn release(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        let mut conn = self.redis.conn.clone();
        let deleted: i64 = self
            .delete_if_equals
            .key(hold_key(showtime_id, seat_id))
            .arg(held_value(token))
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn confirm(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<()> {
        let mut conn = self.redis.conn.clone();
        let confirmed: i64 = self
            .confirm_if_held
            .key(hold_key(showtime_id, seat_id))
            .arg(held_value(token))
            .arg(confirmed_value(token))
            .invoke_async(&mut conn)
            .await?;
        if confirmed == 1 {
            Ok(())
        } else {
            Err(BookingError::ReservationExpired(token))
        }
    }

    async fn release_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        let mut conn = self.redis.conn.clone();
        let deleted: i64 = self
            .delete_if_equals
            .key(hold_key(showtime_id, seat_id))
            .arg(confirmed_value(token))
            .invoke_async(&mut conn)
            .await?;
        Ok(deleted > 0)
    }

    async fn restore_confirmed(
        &self,
        showtime_id: ShowtimeId,
        seat_id: SeatId,
        token: Uuid,
    ) -> BookingResult<bool> {
        let mut conn = self.redis.conn.clone();
        let restored: i64 = self
            .restore_confirmed
            .key(hold_key(showtime_id, seat_id))
            .arg(confirmed_value(token))
            .arg(CONFIRMED_PREFIX)
            .invoke_async(&mut conn)
            .await?;
        Ok(restored == 1)
    }

    /// Held keys carry a PX expiry, so Redis has already reclaimed them.
    async fn expire_stale_holds(&self) -> BookingResult<usize> {
        Ok(0)
    }

    async fn state(&self, showtime_id: ShowtimeId, seat_id: SeatId) -> BookingResult<HoldState> {
        let mut conn = self.redis.conn.clone();
        let value: Option<String> = redis::cmd("GET")
            .arg(hold_key(showtime_id, seat_id))
            .query_async(&mut conn)
            .await?;
        Ok(parse_state(value.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_scoped_by_showtime_and_seat() {
        assert_eq!(hold_key(7, 42), "hold:7:42");
        assert_ne!(hold_key(7, 42), hold_key(42, 7));
    }

    #[test]
    fn stored_values_map_to_hold_states() {
        let token = Uuid::new_v4();
        assert_eq!(parse_state(None), HoldState::Free);
        assert_eq!(parse_state(Some(&held_value(token))), HoldState::Held);
        assert_eq!(
            parse_state(Some(&confirmed_value(token))),
            HoldState::Confirmed
        );
    }
}
