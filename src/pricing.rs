//! Seat price resolution.
//!
//! The base price belongs to the showtime; a seat category only adds a
//! percentage premium on top of it.

use crate::catalog::Catalog;
use crate::error::BookingResult;
use crate::models::{SeatCategory, Showtime};

/// `base × (100 + premium) / 100`, rounded half up to whole cents.
pub fn apply_premium(base_price: i64, premium_percentage: i32) -> i64 {
    let scaled = i128::from(base_price) * (100 + i128::from(premium_percentage));
    let rounded = (scaled + 50).div_euclid(100);
    i64::try_from(rounded).unwrap_or(i64::MAX)
}

/// Looks up the premium for `category` at `showtime` and prices the seat.
/// Missing rules mean no premium.
pub async fn resolve_price(
    catalog: &dyn Catalog,
    showtime: &Showtime,
    category: SeatCategory,
) -> BookingResult<i64> {
    let premium = catalog
        .get_pricing_rule(showtime.id, category)
        .await?
        .map(|rule| rule.premium_percentage)
        .unwrap_or(0);
    Ok(apply_premium(showtime.base_price, premium))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_premium_keeps_base_price() {
        assert_eq!(apply_premium(1250, 0), 1250);
    }

    #[test]
    fn vip_premium_adds_half() {
        assert_eq!(apply_premium(1000, 50), 1500);
        assert_eq!(apply_premium(1000, 100), 2000);
    }

    #[test]
    fn fractional_cents_round_half_up() {
        // 999 * 1.15 = 1148.85
        assert_eq!(apply_premium(999, 15), 1149);
        // 10 * 1.05 = 10.5
        assert_eq!(apply_premium(10, 5), 11);
        // 10 * 1.04 = 10.4
        assert_eq!(apply_premium(10, 4), 10);
    }
}
