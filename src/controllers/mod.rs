pub mod admin;
pub mod bookings;
pub mod reservations;
pub mod showtimes;
pub mod users;

use axum::Router;
use std::sync::Arc;

use crate::config::FeatureFlags;
use crate::AppState;

pub fn routes(features: &FeatureFlags) -> Router<Arc<AppState>> {
    let router = Router::new()
        .merge(users::routes())
        .merge(showtimes::routes())
        .merge(reservations::routes())
        .merge(bookings::routes());

    if features.enable_admin_api {
        router.nest("/admin", admin::routes())
    } else {
        router
    }
}
