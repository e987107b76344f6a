pub mod catalog;
pub mod config;
pub mod controllers;
pub mod database;
pub mod engine;
pub mod error;
pub mod inventory;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod pricing;
pub mod redis_client;
pub mod services;

use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::info;

use catalog::{Catalog, MemoryCatalog, PgCatalog};
use config::{Config, HoldBackend, StorageBackend};
use engine::ReservationEngine;
use inventory::{MemorySeatInventory, RedisSeatInventory, SeatInventory};
use ledger::{BookingLedger, MemoryLedger, PgLedger};

// Shared state для всего приложения
pub struct AppState {
    pub config: Config,
    pub catalog: Arc<dyn Catalog>,
    pub engine: Arc<ReservationEngine>,
}

impl AppState {
    /// Connects the configured backends. Postgres migrations run here, and
    /// the seat inventory is rebuilt from the confirmed bookings.
    pub async fn new(config: Config) -> anyhow::Result<Arc<Self>> {
        let (catalog, ledger): (Arc<dyn Catalog>, Arc<dyn BookingLedger>) =
            match config.storage.backend {
                StorageBackend::Memory => {
                    info!("Using in-memory catalog and ledger");
                    (Arc::new(MemoryCatalog::new()), Arc::new(MemoryLedger::new()))
                }
                StorageBackend::Postgres => {
                    let url = config
                        .storage
                        .database_url
                        .as_deref()
                        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
                    let db = database::Database::connect(url, config.storage.pool_size).await?;
                    db.migrate().await?;
                    (
                        Arc::new(PgCatalog::new(db.pool.clone())),
                        Arc::new(PgLedger::new(db.pool)),
                    )
                }
            };

        let inventory: Arc<dyn SeatInventory> = match config.holds.backend {
            HoldBackend::Memory => {
                info!("Using in-memory seat inventory");
                Arc::new(MemorySeatInventory::new())
            }
            HoldBackend::Redis => {
                let url = config
                    .holds
                    .redis_url
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("REDIS_URL must be set"))?;
                let redis = redis_client::RedisClient::new(url).await?;
                Arc::new(RedisSeatInventory::new(redis))
            }
        };

        let state = Self::assemble(config, catalog, inventory, ledger);
        state.engine.restore_from_ledger().await?;
        Ok(state)
    }

    /// Everything in process memory, regardless of the configured backends.
    pub fn in_memory(config: Config) -> Arc<Self> {
        Self::assemble(
            config,
            Arc::new(MemoryCatalog::new()),
            Arc::new(MemorySeatInventory::new()),
            Arc::new(MemoryLedger::new()),
        )
    }

    pub fn assemble(
        config: Config,
        catalog: Arc<dyn Catalog>,
        inventory: Arc<dyn SeatInventory>,
        ledger: Arc<dyn BookingLedger>,
    ) -> Arc<Self> {
        let engine = Arc::new(ReservationEngine::new(
            catalog.clone(),
            inventory,
            ledger,
            config.reservation.clone(),
        ));
        Arc::new(Self {
            config,
            catalog,
            engine,
        })
    }
}

/// The full HTTP application.
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(|| async { "Cinema Booking API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .nest("/api", controllers::routes(&state.config.features))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
