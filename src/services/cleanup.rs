use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::engine::{ReservationEngine, SweepReport};

/// Periodically reclaims lapsed holds and forgets old booking attempts.
pub struct CleanupService {
    engine: Arc<ReservationEngine>,
    interval: Duration,
}

impl CleanupService {
    pub fn new(engine: Arc<ReservationEngine>, interval: Duration) -> Self {
        Self { engine, interval }
    }

    /// Один проход очистки. Ошибки логируются, следующий тик попробует снова
    pub async fn run_once(&self) -> Option<SweepReport> {
        match self.engine.sweep().await {
            Ok(report) if report.is_empty() => {
                debug!("🧹 Nothing to clean up");
                Some(report)
            }
            Ok(report) => {
                info!(
                    "🧹 Cleanup: {} stale holds expired, {} reservations released, {} attempts purged",
                    report.expired_holds, report.released_reservations, report.purged_reservations
                );
                Some(report)
            }
            Err(e) => {
                error!("🧹 Cleanup pass failed: {}", e);
                None
            }
        }
    }

    /// Runs until `shutdown` flips to `true` or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            info!("🧹 Cleanup service started, every {:?}", self.interval);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }

            info!("🧹 Cleanup service stopped");
        })
    }
}
