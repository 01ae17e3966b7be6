use boxoffice_core::{Clock, SeatService};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Reclaims expired seat locks every `every` until `shutdown` flips to true.
///
/// A failed sweep is logged and retried on the next tick. `every` must be
/// non-zero.
pub async fn run_expiry_sweeper(
    service: SeatService,
    clock: Arc<dyn Clock>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!("Expiry sweeper started, running every {:?}", every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.release_expired_locks(clock.now()).await {
                    Ok(released) => debug!("Sweep finished, {} locks reclaimed", released),
                    Err(e) => error!("Expiry sweep failed: {}", e),
                }
            }
            changed = shutdown.changed() => {
                // Sender gone counts as shutdown
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }

    info!("Expiry sweeper stopped");
}
