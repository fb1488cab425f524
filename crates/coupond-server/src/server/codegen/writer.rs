//! Periodic flush of the pending-issuance buffer.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::CodeGenerator;

/// Binds pending issuances to the durable store once per `period` until the
/// shutdown token fires, then performs a final flush.
///
/// Flush failures are logged and retried on the next tick; the generator
/// re-queues the affected snapshot internally.
pub async fn run_writer(
    generator: Arc<CodeGenerator>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => {
                match generator.flush_pending().await {
                    Ok(bound) if bound > 0 => {
                        tracing::info!(bound, "final issuance flush complete");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::error!(%err, "final issuance flush failed; bindings lost to recovery");
                    }
                }
                break;
            }
            _ = ticker.tick() => {
                match generator.flush_pending().await {
                    Ok(bound) if bound > 0 => {
                        tracing::debug!(bound, "issuance flush complete");
                    }
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(%err, "issuance flush failed; batch re-queued");
                    }
                }
            }
        }
    }

    tracing::debug!("issuance writer stopped");
}
