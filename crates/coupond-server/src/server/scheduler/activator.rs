//! The activation sweep.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use coupond_core::{CampaignStatus, Result};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::server::store::{CouponStore, CounterStore};

/// Promotes due campaigns once per `period` until the shutdown token fires.
///
/// Index failures are logged and retried on the next tick; activation is
/// best-effort-eventually-consistent and the loop never exits on error.
pub async fn run_activator(
    store: Arc<dyn CouponStore>,
    counters: Arc<dyn CounterStore>,
    period: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                if let Err(err) = activate_due(store.as_ref(), counters.as_ref()).await {
                    tracing::warn!(%err, "activation sweep failed; retrying next period");
                }
            }
        }
    }

    tracing::debug!("activation scheduler stopped");
}

/// One sweep: promote every campaign whose activation time has passed.
///
/// The conditional transition makes the sweep idempotent: an entry whose
/// campaign is already past `scheduled` is simply dropped from the index. An
/// entry whose transition fails stays in the index and is retried on the
/// next sweep.
pub(crate) async fn activate_due(
    store: &dyn CouponStore,
    counters: &dyn CounterStore,
) -> Result<usize> {
    let due = counters.due_activations(Utc::now().timestamp()).await?;

    let mut activated = 0;
    for campaign_id in due {
        match store
            .set_status_if(campaign_id, CampaignStatus::Scheduled, CampaignStatus::Active)
            .await
        {
            Ok(true) => {
                activated += 1;
                tracing::info!(%campaign_id, "campaign activated");
            }
            Ok(false) => {
                tracing::debug!(%campaign_id, "campaign already past scheduled");
            }
            Err(err) => {
                tracing::warn!(%campaign_id, %err, "failed to activate campaign");
                continue;
            }
        }

        if let Err(err) = counters.remove_activation(campaign_id).await {
            tracing::warn!(%campaign_id, %err, "failed to remove activation index entry");
        }
    }

    Ok(activated)
}
