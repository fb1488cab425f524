//! The issuance coordinator.

use std::sync::Arc;

use coupond_core::{CampaignStatus, Error, Result};
use uuid::Uuid;

use crate::server::codegen::CodeGenerator;
use crate::server::store::{CouponStore, CounterStore, Reservation};

/// Orchestrates one coupon issuance across the stores and the generator.
///
/// The counter reservation is the single linearization point for a
/// campaign's cap: no code is ever handed out without a successful claim,
/// and a claim that cannot be completed is compensated by returning the
/// unit to the counter. The durable binding follows asynchronously through
/// the writer, so the chosen failure mode is under-issuance, never
/// over-issuance.
#[derive(Clone)]
pub struct Issuer {
    store: Arc<dyn CouponStore>,
    counters: Arc<dyn CounterStore>,
    generator: Arc<CodeGenerator>,
}

impl Issuer {
    pub fn new(
        store: Arc<dyn CouponStore>,
        counters: Arc<dyn CounterStore>,
        generator: Arc<CodeGenerator>,
    ) -> Self {
        Self {
            store,
            counters,
            generator,
        }
    }

    /// Issues one coupon code for `campaign_id`.
    pub async fn issue(&self, campaign_id: Uuid) -> Result<String> {
        // Advisory precheck against the durable row. The counter below is the
        // authoritative gate; a campaign may finish between this read and the
        // reservation.
        let campaign = self
            .store
            .get_campaign(campaign_id)
            .await?
            .ok_or_else(|| Error::not_found(campaign_id))?;

        if campaign.status != CampaignStatus::Active {
            return Err(Error::CampaignNotActive {
                status: campaign.status.to_string(),
            });
        }

        let reservation = self.counters.reserve(campaign_id).await?;
        let last_unit = match reservation {
            Reservation::Exhausted => return Err(Error::CouponsExhausted),
            Reservation::Last => true,
            Reservation::Remaining(_) => false,
        };

        // This request claimed the final unit, so it owns the transition to
        // `finished` regardless of what the precheck observed.
        if last_unit {
            if let Err(err) = self
                .store
                .set_status(campaign_id, CampaignStatus::Finished)
                .await
            {
                self.release_reservation(campaign_id).await;
                return Err(err);
            }
            tracing::info!(%campaign_id, "campaign finished");
        }

        match self.generator.generate(campaign_id).await {
            Ok(code) => Ok(code),
            Err(err) => {
                self.release_reservation(campaign_id).await;
                Err(err)
            }
        }
    }

    /// Returns a claimed unit to the counter after a failed issuance. The
    /// release may overshoot the initial limit in a race with a concurrent
    /// finish; the durable bound-row count stays the authoritative cap.
    async fn release_reservation(&self, campaign_id: Uuid) {
        if let Err(err) = self.counters.release(campaign_id).await {
            tracing::error!(%campaign_id, %err, "failed to return reserved unit to the counter");
        }
    }
}
