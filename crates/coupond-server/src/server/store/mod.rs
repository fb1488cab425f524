//! Storage seams for the issuance core.
//!
//! Two stores back the service, each authoritative for a different concern:
//!
//! - [`CouponStore`] — the durable store (Postgres). Owns campaign rows,
//!   coupon rows and the unique constraint on `code`; the bound-row count is
//!   the authoritative record of what was issued.
//! - [`CounterStore`] — the fast counter store (Redis). Owns the per-campaign
//!   remaining counter (the single concurrency gate for issuance caps) and
//!   the sorted-set index of upcoming activations.
//!
//! Every call is a single serializable unit; no transaction spans a trait
//! boundary.

pub mod postgres;
pub mod redis;

#[cfg(test)]
pub(crate) mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coupond_core::{CampaignStatus, Result};
use std::collections::HashSet;
use uuid::Uuid;

/// A campaign row as read from the durable store. The coupon limit is not
/// surfaced here; after creation it only lives on as the counter's initial
/// value.
#[derive(Debug, Clone)]
pub struct CampaignRow {
    pub name: String,
    pub start_time: DateTime<Utc>,
    pub status: CampaignStatus,
}

/// Outcome of the atomic counter reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// The counter was absent or already at zero; nothing was claimed.
    Exhausted,
    /// This reservation claimed the final unit; the caller owns the
    /// transition to `finished`.
    Last,
    /// A unit was claimed and this many remain.
    Remaining(i64),
}

/// Durable campaign and coupon records.
#[async_trait]
pub trait CouponStore: Send + Sync {
    /// Inserts a campaign in the `scheduled` state and returns its id.
    async fn insert_campaign(
        &self,
        name: &str,
        start_time: DateTime<Utc>,
        coupon_limit: i32,
    ) -> Result<Uuid>;

    /// Fetches a campaign row, or `None` if the id is unknown.
    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<CampaignRow>>;

    /// Codes bound to the campaign, ordered by `created_at`.
    async fn list_issued_codes(&self, campaign_id: Uuid) -> Result<Vec<String>>;

    /// Inserts candidate codes in the reserved state, skipping codes that
    /// already exist. Returns the subset that was newly inserted.
    async fn batch_reserve_codes(&self, codes: &[String]) -> Result<Vec<String>>;

    /// Binds reserved codes to campaigns in one statement, touching only rows
    /// still in the reserved state. Returns the codes actually updated.
    async fn batch_bind_codes(&self, bindings: &[(String, Uuid)]) -> Result<HashSet<String>>;

    /// Conditional status transition; `true` if exactly the `from` → `to`
    /// update was applied.
    async fn set_status_if(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool>;

    /// Unconditional status write (used only for `finished`).
    async fn set_status(&self, campaign_id: Uuid, to: CampaignStatus) -> Result<()>;
}

/// Per-campaign remaining counters and the activation index.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Initializes the remaining counter to the campaign's coupon limit.
    async fn init_counter(&self, campaign_id: Uuid, limit: i32) -> Result<()>;

    /// Atomically claims one unit from the remaining counter.
    async fn reserve(&self, campaign_id: Uuid) -> Result<Reservation>;

    /// Returns one unit to the counter (compensation after a failed claim).
    async fn release(&self, campaign_id: Uuid) -> Result<()>;

    /// Adds the campaign to the activation index at the given epoch second.
    async fn schedule_activation(&self, campaign_id: Uuid, at_epoch_secs: i64) -> Result<()>;

    /// Campaigns whose activation time is at or before `now_epoch_secs`.
    async fn due_activations(&self, now_epoch_secs: i64) -> Result<Vec<Uuid>>;

    /// Removes the campaign from the activation index.
    async fn remove_activation(&self, campaign_id: Uuid) -> Result<()>;
}
