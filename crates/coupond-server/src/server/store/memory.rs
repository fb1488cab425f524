//! In-memory store doubles for tests.
//!
//! Both doubles serialize every operation behind a mutex, which gives them
//! the same atomicity the real stores provide (single-statement updates in
//! Postgres, scripted evaluation in Redis). Failure-injection switches fire
//! once and reset, so a test can make exactly one call fail.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use coupond_core::{CampaignStatus, Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

use super::{CampaignRow, CouponStore, CounterStore, Reservation};

#[derive(Clone)]
struct StoredCoupon {
    campaign_id: Option<Uuid>,
    issued: bool,
    seq: u64,
}

#[derive(Default)]
struct CouponState {
    campaigns: HashMap<Uuid, CampaignRow>,
    coupons: HashMap<String, StoredCoupon>,
    seq: u64,
}

/// In-memory [`CouponStore`].
#[derive(Default)]
pub struct MemoryCouponStore {
    state: Mutex<CouponState>,
    fail_next_reserve: AtomicBool,
    fail_next_bind: AtomicBool,
    fail_next_set_status: AtomicBool,
    /// Codes the next `batch_bind_codes` silently leaves untouched, as if the
    /// rows had been concurrently mutated.
    skip_on_bind: Mutex<HashSet<String>>,
}

impl MemoryCouponStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_reserve(&self) {
        self.fail_next_reserve.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_bind(&self) {
        self.fail_next_bind.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_set_status(&self) {
        self.fail_next_set_status.store(true, Ordering::SeqCst);
    }

    pub fn skip_on_next_bind(&self, code: &str) {
        self.skip_on_bind.lock().unwrap().insert(code.to_owned());
    }

    /// Seeds a campaign in an arbitrary state.
    pub fn put_campaign(&self, campaign_id: Uuid, row: CampaignRow) {
        self.state
            .lock()
            .unwrap()
            .campaigns
            .insert(campaign_id, row);
    }

    pub fn campaign_status(&self, campaign_id: Uuid) -> Option<CampaignStatus> {
        self.state
            .lock()
            .unwrap()
            .campaigns
            .get(&campaign_id)
            .map(|row| row.status)
    }

    /// `(campaign_id, issued)` for a coupon row, if the code exists.
    pub fn coupon_row(&self, code: &str) -> Option<(Option<Uuid>, bool)> {
        self.state
            .lock()
            .unwrap()
            .coupons
            .get(code)
            .map(|row| (row.campaign_id, row.issued))
    }

    pub fn bound_count(&self, campaign_id: Uuid) -> usize {
        self.state
            .lock()
            .unwrap()
            .coupons
            .values()
            .filter(|row| row.campaign_id == Some(campaign_id) && row.issued)
            .count()
    }
}

#[async_trait]
impl CouponStore for MemoryCouponStore {
    async fn insert_campaign(
        &self,
        name: &str,
        start_time: DateTime<Utc>,
        coupon_limit: i32,
    ) -> Result<Uuid> {
        let campaign_id = Uuid::new_v4();
        debug_assert!(coupon_limit > 0);
        self.state.lock().unwrap().campaigns.insert(
            campaign_id,
            CampaignRow {
                name: name.to_owned(),
                start_time,
                status: CampaignStatus::Scheduled,
            },
        );
        Ok(campaign_id)
    }

    async fn get_campaign(&self, campaign_id: Uuid) -> Result<Option<CampaignRow>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .campaigns
            .get(&campaign_id)
            .cloned())
    }

    async fn list_issued_codes(&self, campaign_id: Uuid) -> Result<Vec<String>> {
        let state = self.state.lock().unwrap();
        let mut rows: Vec<(&String, u64)> = state
            .coupons
            .iter()
            .filter(|(_, row)| row.campaign_id == Some(campaign_id))
            .map(|(code, row)| (code, row.seq))
            .collect();
        rows.sort_by_key(|(_, seq)| *seq);
        Ok(rows.into_iter().map(|(code, _)| code.clone()).collect())
    }

    async fn batch_reserve_codes(&self, codes: &[String]) -> Result<Vec<String>> {
        if self.fail_next_reserve.swap(false, Ordering::SeqCst) {
            return Err(Error::storage("injected reserve failure"));
        }

        let mut state = self.state.lock().unwrap();
        let mut inserted = Vec::new();
        for code in codes {
            if state.coupons.contains_key(code) {
                continue;
            }
            state.seq += 1;
            let seq = state.seq;
            state.coupons.insert(
                code.clone(),
                StoredCoupon {
                    campaign_id: None,
                    issued: false,
                    seq,
                },
            );
            inserted.push(code.clone());
        }
        Ok(inserted)
    }

    async fn batch_bind_codes(&self, bindings: &[(String, Uuid)]) -> Result<HashSet<String>> {
        if self.fail_next_bind.swap(false, Ordering::SeqCst) {
            return Err(Error::storage("injected bind failure"));
        }

        let skipped: HashSet<String> = std::mem::take(&mut *self.skip_on_bind.lock().unwrap());
        let mut state = self.state.lock().unwrap();
        let mut updated = HashSet::new();
        for (code, campaign_id) in bindings {
            if skipped.contains(code) {
                continue;
            }
            if let Some(row) = state.coupons.get_mut(code) {
                if row.campaign_id.is_none() && !row.issued {
                    row.campaign_id = Some(*campaign_id);
                    row.issued = true;
                    updated.insert(code.clone());
                }
            }
        }
        Ok(updated)
    }

    async fn set_status_if(
        &self,
        campaign_id: Uuid,
        from: CampaignStatus,
        to: CampaignStatus,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        match state.campaigns.get_mut(&campaign_id) {
            Some(row) if row.status == from => {
                row.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_status(&self, campaign_id: Uuid, to: CampaignStatus) -> Result<()> {
        if self.fail_next_set_status.swap(false, Ordering::SeqCst) {
            return Err(Error::storage("injected set_status failure"));
        }

        if let Some(row) = self.state.lock().unwrap().campaigns.get_mut(&campaign_id) {
            row.status = to;
        }
        Ok(())
    }
}

/// In-memory [`CounterStore`].
#[derive(Default)]
pub struct MemoryCounterStore {
    counters: Mutex<HashMap<Uuid, i64>>,
    activations: Mutex<HashMap<Uuid, i64>>,
    fail_next_due: AtomicBool,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_due(&self) {
        self.fail_next_due.store(true, Ordering::SeqCst);
    }

    pub fn counter_value(&self, campaign_id: Uuid) -> Option<i64> {
        self.counters.lock().unwrap().get(&campaign_id).copied()
    }

    pub fn has_activation(&self, campaign_id: Uuid) -> bool {
        self.activations.lock().unwrap().contains_key(&campaign_id)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn init_counter(&self, campaign_id: Uuid, limit: i32) -> Result<()> {
        self.counters
            .lock()
            .unwrap()
            .insert(campaign_id, i64::from(limit));
        Ok(())
    }

    async fn reserve(&self, campaign_id: Uuid) -> Result<Reservation> {
        let mut counters = self.counters.lock().unwrap();
        match counters.get_mut(&campaign_id) {
            None => Ok(Reservation::Exhausted),
            Some(remaining) if *remaining <= 0 => Ok(Reservation::Exhausted),
            Some(remaining) => {
                *remaining -= 1;
                if *remaining == 0 {
                    Ok(Reservation::Last)
                } else {
                    Ok(Reservation::Remaining(*remaining))
                }
            }
        }
    }

    async fn release(&self, campaign_id: Uuid) -> Result<()> {
        *self.counters.lock().unwrap().entry(campaign_id).or_insert(0) += 1;
        Ok(())
    }

    async fn schedule_activation(&self, campaign_id: Uuid, at_epoch_secs: i64) -> Result<()> {
        self.activations
            .lock()
            .unwrap()
            .insert(campaign_id, at_epoch_secs);
        Ok(())
    }

    async fn due_activations(&self, now_epoch_secs: i64) -> Result<Vec<Uuid>> {
        if self.fail_next_due.swap(false, Ordering::SeqCst) {
            return Err(Error::counter("injected index failure"));
        }

        let activations = self.activations.lock().unwrap();
        let mut due: Vec<(Uuid, i64)> = activations
            .iter()
            .filter(|(_, at)| **at <= now_epoch_secs)
            .map(|(id, at)| (*id, *at))
            .collect();
        due.sort_by_key(|(_, at)| *at);
        Ok(due.into_iter().map(|(id, _)| id).collect())
    }

    async fn remove_activation(&self, campaign_id: Uuid) -> Result<()> {
        self.activations.lock().unwrap().remove(&campaign_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|code| (*code).to_owned()).collect()
    }

    #[tokio::test]
    async fn reserving_an_existing_code_is_a_silent_conflict() {
        let store = MemoryCouponStore::new();

        let inserted = store.batch_reserve_codes(&codes(&["가가가", "000"])).await.unwrap();
        assert_eq!(inserted.len(), 2);

        let inserted = store.batch_reserve_codes(&codes(&["가가가", "111"])).await.unwrap();
        assert_eq!(inserted, codes(&["111"]));
    }

    #[tokio::test]
    async fn binding_only_touches_rows_still_in_the_reserved_state() {
        let store = MemoryCouponStore::new();
        let campaign_a = Uuid::new_v4();
        let campaign_b = Uuid::new_v4();

        store.batch_reserve_codes(&codes(&["aaa"])).await.unwrap();

        let bindings = vec![("aaa".to_owned(), campaign_a), ("zzz".to_owned(), campaign_a)];
        let updated = store.batch_bind_codes(&bindings).await.unwrap();
        assert!(updated.contains("aaa"));
        assert!(!updated.contains("zzz"));

        // A replayed binding finds no reserved row and updates nothing.
        let replay = vec![("aaa".to_owned(), campaign_b)];
        let updated = store.batch_bind_codes(&replay).await.unwrap();
        assert!(updated.is_empty());
        assert_eq!(store.coupon_row("aaa"), Some((Some(campaign_a), true)));
    }

    #[tokio::test]
    async fn issued_codes_list_in_reservation_order_regardless_of_bind_order() {
        let store = MemoryCouponStore::new();
        let campaign_id = Uuid::new_v4();

        store
            .batch_reserve_codes(&codes(&["first", "second", "third"]))
            .await
            .unwrap();

        // Bound out of order, listed in reservation (created_at) order.
        store
            .batch_bind_codes(&[("third".to_owned(), campaign_id)])
            .await
            .unwrap();
        store
            .batch_bind_codes(&[
                ("second".to_owned(), campaign_id),
                ("first".to_owned(), campaign_id),
            ])
            .await
            .unwrap();

        assert_eq!(
            store.list_issued_codes(campaign_id).await.unwrap(),
            codes(&["first", "second", "third"])
        );
    }

    #[tokio::test]
    async fn counter_walks_down_to_last_then_exhausted() {
        let counters = MemoryCounterStore::new();
        let campaign_id = Uuid::new_v4();

        counters.init_counter(campaign_id, 2).await.unwrap();
        assert_eq!(
            counters.reserve(campaign_id).await.unwrap(),
            Reservation::Remaining(1)
        );
        assert_eq!(counters.reserve(campaign_id).await.unwrap(), Reservation::Last);
        assert_eq!(
            counters.reserve(campaign_id).await.unwrap(),
            Reservation::Exhausted
        );

        // A released unit becomes the last unit again.
        counters.release(campaign_id).await.unwrap();
        assert_eq!(counters.reserve(campaign_id).await.unwrap(), Reservation::Last);
    }

    #[tokio::test]
    async fn reserving_an_unknown_counter_reports_exhausted() {
        let counters = MemoryCounterStore::new();
        assert_eq!(
            counters.reserve(Uuid::new_v4()).await.unwrap(),
            Reservation::Exhausted
        );
    }
}
