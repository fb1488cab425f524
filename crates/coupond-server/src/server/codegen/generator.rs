//! The code pool and pending-issuance buffer.

use coupond_core::{code, Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

use crate::server::store::CouponStore;

#[derive(Default)]
struct PoolState {
    /// Reserved-but-unused codes, handed out FIFO.
    pool: VecDeque<String>,
    /// Codes handed out but not yet durably bound to their campaign.
    pending: HashMap<String, Uuid>,
}

/// Produces unique coupon codes at memory speed.
///
/// Codes are pre-reserved in the durable store in batches of `batch_size`;
/// the store's unique constraint on `code` resolves collisions, so candidates
/// lost to a conflict are simply discarded. A refill runs whenever the pool
/// drops to `refill_threshold` or below.
///
/// The state mutex is never held across store I/O. A refill takes the async
/// refill gate instead, generates its candidates, performs the batch insert,
/// and only then reacquires the state mutex to append the survivors.
pub struct CodeGenerator {
    store: Arc<dyn CouponStore>,
    batch_size: usize,
    refill_threshold: usize,
    state: Mutex<PoolState>,
    refill_gate: tokio::sync::Mutex<()>,
}

impl CodeGenerator {
    pub fn new(store: Arc<dyn CouponStore>, batch_size: usize, refill_threshold: usize) -> Self {
        Self {
            store,
            batch_size,
            refill_threshold,
            state: Mutex::new(PoolState::default()),
            refill_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Removes the pool head and records it as pending for `campaign_id`.
    ///
    /// A refill failure is surfaced only when the pool is empty; while codes
    /// remain, issuance keeps going and the next call retries the refill.
    pub async fn generate(&self, campaign_id: Uuid) -> Result<String> {
        let needs_refill = self.lock_state()?.pool.len() <= self.refill_threshold;
        if needs_refill {
            if let Err(err) = self.refill().await {
                if self.lock_state()?.pool.is_empty() {
                    return Err(err);
                }
                tracing::warn!(%err, "code pool refill failed; serving from the remaining pool");
            }
        }

        let mut state = self.lock_state()?;
        let code = state
            .pool
            .pop_front()
            .ok_or_else(|| Error::storage("code pool exhausted"))?;
        state.pending.insert(code.clone(), campaign_id);
        Ok(code)
    }

    /// Snapshots the pending buffer and binds it to the durable store in one
    /// batch. Codes whose rows were not updated, or the whole snapshot on a
    /// transport failure, are re-queued for the next flush.
    ///
    /// Returns the number of codes durably bound.
    pub async fn flush_pending(&self) -> Result<usize> {
        let snapshot = std::mem::take(&mut self.lock_state()?.pending);
        if snapshot.is_empty() {
            return Ok(0);
        }

        let bindings: Vec<(String, Uuid)> = snapshot.into_iter().collect();
        let total = bindings.len();

        match self.store.batch_bind_codes(&bindings).await {
            Ok(updated) => {
                let missed: Vec<(String, Uuid)> = bindings
                    .into_iter()
                    .filter(|(code, _)| !updated.contains(code))
                    .collect();
                let bound = total - missed.len();
                if !missed.is_empty() {
                    tracing::warn!(
                        requeued = missed.len(),
                        "some coupon rows were not updated; re-queueing"
                    );
                    self.restore_pending(missed)?;
                }
                Ok(bound)
            }
            Err(err) => {
                self.restore_pending(bindings)?;
                Err(err)
            }
        }
    }

    /// Whether any handed-out codes still await their durable binding.
    pub fn has_pending(&self) -> bool {
        self.state
            .lock()
            .map(|state| !state.pending.is_empty())
            .unwrap_or(false)
    }

    async fn refill(&self) -> Result<()> {
        let _gate = self.refill_gate.lock().await;

        // A concurrent caller may have refilled while we waited on the gate.
        if self.lock_state()?.pool.len() > self.refill_threshold {
            return Ok(());
        }

        let candidates = self.candidate_batch();
        let reserved = self.store.batch_reserve_codes(&candidates).await?;
        let discarded = candidates.len() - reserved.len();
        if discarded > 0 {
            tracing::debug!(discarded, "candidate codes lost to existing reservations");
        }

        self.lock_state()?.pool.extend(reserved);
        Ok(())
    }

    fn candidate_batch(&self) -> Vec<String> {
        let mut rng = rand::rng();
        (0..self.batch_size)
            .map(|_| code::random_code(&mut rng))
            .collect()
    }

    fn restore_pending(&self, entries: Vec<(String, Uuid)>) -> Result<()> {
        let mut state = self.lock_state()?;
        for (code, campaign_id) in entries {
            state.pending.insert(code, campaign_id);
        }
        Ok(())
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, PoolState>> {
        self.state
            .lock()
            .map_err(|_| Error::storage("code pool mutex poisoned"))
    }

    #[cfg(test)]
    pub(crate) fn pool_len(&self) -> usize {
        self.state.lock().unwrap().pool.len()
    }

    #[cfg(test)]
    pub(crate) fn pending_len(&self) -> usize {
        self.state.lock().unwrap().pending.len()
    }
}
