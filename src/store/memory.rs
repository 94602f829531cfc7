//! In-memory settlement store for tests and embedders without a database.

use super::{BoostWrite, SettlementStore, StoreError};
use crate::domain::{
    Boost, BoostId, BoostStatus, BoostUpdate, Decimal, Disposal, DisposalId, EarningId,
    EarningStatus, Order, OrderId, ReleaseOutcome, UserEarning, UserId,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct State {
    boosts: HashMap<BoostId, Boost>,
    earnings: HashMap<EarningId, UserEarning>,
    balances: HashMap<UserId, Decimal>,
    orders: HashMap<OrderId, Order>,
    disposals: HashMap<DisposalId, Disposal>,
    failing_boosts: HashSet<BoostId>,
    failing_earnings: HashSet<EarningId>,
    /// Versions written "concurrently" just before the next write to a boost.
    interleaved_boosts: HashMap<BoostId, Boost>,
}

/// Settlement store holding every record in process memory.
///
/// A single mutex around the whole state makes each method atomic.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_boost(self, boost: Boost) -> Self {
        self.lock().boosts.insert(boost.id.clone(), boost);
        self
    }

    pub fn with_earning(self, earning: UserEarning) -> Self {
        self.lock().earnings.insert(earning.id.clone(), earning);
        self
    }

    /// Register a user with a starting available balance.
    pub fn with_user(self, user_id: UserId, balance: Decimal) -> Self {
        self.lock().balances.insert(user_id, balance);
        self
    }

    pub fn with_order(self, order: Order) -> Self {
        self.lock().orders.insert(order.id.clone(), order);
        self
    }

    /// Make every write to this boost fail.
    pub fn fail_writes_to_boost(&self, id: &BoostId) {
        self.lock().failing_boosts.insert(id.clone());
    }

    /// Make every release of this earning fail.
    pub fn fail_releases_of(&self, id: &EarningId) {
        self.lock().failing_earnings.insert(id.clone());
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.failing_boosts.clear();
        state.failing_earnings.clear();
    }

    /// Replace the stored boost with `boost` right before the next
    /// `update_boost` for its id, as a concurrent run landing between the
    /// caller's load and its write would.
    pub fn interleave_boost_write(&self, boost: Boost) {
        self.lock().interleaved_boosts.insert(boost.id.clone(), boost);
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn find_active_boosts(&self) -> Result<Vec<Boost>, StoreError> {
        let state = self.lock();
        let mut boosts: Vec<Boost> = state
            .boosts
            .values()
            .filter(|b| b.is_active())
            .cloned()
            .collect();
        boosts.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(boosts)
    }

    async fn find_boost(&self, id: &BoostId) -> Result<Option<Boost>, StoreError> {
        Ok(self.lock().boosts.get(id).cloned())
    }

    async fn update_boost(
        &self,
        id: &BoostId,
        expected_until: DateTime<Utc>,
        update: BoostUpdate,
    ) -> Result<BoostWrite, StoreError> {
        let mut state = self.lock();
        if state.failing_boosts.contains(id) {
            return Err(StoreError::Unavailable(format!("write to boost {} failed", id)));
        }
        if let Some(concurrent) = state.interleaved_boosts.remove(id) {
            state.boosts.insert(id.clone(), concurrent);
        }
        let boost = state
            .boosts
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found("boost", id))?;

        if boost.status != BoostStatus::Active || boost.until_date != expected_until {
            return Ok(BoostWrite::Stale);
        }

        boost.status = update.status;
        boost.until_date = update.until_date;
        boost.updated_at = update.updated_at;
        Ok(BoostWrite::Applied)
    }

    async fn create_earning(&self, earning: &UserEarning) -> Result<UserEarning, StoreError> {
        let mut state = self.lock();
        if state
            .earnings
            .values()
            .any(|e| e.order_id == earning.order_id)
        {
            return Err(StoreError::Conflict(format!(
                "earning already recorded for order {}",
                earning.order_id
            )));
        }
        state.earnings.insert(earning.id.clone(), earning.clone());
        Ok(earning.clone())
    }

    async fn find_earning(&self, id: &EarningId) -> Result<Option<UserEarning>, StoreError> {
        Ok(self.lock().earnings.get(id).cloned())
    }

    async fn find_due_earnings(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<UserEarning>, StoreError> {
        let state = self.lock();
        let mut due: Vec<UserEarning> = state
            .earnings
            .values()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect();
        due.sort_by(|a, b| a.release_at.cmp(&b.release_at).then(a.id.cmp(&b.id)));
        Ok(due)
    }

    async fn release_earning(
        &self,
        earning_id: &EarningId,
        user_id: &UserId,
        net_amount: Decimal,
        released_at: DateTime<Utc>,
    ) -> Result<ReleaseOutcome, StoreError> {
        let mut state = self.lock();
        if state.failing_earnings.contains(earning_id) {
            return Err(StoreError::Unavailable(format!(
                "release of earning {} failed",
                earning_id
            )));
        }

        let status = state
            .earnings
            .get(earning_id)
            .map(|e| e.status)
            .ok_or_else(|| StoreError::not_found("earning", earning_id))?;
        if status == EarningStatus::Released {
            return Ok(ReleaseOutcome::AlreadyReleased);
        }

        // Both checks pass before either write so a failure changes nothing.
        let balance = state
            .balances
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found("user", user_id))?;
        *balance = *balance + net_amount;

        if let Some(earning) = state.earnings.get_mut(earning_id) {
            earning.status = EarningStatus::Released;
            earning.released_at = Some(released_at);
        }
        Ok(ReleaseOutcome::Released)
    }

    async fn available_balance(&self, user_id: &UserId) -> Result<Option<Decimal>, StoreError> {
        Ok(self.lock().balances.get(user_id).copied())
    }

    async fn find_order(&self, id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.lock().orders.get(id).cloned())
    }

    async fn find_disposal(&self, id: &DisposalId) -> Result<Option<Disposal>, StoreError> {
        Ok(self.lock().disposals.get(id).cloned())
    }

    async fn create_disposal(&self, disposal: &Disposal) -> Result<Disposal, StoreError> {
        let mut state = self.lock();
        if state.disposals.contains_key(&disposal.id) {
            return Err(StoreError::Conflict(format!(
                "disposal {} already exists",
                disposal.id
            )));
        }
        state.disposals.insert(disposal.id.clone(), disposal.clone());
        Ok(disposal.clone())
    }
}
