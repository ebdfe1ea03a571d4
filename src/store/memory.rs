use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::{BalanceStore, HistoryStore, StoreError};
use crate::Points;
use crate::model::{
    HistoryEntry, HistoryId, Millis, TransactionType, UserBalance, UserId, now_millis,
};

/// Sleep for the configured store latency, if any.
async fn simulate_io(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

fn lock<'a, T>(table: &'static str, mutex: &'a Mutex<T>) -> Result<MutexGuard<'a, T>, StoreError> {
    mutex
        .lock()
        .map_err(|_| StoreError::unavailable(table, "table lock poisoned"))
}

/// In-memory balance table.
#[derive(Debug, Default)]
pub struct MemoryBalanceStore {
    rows: Mutex<HashMap<UserId, UserBalance>>,
    latency: Duration,
}

impl MemoryBalanceStore {
    const TABLE: &'static str = "balance";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            rows: Mutex::default(),
            latency,
        }
    }
}

impl BalanceStore for MemoryBalanceStore {
    async fn select_by_id(&self, user: UserId) -> Result<Option<UserBalance>, StoreError> {
        simulate_io(self.latency).await;
        let rows = lock(Self::TABLE, &self.rows)?;
        Ok(rows.get(&user).copied())
    }

    async fn insert_or_update(
        &self,
        user: UserId,
        points: Points,
    ) -> Result<UserBalance, StoreError> {
        simulate_io(self.latency).await;
        let balance = UserBalance {
            user_id: user,
            points,
            updated_at: now_millis(),
        };
        lock(Self::TABLE, &self.rows)?.insert(user, balance);
        Ok(balance)
    }

    async fn select_all(&self) -> Result<Vec<UserBalance>, StoreError> {
        let rows = lock(Self::TABLE, &self.rows)?;
        Ok(rows.values().copied().collect())
    }
}

#[derive(Debug, Default)]
struct HistoryRows {
    next_id: HistoryId,
    entries: Vec<HistoryEntry>,
}

/// In-memory history table. Ids start at 1.
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    rows: Mutex<HistoryRows>,
    latency: Duration,
}

impl MemoryHistoryStore {
    const TABLE: &'static str = "history";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            rows: Mutex::default(),
            latency,
        }
    }
}

impl HistoryStore for MemoryHistoryStore {
    async fn insert(
        &self,
        user: UserId,
        amount: Points,
        kind: TransactionType,
        timestamp: Millis,
    ) -> Result<HistoryEntry, StoreError> {
        simulate_io(self.latency).await;
        let mut rows = lock(Self::TABLE, &self.rows)?;
        rows.next_id += 1;
        let entry = HistoryEntry {
            id: rows.next_id,
            user_id: user,
            amount,
            kind,
            timestamp,
        };
        rows.entries.push(entry.clone());
        Ok(entry)
    }

    async fn select_all_by_user_id(&self, user: UserId) -> Result<Vec<HistoryEntry>, StoreError> {
        simulate_io(self.latency).await;
        let rows = lock(Self::TABLE, &self.rows)?;
        Ok(rows
            .entries
            .iter()
            .filter(|e| e.user_id == user)
            .cloned()
            .collect())
    }

    async fn remove(&self, id: HistoryId) -> Result<bool, StoreError> {
        let mut rows = lock(Self::TABLE, &self.rows)?;
        let before = rows.entries.len();
        rows.entries.retain(|e| e.id != id);
        Ok(rows.entries.len() != before)
    }
}
