//! Storage collaborators of the ledger.
//!
//! Two tables back the ledger: the balance table (one row per user) and the
//! history table (append-only, one row per accepted mutation). Each call is
//! atomic on its own; the ledger serializes multi-call sequences per user.

use std::future::Future;

use thiserror::Error;

use crate::Points;
use crate::model::{HistoryEntry, HistoryId, Millis, TransactionType, UserBalance, UserId};

mod memory;
pub use memory::{MemoryBalanceStore, MemoryHistoryStore};

/// Failure of an underlying store call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("{table} table unavailable: {reason}")]
    Unavailable { table: &'static str, reason: String },
}

impl StoreError {
    pub fn unavailable(table: &'static str, reason: impl Into<String>) -> Self {
        StoreError::Unavailable {
            table,
            reason: reason.into(),
        }
    }
}

/// Current balance per user.
pub trait BalanceStore: Send + Sync {
    /// Stored balance of `user`, if any.
    fn select_by_id(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Option<UserBalance>, StoreError>> + Send;

    /// Replace the balance of `user` with `points`.
    fn insert_or_update(
        &self,
        user: UserId,
        points: Points,
    ) -> impl Future<Output = Result<UserBalance, StoreError>> + Send;

    /// Every stored balance, in no particular order.
    fn select_all(&self) -> impl Future<Output = Result<Vec<UserBalance>, StoreError>> + Send;
}

/// Append-only transaction log.
pub trait HistoryStore: Send + Sync {
    /// Append an entry and return it with its assigned id.
    fn insert(
        &self,
        user: UserId,
        amount: Points,
        kind: TransactionType,
        timestamp: Millis,
    ) -> impl Future<Output = Result<HistoryEntry, StoreError>> + Send;

    /// Entries of `user` in insertion order.
    fn select_all_by_user_id(
        &self,
        user: UserId,
    ) -> impl Future<Output = Result<Vec<HistoryEntry>, StoreError>> + Send;

    /// Drop an entry whose balance write never happened. Returns whether
    /// the entry existed.
    fn remove(&self, id: HistoryId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}
