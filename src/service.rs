//! Serialized access to the ledger.
//!
//! [`PointService`] is the entry point for callers. Each operation takes the
//! lock of its user, runs the matching [`Ledger`] operation and releases the
//! lock when the guard drops. Charges and uses run on their own task, which
//! owns the guard: once the lock is held the mutation completes even if the
//! caller stops waiting for it, so a dropped caller never leaves a history
//! entry without its balance write. Operations for different users never
//! wait on each other.

use std::future::Future;
use std::sync::Arc;

use tokio::task::JoinSet;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::Points;
use crate::config::LedgerConfig;
use crate::ledger::{Ledger, LedgerError};
use crate::lock::{LockRegistry, UserGuard};
use crate::model::{HistoryEntry, Millis, Operation, UserBalance, UserId};
use crate::store::{BalanceStore, HistoryStore, MemoryBalanceStore, MemoryHistoryStore};

/// Outcome counts of [`PointService::run`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub applied: usize,
    pub skipped: usize,
}

pub struct PointService<B = MemoryBalanceStore, H = MemoryHistoryStore> {
    ledger: Arc<Ledger<B, H>>,
    locks: LockRegistry,
}

impl PointService {
    /// Service over in-memory tables, configured by `config`.
    pub fn in_memory(config: &LedgerConfig) -> Self {
        Self::with_lock_timeout(
            MemoryBalanceStore::with_latency(config.store_latency),
            MemoryHistoryStore::with_latency(config.store_latency),
            config.lock_timeout,
        )
    }
}

/// Public API
impl<B, H> PointService<B, H>
where
    B: BalanceStore + 'static,
    H: HistoryStore + 'static,
{
    pub fn new(balances: B, history: H) -> Self {
        Self::with_lock_timeout(balances, history, None)
    }

    pub fn with_lock_timeout(
        balances: B,
        history: H,
        lock_timeout: Option<std::time::Duration>,
    ) -> Self {
        Self {
            ledger: Arc::new(Ledger::new(balances, history)),
            locks: LockRegistry::with_timeout(lock_timeout),
        }
    }

    pub async fn get_balance(&self, user: UserId) -> Result<UserBalance, LedgerError> {
        let _guard = self.locks.lock(user).await?;
        self.ledger.get_balance(user).await
    }

    pub async fn get_history(&self, user: UserId) -> Result<Vec<HistoryEntry>, LedgerError> {
        let _guard = self.locks.lock(user).await?;
        self.ledger.get_history(user).await
    }

    pub async fn charge(
        &self,
        user: UserId,
        amount: Points,
        timestamp: Millis,
    ) -> Result<UserBalance, LedgerError> {
        let guard = self.locks.lock(user).await?;
        let ledger = Arc::clone(&self.ledger);
        Self::mutate(guard, "charge", amount, async move {
            ledger.charge(user, amount, timestamp).await
        })
        .await
    }

    pub async fn use_points(
        &self,
        user: UserId,
        amount: Points,
        timestamp: Millis,
    ) -> Result<UserBalance, LedgerError> {
        let guard = self.locks.lock(user).await?;
        let ledger = Arc::clone(&self.ledger);
        Self::mutate(guard, "use", amount, async move {
            ledger.use_points(user, amount, timestamp).await
        })
        .await
    }

    /// Apply a single operation.
    pub async fn apply(&self, op: Operation) -> Result<UserBalance, LedgerError> {
        match op {
            Operation::Charge {
                user,
                amount,
                timestamp,
            } => self.charge(user, amount, timestamp).await,
            Operation::Use {
                user,
                amount,
                timestamp,
            } => self.use_points(user, amount, timestamp).await,
        }
    }

    /// Stored balances of every user, without taking user locks. Each row
    /// reflects a completed operation.
    pub async fn balances(&self) -> Result<Vec<UserBalance>, LedgerError> {
        self.ledger.balances().await
    }

    /// Number of users that ever had a lock handle created.
    pub fn known_users(&self) -> usize {
        self.locks.user_count()
    }

    /// Run every operation of `stream` on its own task and wait for all of
    /// them. Failed operations are logged and skipped.
    ///
    /// Operations of one user are applied in lock acquisition order, which is
    /// not necessarily stream order.
    pub async fn run(
        self: &Arc<Self>,
        mut stream: impl Stream<Item = Operation> + Unpin,
    ) -> RunReport {
        let mut tasks = JoinSet::new();
        while let Some(op) = stream.next().await {
            let service = Arc::clone(self);
            tasks.spawn(async move { service.apply(op).await });
        }

        let mut report = RunReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(_)) => report.applied += 1,
                // already logged by `log_result` or the lock registry
                Ok(Err(_)) => report.skipped += 1,
                Err(e) => {
                    warn!(reason = %e, "operation task failed");
                    report.skipped += 1;
                }
            }
        }
        report
    }
}

/// Private API
impl<B, H> PointService<B, H> {
    /// Run `mutation` to completion on its own task while `guard` is held.
    /// Dropping the returned future only stops waiting for the outcome.
    async fn mutate<F>(
        guard: UserGuard,
        op: &'static str,
        amount: Points,
        mutation: F,
    ) -> Result<UserBalance, LedgerError>
    where
        F: Future<Output = Result<UserBalance, LedgerError>> + Send + 'static,
    {
        let user = guard.user();
        let task = tokio::spawn(async move {
            let _guard = guard;
            let result = mutation.await;
            log_result(op, user, amount, &result);
            result
        });

        match task.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => {
                warn!(user, "{op} task cancelled by runtime shutdown");
                Err(LedgerError::Aborted { user })
            }
        }
    }
}

/// Small helper to log mutation results
fn log_result(op: &str, user: UserId, amount: Points, result: &Result<UserBalance, LedgerError>) {
    match result {
        Ok(balance) => {
            info!(
                user = %user,
                amount = %amount,
                balance = %balance.points,
                "{op} applied"
            );
        }
        Err(e) => {
            info!(
                user = %user,
                amount = %amount,
                reason = %e,
                "{op} skipped"
            );
        }
    }
}

impl Default for PointService {
    fn default() -> Self {
        Self::new(MemoryBalanceStore::new(), MemoryHistoryStore::new())
    }
}
