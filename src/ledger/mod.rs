//! Ledger business rules.
//!
//! [`Ledger`] validates charge and use requests against the current balance
//! and records accepted ones in both tables. It assumes the caller holds the
//! user's lock for the whole call; [`PointService`](crate::PointService) is
//! the only caller that does.

use tracing::{error, warn};

use crate::Points;
use crate::config::{MAX_BALANCE, MIN_CHARGE};
use crate::model::{HistoryEntry, Millis, TransactionType, UserBalance, UserId};
use crate::store::{BalanceStore, HistoryStore};

mod error;
pub use error::LedgerError;

/// Balance and history tables of every user.
#[derive(Debug, Default)]
pub struct Ledger<B, H> {
    balances: B,
    history: H,
}

impl<B: BalanceStore, H: HistoryStore> Ledger<B, H> {
    pub fn new(balances: B, history: H) -> Self {
        Self { balances, history }
    }

    /// Current balance, or an empty one if the user was never charged.
    pub async fn get_balance(&self, user: UserId) -> Result<UserBalance, LedgerError> {
        Ok(self
            .balances
            .select_by_id(user)
            .await?
            .unwrap_or_else(|| UserBalance::empty(user)))
    }

    /// Accepted mutations of `user`, oldest first.
    pub async fn get_history(&self, user: UserId) -> Result<Vec<HistoryEntry>, LedgerError> {
        Ok(self.history.select_all_by_user_id(user).await?)
    }

    /// Every stored balance, in no particular order.
    pub async fn balances(&self) -> Result<Vec<UserBalance>, LedgerError> {
        Ok(self.balances.select_all().await?)
    }

    /// Add `amount` to the balance of `user`:
    /// - Reject amounts below [`MIN_CHARGE`]
    /// - Reject if the new balance would exceed [`MAX_BALANCE`]
    /// - Record the charge, then store the new balance
    pub async fn charge(
        &self,
        user: UserId,
        amount: Points,
        timestamp: Millis,
    ) -> Result<UserBalance, LedgerError> {
        if amount < MIN_CHARGE {
            return Err(LedgerError::InvalidAmount {
                kind: TransactionType::Charge,
                amount,
                minimum: MIN_CHARGE,
            });
        }

        let balance = self.get_balance(user).await?.points;
        let next = balance
            .checked_add(amount)
            .filter(|next| *next <= MAX_BALANCE)
            .ok_or(LedgerError::LimitExceeded {
                user,
                balance,
                amount,
                limit: MAX_BALANCE,
            })?;

        self.commit(user, amount, TransactionType::Charge, timestamp, next)
            .await
    }

    /// Spend `amount` from the balance of `user`:
    /// - Reject non-positive amounts
    /// - Reject if the balance is lower than `amount`
    /// - Record the use, then store the new balance
    pub async fn use_points(
        &self,
        user: UserId,
        amount: Points,
        timestamp: Millis,
    ) -> Result<UserBalance, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount {
                kind: TransactionType::Use,
                amount,
                minimum: Points::new(1),
            });
        }

        let balance = self.get_balance(user).await?.points;
        if balance < amount {
            return Err(LedgerError::InsufficientBalance {
                user,
                balance,
                amount,
            });
        }

        self.commit(user, amount, TransactionType::Use, timestamp, balance - amount)
            .await
    }

    /// Write the history entry, then the balance. A failed balance write
    /// removes the entry again so neither table records the mutation.
    async fn commit(
        &self,
        user: UserId,
        amount: Points,
        kind: TransactionType,
        timestamp: Millis,
        next: Points,
    ) -> Result<UserBalance, LedgerError> {
        let entry = self.history.insert(user, amount, kind, timestamp).await?;

        match self.balances.insert_or_update(user, next).await {
            Ok(balance) => Ok(balance),
            Err(e) => {
                self.roll_back(&entry).await;
                Err(e.into())
            }
        }
    }

    async fn roll_back(&self, entry: &HistoryEntry) {
        match self.history.remove(entry.id).await {
            Ok(true) => {
                warn!(
                    user = entry.user_id,
                    history = entry.id,
                    "balance write failed, history entry rolled back"
                );
            }
            Ok(false) => {
                error!(
                    user = entry.user_id,
                    history = entry.id,
                    "balance write failed and history entry was already gone"
                );
            }
            Err(e) => {
                error!(
                    user = entry.user_id,
                    history = entry.id,
                    reason = %e,
                    "balance write failed and history entry could not be rolled back"
                );
            }
        }
    }
}
