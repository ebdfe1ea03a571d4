//! Error types for ledger operations.

use thiserror::Error;

use crate::Points;
use crate::lock::LockTimeout;
use crate::model::{TransactionType, UserId};
use crate::store::StoreError;

/// Failure of a ledger operation. Nothing is committed when one is returned,
/// so every variant is safe to retry.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid {kind} amount {amount}: must be at least {minimum}")]
    InvalidAmount {
        kind: TransactionType,
        amount: Points,
        minimum: Points,
    },

    #[error(
        "charging {amount} to user {user} would exceed the maximum balance of {limit} (current {balance})"
    )]
    LimitExceeded {
        user: UserId,
        balance: Points,
        amount: Points,
        limit: Points,
    },

    #[error("insufficient balance for user {user}: balance {balance}, requested {amount}")]
    InsufficientBalance {
        user: UserId,
        balance: Points,
        amount: Points,
    },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("{0}")]
    LockTimeout(#[from] LockTimeout),

    #[error("operation on user {user} was cancelled before it finished")]
    Aborted { user: UserId },
}
