//! Core domain types for the point ledger.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::Points;

/// User identifier.
pub type UserId = u64;

/// History entry identifier, increasing in insertion order.
pub type HistoryId = u64;

/// Milliseconds since the unix epoch.
pub type Millis = u64;

/// Current wall clock time in milliseconds.
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or_default()
}

/// Kind of a ledger mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    /// Points were added to the balance.
    Charge,
    /// Points were spent from the balance.
    Use,
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionType::Charge => f.write_str("charge"),
            TransactionType::Use => f.write_str("use"),
        }
    }
}

/// Current balance of one user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserBalance {
    pub user_id: UserId,
    pub points: Points,
    pub updated_at: Millis,
}

impl UserBalance {
    /// The implicit balance of a user with no stored record.
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            points: Points::ZERO,
            updated_at: 0,
        }
    }
}

/// One accepted ledger mutation. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: HistoryId,
    pub user_id: UserId,
    pub amount: Points,
    pub kind: TransactionType,
    pub timestamp: Millis,
}

impl HistoryEntry {
    /// Contribution of this entry to the user's balance.
    pub fn signed_amount(&self) -> Points {
        match self.kind {
            TransactionType::Charge => self.amount,
            TransactionType::Use => Points::ZERO - self.amount,
        }
    }
}

/// A mutation request, as fed to [`PointService::run`](crate::PointService::run).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Add points to a user's balance.
    Charge {
        user: UserId,
        amount: Points,
        timestamp: Millis,
    },
    /// Spend points from a user's balance.
    Use {
        user: UserId,
        amount: Points,
        timestamp: Millis,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(kind: TransactionType, amount: i64) -> HistoryEntry {
        HistoryEntry {
            id: 1,
            user_id: 1,
            amount: Points::new(amount),
            kind,
            timestamp: 0,
        }
    }

    #[test]
    fn empty_balance_is_zero() {
        let balance = UserBalance::empty(7);
        assert_eq!(balance.user_id, 7);
        assert_eq!(balance.points, Points::ZERO);
    }

    #[test]
    fn signed_amount_follows_kind() {
        assert_eq!(
            entry(TransactionType::Charge, 1000).signed_amount(),
            Points::new(1000)
        );
        assert_eq!(
            entry(TransactionType::Use, 300).signed_amount(),
            Points::new(-300)
        );
    }

    #[test]
    fn now_millis_is_after_2020() {
        assert!(now_millis() > 1_577_836_800_000);
    }
}
