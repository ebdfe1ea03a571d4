//! Per-user lock registry.
//!
//! Every user id maps to one fair async mutex, created on first reference and
//! kept for the lifetime of the registry. Callers holding the guard of a user
//! exclude every other caller of that same user and nobody else.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, warn};

use crate::model::UserId;

/// Shared per-user lock. All callers for one user receive the same instance.
pub type LockHandle = Arc<tokio::sync::Mutex<()>>;

/// Waiting for a user's lock took longer than the configured bound.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("timed out after {waited:?} waiting for the lock of user {user}")]
pub struct LockTimeout {
    pub user: UserId,
    pub waited: Duration,
}

/// Proof of exclusive access to one user's ledger. Released on drop.
#[derive(Debug)]
pub struct UserGuard {
    user: UserId,
    _guard: OwnedMutexGuard<()>,
}

impl UserGuard {
    pub fn user(&self) -> UserId {
        self.user
    }
}

#[derive(Debug, Default)]
pub struct LockRegistry {
    locks: Mutex<HashMap<UserId, LockHandle>>,
    timeout: Option<Duration>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose [`lock`](Self::lock) gives up after `timeout`.
    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self {
            locks: Mutex::default(),
            timeout,
        }
    }

    /// Return the handle of `user`, creating it on first use.
    ///
    /// Get-or-create runs under the registry's own mutex, so concurrent first
    /// callers always agree on a single handle.
    pub fn acquire(&self, user: UserId) -> LockHandle {
        // The critical section only touches the map and cannot leave it
        // half-updated, so a poisoned registry is still usable.
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(user).or_insert_with(|| {
            debug!(user, "lock handle created");
            LockHandle::default()
        }))
    }

    /// Wait for exclusive access to `user`. Waiters are served in request order.
    pub async fn lock(&self, user: UserId) -> Result<UserGuard, LockTimeout> {
        let handle = self.acquire(user);
        let guard = match self.timeout {
            None => handle.lock_owned().await,
            Some(waited) => match tokio::time::timeout(waited, handle.lock_owned()).await {
                Ok(guard) => guard,
                Err(_) => {
                    warn!(user, ?waited, "lock wait timed out");
                    return Err(LockTimeout { user, waited });
                }
            },
        };
        Ok(UserGuard {
            user,
            _guard: guard,
        })
    }

    /// Number of distinct users seen so far.
    pub fn user_count(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
