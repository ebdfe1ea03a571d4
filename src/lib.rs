pub mod config;
pub mod csv;
pub mod ledger;
pub mod lock;
pub mod model;
pub mod points;
pub mod service;
pub mod store;

pub use config::{LedgerConfig, MAX_BALANCE, MIN_CHARGE};
pub use ledger::{Ledger, LedgerError};
pub use lock::{LockRegistry, LockTimeout};
pub use model::{HistoryEntry, Operation, TransactionType, UserBalance, UserId};
pub use points::Points;
pub use service::{PointService, RunReport};
