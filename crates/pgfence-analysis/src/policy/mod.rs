//! Migration-scope policy checks.
//!
//! The policy engine walks one file's ordered statement list exactly once,
//! tracking timeouts, transaction state, and held locks.

mod duration;
mod engine;
mod transaction;
mod types;

pub use duration::{parse_timeout, TimeoutValue};
pub use engine::PolicyEngine;
pub use transaction::{LockOutcome, TransactionState};
pub use types::{PolicyViolation, Severity};
