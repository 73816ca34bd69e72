//! The transaction state machine.
//!
//! Tracks depth, held table locks, and savepoint snapshots while the policy
//! engine walks one file. Each operation returns the derived facts the
//! walker needs, keeping the walk loop linear.

use pgfence_core::LockMode;
use rustc_hash::{FxHashMap, FxHashSet};

/// Live transaction state. Invariants:
/// - `active` iff `depth > 0`;
/// - top-level COMMIT/ROLLBACK resets every field;
/// - ROLLBACK TO a savepoint restores the lock map from its snapshot;
/// - the ACCESS-EXCLUSIVE set is exactly the lock-map entries at that mode.
#[derive(Debug, Default)]
pub struct TransactionState {
    active: bool,
    depth: u32,
    savepoints: Vec<String>,
    locks: FxHashMap<String, LockMode>,
    snapshots: FxHashMap<String, FxHashMap<String, LockMode>>,
    access_exclusive: FxHashSet<String>,
    statement_count: u32,
}

/// What recording a lock revealed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOutcome {
    /// The transaction now holds ACCESS EXCLUSIVE on two distinct tables.
    pub wide_lock_window: bool,
    /// A table already under ACCESS EXCLUSIVE, other than the one just locked.
    pub previous_table: Option<String>,
}

impl TransactionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn statement_count(&self) -> u32 {
        self.statement_count
    }

    pub fn begin(&mut self) {
        self.depth += 1;
        self.active = true;
    }

    /// Top-level COMMIT and ROLLBACK behave identically here.
    pub fn commit(&mut self) {
        self.end_transaction();
    }

    pub fn rollback(&mut self) {
        self.end_transaction();
    }

    fn end_transaction(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.depth == 0 {
            *self = Self::default();
        }
    }

    pub fn savepoint(&mut self, name: &str) {
        let folded = name.to_lowercase();
        self.snapshots.insert(folded.clone(), self.locks.clone());
        self.savepoints.push(folded);
    }

    /// RELEASE pops the named savepoint and everything above it.
    pub fn release(&mut self, name: &str) {
        let folded = name.to_lowercase();
        if let Some(position) = self.savepoints.iter().rposition(|s| *s == folded) {
            for discarded in self.savepoints.drain(position..) {
                self.snapshots.remove(&discarded);
            }
        }
    }

    /// ROLLBACK TO pops savepoints strictly above the named one and restores
    /// the lock map from its snapshot.
    pub fn rollback_to(&mut self, name: &str) {
        let folded = name.to_lowercase();
        let Some(position) = self.savepoints.iter().rposition(|s| *s == folded) else {
            return;
        };
        for discarded in self.savepoints.drain(position + 1..) {
            self.snapshots.remove(&discarded);
        }
        if let Some(snapshot) = self.snapshots.get(&folded) {
            self.locks = snapshot.clone();
        }
        self.access_exclusive = self
            .locks
            .iter()
            .filter(|(_, mode)| **mode == LockMode::AccessExclusive)
            .map(|(table, _)| table.clone())
            .collect();
    }

    /// Record that the current statement acquires `mode` on `table`,
    /// keeping the strongest lock per table.
    pub fn record_lock(&mut self, table: &str, mode: LockMode) -> LockOutcome {
        let folded = table.to_lowercase();
        let entry = self.locks.entry(folded.clone()).or_insert(mode);
        *entry = (*entry).max(mode);

        if *entry != LockMode::AccessExclusive {
            return LockOutcome {
                wide_lock_window: false,
                previous_table: None,
            };
        }

        let previous_table = self
            .access_exclusive
            .iter()
            .find(|held| **held != folded)
            .cloned();
        let newly_widened = previous_table.is_some() && !self.access_exclusive.contains(&folded);
        self.access_exclusive.insert(folded);

        LockOutcome {
            wide_lock_window: newly_widened,
            previous_table,
        }
    }

    pub fn note_statement(&mut self) {
        if self.active {
            self.statement_count += 1;
        }
    }

    pub fn locked_mode(&self, table: &str) -> Option<LockMode> {
        self.locks.get(&table.to_lowercase()).copied()
    }

    pub fn access_exclusive_tables(&self) -> impl Iterator<Item = &str> {
        self.access_exclusive.iter().map(String::as_str)
    }
}
