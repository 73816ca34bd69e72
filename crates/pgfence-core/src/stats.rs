//! Table statistics used for size-based risk adjustment.
//!
//! The snapshot is produced out of band, either by the live introspection
//! collaborator (which queries `pg_stat_user_tables` under
//! `SET default_transaction_read_only = on` and
//! `SET application_name = 'pgfence'`) or by a pre-fetched JSON file.

use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::StatsError;

/// Row-count and size statistics for one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableStats {
    pub schema_name: String,
    pub table_name: String,
    pub row_count: u64,
    pub total_bytes: u64,
}

/// A stats file is either a bare array of tables or `{"tables": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StatsFile {
    List(Vec<TableStats>),
    Wrapped { tables: Vec<TableStats> },
}

/// Indexed statistics snapshot. Lookup tries the unqualified lowercase table
/// name first, then `schema.name`; the unqualified entry wins on conflict.
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    unqualified: FxHashMap<String, TableStats>,
    qualified: FxHashMap<String, TableStats>,
}

impl StatsSnapshot {
    pub fn from_tables(tables: Vec<TableStats>) -> Self {
        let mut snapshot = Self::default();
        for table in tables {
            let unqualified = table.table_name.to_lowercase();
            let qualified = format!(
                "{}.{}",
                table.schema_name.to_lowercase(),
                table.table_name.to_lowercase()
            );
            snapshot.qualified.insert(qualified, table.clone());
            snapshot.unqualified.insert(unqualified, table);
        }
        snapshot
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: StatsFile = serde_json::from_str(json)?;
        let tables = match file {
            StatsFile::List(tables) => tables,
            StatsFile::Wrapped { tables } => tables,
        };
        Ok(Self::from_tables(tables))
    }

    pub fn load(path: &Path) -> Result<Self, StatsError> {
        let body = std::fs::read_to_string(path).map_err(|source| StatsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&body).map_err(|err| StatsError::Parse {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    /// Look up a table by name, qualified (`schema.name`) or not.
    pub fn lookup(&self, table: &str) -> Option<&TableStats> {
        let key = table.to_lowercase();
        self.unqualified
            .get(&key)
            .or_else(|| self.qualified.get(&key))
    }

    pub fn is_empty(&self) -> bool {
        self.unqualified.is_empty() && self.qualified.is_empty()
    }
}
