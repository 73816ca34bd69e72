//! Schema snapshot types.
//!
//! A snapshot is a JSON export of the current database schema produced by the
//! introspection collaborator. Rules consult it to sharpen usage-dependent
//! findings, e.g. confirming that an `ALTER COLUMN ... TYPE varchar(N)` is a
//! pure widening of the declared length.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::StatsError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaSnapshot {
    pub version: u32,
    pub generated_at: String,
    #[serde(default)]
    pub tables: Vec<SnapshotTable>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTable {
    pub schema_name: String,
    pub table_name: String,
    #[serde(default)]
    pub columns: Vec<SnapshotColumn>,
    #[serde(default)]
    pub constraints: Vec<SnapshotConstraint>,
    #[serde(default)]
    pub indexes: Vec<SnapshotIndex>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotColumn {
    pub column_name: String,
    pub data_type: String,
    pub udt_name: String,
    pub character_maximum_length: Option<u32>,
    pub numeric_precision: Option<u32>,
    pub numeric_scale: Option<u32>,
    pub is_nullable: bool,
    pub column_default: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotConstraint {
    pub constraint_name: String,
    pub constraint_type: String,
    #[serde(default)]
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotIndex {
    pub index_name: String,
    pub is_unique: bool,
    #[serde(default)]
    pub columns: Vec<String>,
}

impl SchemaSnapshot {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
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

    /// Case-insensitive column lookup by unqualified table name.
    pub fn column(&self, table: &str, column: &str) -> Option<&SnapshotColumn> {
        self.tables
            .iter()
            .find(|t| t.table_name.eq_ignore_ascii_case(table))
            .and_then(|t| {
                t.columns
                    .iter()
                    .find(|c| c.column_name.eq_ignore_ascii_case(column))
            })
    }
}
