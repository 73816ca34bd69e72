//! PostgreSQL table-level lock modes and their conflict semantics.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The eight PostgreSQL table locks, declared from least to most restrictive.
/// The derived `Ord` is the restrictiveness ordinal; `max` of two modes is the
/// stronger lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum LockMode {
    #[serde(rename = "ACCESS SHARE")]
    AccessShare,
    #[serde(rename = "ROW SHARE")]
    RowShare,
    #[serde(rename = "ROW EXCLUSIVE")]
    RowExclusive,
    #[serde(rename = "SHARE UPDATE EXCLUSIVE")]
    ShareUpdateExclusive,
    #[serde(rename = "SHARE")]
    Share,
    #[serde(rename = "SHARE ROW EXCLUSIVE")]
    ShareRowExclusive,
    #[serde(rename = "EXCLUSIVE")]
    Exclusive,
    #[serde(rename = "ACCESS EXCLUSIVE")]
    AccessExclusive,
}

impl LockMode {
    pub const ALL: [LockMode; 8] = [
        Self::AccessShare,
        Self::RowShare,
        Self::RowExclusive,
        Self::ShareUpdateExclusive,
        Self::Share,
        Self::ShareRowExclusive,
        Self::Exclusive,
        Self::AccessExclusive,
    ];

    /// The conflict matrix from the PostgreSQL documentation (symmetric).
    pub fn conflicts_with(self, other: LockMode) -> bool {
        use LockMode::*;
        match self {
            AccessShare => matches!(other, AccessExclusive),
            RowShare => matches!(other, Exclusive | AccessExclusive),
            RowExclusive => matches!(other, Share | ShareRowExclusive | Exclusive | AccessExclusive),
            ShareUpdateExclusive => matches!(
                other,
                ShareUpdateExclusive | Share | ShareRowExclusive | Exclusive | AccessExclusive
            ),
            Share => matches!(
                other,
                RowExclusive | ShareUpdateExclusive | ShareRowExclusive | Exclusive | AccessExclusive
            ),
            ShareRowExclusive => matches!(
                other,
                RowExclusive
                    | ShareUpdateExclusive
                    | Share
                    | ShareRowExclusive
                    | Exclusive
                    | AccessExclusive
            ),
            Exclusive => matches!(
                other,
                RowShare
                    | RowExclusive
                    | ShareUpdateExclusive
                    | Share
                    | ShareRowExclusive
                    | Exclusive
                    | AccessExclusive
            ),
            AccessExclusive => true,
        }
    }

    /// What this lock blocks, derived from the matrix: readers take ACCESS
    /// SHARE, writers ROW EXCLUSIVE, and other DDL ACCESS EXCLUSIVE.
    pub fn blocked_ops(self) -> BlockedOps {
        BlockedOps {
            reads: self.conflicts_with(Self::AccessShare),
            writes: self.conflicts_with(Self::RowExclusive),
            other_ddl: self.conflicts_with(Self::AccessExclusive),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AccessShare => "ACCESS SHARE",
            Self::RowShare => "ROW SHARE",
            Self::RowExclusive => "ROW EXCLUSIVE",
            Self::ShareUpdateExclusive => "SHARE UPDATE EXCLUSIVE",
            Self::Share => "SHARE",
            Self::ShareRowExclusive => "SHARE ROW EXCLUSIVE",
            Self::Exclusive => "EXCLUSIVE",
            Self::AccessExclusive => "ACCESS EXCLUSIVE",
        }
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The operations a held lock excludes on its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockedOps {
    pub reads: bool,
    pub writes: bool,
    pub other_ddl: bool,
}
