//! The built-in rule catalogue.

use super::add_column::{
    AddColumnDefault, AddColumnGenerated, AddColumnJson, AddColumnNotNull, AddColumnSerial,
};
use super::alter_column::{AlterColumnType, SetNotNull};
use super::constraints::{
    AddCheck, AddExclude, AddForeignKey, AddPrimaryKey, AddUnique, ValidateConstraint,
};
use super::dml::DeleteWithoutWhere;
use super::drops::{DropColumn, DropTable, Truncate};
use super::enums::AlterEnumAddValue;
use super::indexes::{CreateIndexNotConcurrent, DropIndexNotConcurrent};
use super::maintenance::{RefreshMatView, ReindexNonConcurrent, VacuumFull};
use super::partitions::{AttachPartition, DetachPartition};
use super::preferences::{PreferBigint, PreferText, PreferTimestamptz};
use super::renames::{RenameColumn, RenameTable};
use super::robust::RobustDdl;
use super::triggers::{CreateTrigger, DropTrigger, EnableDisableTrigger};
use super::Rule;

/// Every built-in rule, in catalogue order.
pub fn builtin_rules() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(AddColumnNotNull),
        Box::new(AddColumnDefault),
        Box::new(AddColumnJson),
        Box::new(AddColumnSerial),
        Box::new(AddColumnGenerated),
        Box::new(CreateIndexNotConcurrent),
        Box::new(DropIndexNotConcurrent),
        Box::new(AlterColumnType),
        Box::new(SetNotNull),
        Box::new(AddForeignKey),
        Box::new(AddCheck),
        Box::new(AddUnique),
        Box::new(AddPrimaryKey),
        Box::new(AddExclude),
        Box::new(ValidateConstraint),
        Box::new(RenameColumn),
        Box::new(RenameTable),
        Box::new(DropTable),
        Box::new(DropColumn),
        Box::new(Truncate),
        Box::new(DeleteWithoutWhere),
        Box::new(VacuumFull),
        Box::new(AlterEnumAddValue),
        Box::new(ReindexNonConcurrent),
        Box::new(RefreshMatView),
        Box::new(CreateTrigger),
        Box::new(DropTrigger),
        Box::new(EnableDisableTrigger),
        Box::new(AttachPartition),
        Box::new(DetachPartition),
        Box::new(PreferBigint),
        Box::new(PreferText),
        Box::new(PreferTimestamptz),
        Box::new(RobustDdl),
    ]
}

/// The distinct rule ids the built-in catalogue can emit, sorted.
pub fn builtin_rule_ids() -> Vec<&'static str> {
    let mut ids: Vec<&'static str> = builtin_rules()
        .iter()
        .flat_map(|rule| rule.ids().iter().copied())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    ids
}
