//! The policy engine walk.

use pg_query::protobuf::{
    AlterTableType, ObjectType, ReindexObjectType, TransactionStmtKind, VariableSetKind,
    VariableSetStmt,
};
use pg_query::NodeEnum;
use pgfence_core::{AnalyzeConfig, LockMode};
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

use crate::parser::{preview, ParsedStatement};
use crate::rules::ast;

use super::duration::{parse_timeout, TimeoutValue};
use super::transaction::TransactionState;
use super::types::{PolicyViolation, Severity};

/// Runs the migration-scope checks over one file's statement list.
pub struct PolicyEngine<'a> {
    config: &'a AnalyzeConfig,
}

impl<'a> PolicyEngine<'a> {
    pub fn new(config: &'a AnalyzeConfig) -> Self {
        Self { config }
    }

    /// Walk the statements once, in order. `auto_commit` is the extractor
    /// hint that the migration runner has disabled its wrapping transaction.
    pub fn check_file(
        &self,
        statements: &[ParsedStatement],
        auto_commit: bool,
    ) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();
        let mut state = TransactionState::new();

        let mut lock_timeout_index: Option<usize> = None;
        let mut statement_timeout_index: Option<usize> = None;
        let mut application_name_seen = false;
        let mut idle_timeout_seen = false;
        let mut first_dangerous: Option<(usize, String)> = None;
        // Preview of the last ACCESS EXCLUSIVE statement in the open transaction.
        let mut held_exclusive: Option<String> = None;
        // (table, constraint) pairs added NOT VALID in the open transaction.
        let mut not_valid: FxHashSet<(String, String)> = FxHashSet::default();

        for (index, statement) in statements.iter().enumerate() {
            state.note_statement();
            let line = statement.line;

            match &statement.node {
                NodeEnum::VariableSetStmt(set) => {
                    if !matches!(
                        VariableSetKind::try_from(set.kind),
                        Ok(VariableSetKind::VarSetValue)
                    ) {
                        continue;
                    }
                    match set.name.to_lowercase().as_str() {
                        "lock_timeout" => {
                            lock_timeout_index.get_or_insert(index);
                            let ceiling = self.config.effective_max_lock_timeout_ms();
                            if set_value(set).is_some_and(|v| v.exceeds(ceiling)) {
                                violations.push(
                                    PolicyViolation::new(
                                        "lock-timeout-too-long",
                                        Severity::Warning,
                                        format!(
                                            "lock_timeout exceeds the {ceiling} ms ceiling; a \
                                             blocked DDL statement queues everything behind it \
                                             for that long"
                                        ),
                                        format!("SET lock_timeout = '{ceiling}ms';"),
                                    )
                                    .at_line(line),
                                );
                            }
                        }
                        "statement_timeout" => {
                            statement_timeout_index.get_or_insert(index);
                            let ceiling = self.config.effective_max_statement_timeout_ms();
                            if set_value(set).is_some_and(|v| v.exceeds(ceiling)) {
                                violations.push(
                                    PolicyViolation::new(
                                        "statement-timeout-too-long",
                                        Severity::Warning,
                                        format!(
                                            "statement_timeout exceeds the {ceiling} ms ceiling"
                                        ),
                                        format!("SET statement_timeout = '{ceiling}ms';"),
                                    )
                                    .at_line(line),
                                );
                            }
                        }
                        "application_name" => application_name_seen = true,
                        "idle_in_transaction_session_timeout" => idle_timeout_seen = true,
                        _ => {}
                    }
                }

                NodeEnum::TransactionStmt(txn) => {
                    match TransactionStmtKind::try_from(txn.kind) {
                        Ok(TransactionStmtKind::TransStmtBegin)
                        | Ok(TransactionStmtKind::TransStmtStart) => state.begin(),
                        Ok(TransactionStmtKind::TransStmtCommit) => state.commit(),
                        Ok(TransactionStmtKind::TransStmtRollback) => state.rollback(),
                        Ok(TransactionStmtKind::TransStmtSavepoint) => {
                            state.savepoint(&txn.savepoint_name)
                        }
                        Ok(TransactionStmtKind::TransStmtRelease) => {
                            state.release(&txn.savepoint_name)
                        }
                        Ok(TransactionStmtKind::TransStmtRollbackTo) => {
                            state.rollback_to(&txn.savepoint_name)
                        }
                        _ => {}
                    }
                    if !state.is_active() {
                        held_exclusive = None;
                        not_valid.clear();
                    }
                    continue;
                }

                NodeEnum::IndexStmt(index_stmt) => {
                    if index_stmt.concurrent && state.is_active() {
                        violations.push(
                            PolicyViolation::new(
                                "concurrent-in-transaction",
                                Severity::Error,
                                "CREATE INDEX CONCURRENTLY cannot run inside a transaction \
                                 block",
                                "move the statement outside BEGIN/COMMIT; the migration \
                                 runner must not wrap it",
                            )
                            .at_line(line),
                        );
                    }
                }

                NodeEnum::UpdateStmt(update) => {
                    if update.where_clause.is_none() {
                        violations.push(
                            PolicyViolation::new(
                                "update-in-migration",
                                Severity::Warning,
                                format!(
                                    "UPDATE without WHERE touches every row of {}",
                                    ast::relation_name(update.relation.as_ref())
                                        .unwrap_or_else(|| "the table".to_string())
                                ),
                                "add a WHERE clause, or run backfills outside schema \
                                 migrations in bounded batches",
                            )
                            .at_line(line),
                        );
                    }
                }

                NodeEnum::AlterTableStmt(alter) => {
                    if state.is_active() {
                        self.track_constraints(alter, &mut not_valid, &mut violations, line);
                    }
                }

                _ => {}
            }

            // Dangerous-statement bookkeeping (§ compounding and ordering).
            if is_access_exclusive_statement(&statement.node) {
                let this_preview = preview(&statement.sql, self.config.effective_preview_width());
                if first_dangerous.is_none() {
                    first_dangerous = Some((index, this_preview.clone()));
                }
                if state.is_active() {
                    if let Some(previous) = &held_exclusive {
                        if !auto_commit {
                            violations.push(
                                PolicyViolation::new(
                                    "statement-after-access-exclusive",
                                    Severity::Warning,
                                    format!(
                                        "`{this_preview}` runs while `{previous}` already \
                                         holds ACCESS EXCLUSIVE in the same transaction; \
                                         the locks accumulate until commit"
                                    ),
                                    "split the statements into separate transactions, or \
                                     commit between them",
                                )
                                .at_line(line),
                            );
                        }
                    }
                    held_exclusive = Some(this_preview);
                }
            }

            // Lock recording and wide-window detection.
            if state.is_active() {
                for (table, mode) in statement_locks(&statement.node) {
                    let outcome = state.record_lock(&table, mode);
                    if outcome.wide_lock_window {
                        let other = outcome.previous_table.unwrap_or_default();
                        violations.push(
                            PolicyViolation::new(
                                "wide-lock-window",
                                Severity::Warning,
                                format!(
                                    "transaction holds ACCESS EXCLUSIVE on both {other} and \
                                     {table}; a blocked query on either stalls the whole set"
                                ),
                                "migrate one table per transaction",
                            )
                            .at_line(line),
                        );
                    }
                }
            }
        }

        // File-level checks after the walk.
        if self.config.effective_require_lock_timeout() && lock_timeout_index.is_none() {
            violations.push(PolicyViolation::new(
                "missing-lock-timeout",
                Severity::Error,
                "no SET lock_timeout in this migration; a blocked DDL statement will queue \
                 every other query behind it indefinitely",
                "SET lock_timeout = '2s'; at the top of the file",
            ));
        }
        if let (Some(lock_index), Some((dangerous_index, dangerous_preview))) =
            (lock_timeout_index, &first_dangerous)
        {
            if lock_index > 0 && *dangerous_index < lock_index {
                violations.push(PolicyViolation::new(
                    "lock-timeout-after-dangerous-statement",
                    Severity::Error,
                    format!(
                        "SET lock_timeout appears after `{dangerous_preview}`, which it was \
                         meant to protect"
                    ),
                    "move SET lock_timeout above the first exclusive-lock statement",
                ));
            }
        }
        if self.config.effective_require_statement_timeout() && statement_timeout_index.is_none() {
            violations.push(PolicyViolation::new(
                "missing-statement-timeout",
                Severity::Warning,
                "no SET statement_timeout in this migration",
                "SET statement_timeout = '10min'; at the top of the file",
            ));
        }
        if !application_name_seen {
            violations.push(PolicyViolation::new(
                "missing-application-name",
                Severity::Warning,
                "no SET application_name; migration sessions are hard to spot in \
                 pg_stat_activity without one",
                "SET application_name = 'migration:<name>';",
            ));
        }
        if !idle_timeout_seen {
            violations.push(PolicyViolation::new(
                "missing-idle-in-transaction-session-timeout",
                Severity::Warning,
                "no SET idle_in_transaction_session_timeout; a stalled migration keeps its \
                 locks forever",
                "SET idle_in_transaction_session_timeout = '1min';",
            ));
        }

        violations
    }

    /// Track NOT VALID constraints and flag same-transaction VALIDATE.
    fn track_constraints(
        &self,
        alter: &pg_query::protobuf::AlterTableStmt,
        not_valid: &mut FxHashSet<(String, String)>,
        violations: &mut Vec<PolicyViolation>,
        line: usize,
    ) {
        let Some(table) = ast::relation_name(alter.relation.as_ref()) else {
            return;
        };
        let table_key = table.to_lowercase();

        for cmd in ast::commands(alter) {
            match ast::subtype(cmd) {
                Some(AlterTableType::AtAddConstraint) => {
                    if let Some(constraint) = ast::cmd_constraint(cmd) {
                        if constraint.skip_validation && !constraint.conname.is_empty() {
                            not_valid
                                .insert((table_key.clone(), constraint.conname.to_lowercase()));
                        }
                    }
                }
                Some(AlterTableType::AtValidateConstraint) => {
                    let pair = (table_key.clone(), cmd.name.to_lowercase());
                    if not_valid.contains(&pair) {
                        violations.push(
                            PolicyViolation::new(
                                "not-valid-validate-same-tx",
                                Severity::Error,
                                format!(
                                    "constraint {} was added NOT VALID and validated in the \
                                     same transaction; the validation scan then runs under \
                                     the original ACCESS EXCLUSIVE lock, which defeats the \
                                     two-step pattern",
                                    cmd.name
                                ),
                                "commit between ADD CONSTRAINT ... NOT VALID and VALIDATE \
                                 CONSTRAINT",
                            )
                            .at_line(line),
                        );
                    }
                }
                _ => {}
            }
        }
    }
}

/// First-argument value of a SET statement, as a timeout.
fn set_value(set: &VariableSetStmt) -> Option<TimeoutValue> {
    use pg_query::protobuf::a_const::Val;
    let constant = set.args.iter().find_map(|node| match node.node.as_ref() {
        Some(NodeEnum::AConst(constant)) => Some(constant),
        _ => None,
    })?;
    match constant.val.as_ref()? {
        Val::Ival(value) => {
            if value.ival == 0 {
                Some(TimeoutValue::Unlimited)
            } else {
                Some(TimeoutValue::Millis(u64::try_from(value.ival).ok()?))
            }
        }
        Val::Sval(value) => parse_timeout(&value.sval),
        Val::Fval(value) => parse_timeout(&value.fval),
        _ => None,
    }
}

/// Whether the statement holds ACCESS EXCLUSIVE for a meaningful window.
/// Instant acquisitions (ADD COLUMN, VALIDATE, trigger toggles, concurrent
/// detach) are excluded: they matter for held locks, not for duration.
pub(crate) fn is_access_exclusive_statement(node: &NodeEnum) -> bool {
    match node {
        NodeEnum::AlterTableStmt(alter) => ast::commands(alter).any(|cmd| {
            match ast::subtype(cmd) {
                Some(
                    AlterTableType::AtDropColumn
                    | AlterTableType::AtAlterColumnType
                    | AlterTableType::AtSetNotNull
                    | AlterTableType::AtDropConstraint
                    | AlterTableType::AtAttachPartition,
                ) => true,
                Some(AlterTableType::AtAddConstraint) => ast::cmd_constraint(cmd)
                    .is_some_and(|constraint| !constraint.skip_validation),
                Some(AlterTableType::AtDetachPartition) => {
                    !ast::cmd_partition(cmd).is_some_and(|p| p.concurrent)
                }
                _ => false,
            }
        }),
        NodeEnum::DropStmt(drop) => matches!(
            ObjectType::try_from(drop.remove_type),
            Ok(ObjectType::ObjectTable | ObjectType::ObjectIndex | ObjectType::ObjectTrigger)
        ),
        NodeEnum::TruncateStmt(_) | NodeEnum::RenameStmt(_) | NodeEnum::CreateTrigStmt(_) => true,
        NodeEnum::ReindexStmt(reindex) => {
            ast::def_elem_named(&reindex.params, "concurrently").is_none()
                && ReindexObjectType::try_from(reindex.kind).is_ok()
        }
        NodeEnum::RefreshMatViewStmt(refresh) => !refresh.concurrent,
        NodeEnum::VacuumStmt(vacuum) => {
            vacuum.is_vacuumcmd && ast::def_elem_named(&vacuum.options, "full").is_some()
        }
        _ => false,
    }
}

/// The table locks a statement acquires, strongest mode per table.
pub(crate) fn statement_locks(node: &NodeEnum) -> SmallVec<[(String, LockMode); 2]> {
    let mut locks: SmallVec<[(String, LockMode); 2]> = SmallVec::new();

    match node {
        NodeEnum::AlterTableStmt(alter) => {
            if let Some(table) = ast::relation_name(alter.relation.as_ref()) {
                let mode = ast::commands(alter)
                    .map(alter_cmd_lock)
                    .max()
                    .unwrap_or(LockMode::AccessExclusive);
                locks.push((table, mode));
            }
        }
        NodeEnum::IndexStmt(index) => {
            if let Some(table) = ast::relation_name(index.relation.as_ref()) {
                let mode = if index.concurrent {
                    LockMode::ShareUpdateExclusive
                } else {
                    LockMode::Share
                };
                locks.push((table, mode));
            }
        }
        NodeEnum::DropStmt(drop) => match ObjectType::try_from(drop.remove_type) {
            Ok(ObjectType::ObjectTable | ObjectType::ObjectIndex) => {
                for name in ast::object_names(&drop.objects) {
                    locks.push((
                        ast::unqualified(&name).to_string(),
                        LockMode::AccessExclusive,
                    ));
                }
            }
            // Trigger objects are qualified as [schema,] table, trigger; the
            // lock lands on the table.
            Ok(ObjectType::ObjectTrigger) => {
                for name in ast::object_names(&drop.objects) {
                    let mut parts = name.rsplit('.');
                    parts.next();
                    if let Some(table) = parts.next() {
                        locks.push((table.to_string(), LockMode::AccessExclusive));
                    }
                }
            }
            _ => {}
        },
        NodeEnum::TruncateStmt(truncate) => {
            for relation in &truncate.relations {
                if let Some(NodeEnum::RangeVar(rv)) = relation.node.as_ref() {
                    locks.push((rv.relname.clone(), LockMode::AccessExclusive));
                }
            }
        }
        NodeEnum::RenameStmt(rename) => {
            if let Some(table) = ast::relation_name(rename.relation.as_ref()) {
                locks.push((table, LockMode::AccessExclusive));
            }
        }
        NodeEnum::CreateTrigStmt(trigger) => {
            if let Some(table) = ast::relation_name(trigger.relation.as_ref()) {
                locks.push((table, LockMode::AccessExclusive));
            }
        }
        NodeEnum::ReindexStmt(reindex) => {
            let target = ast::relation_name(reindex.relation.as_ref())
                .or_else(|| (!reindex.name.is_empty()).then(|| reindex.name.clone()));
            if let Some(target) = target {
                let mode = if ast::def_elem_named(&reindex.params, "concurrently").is_some() {
                    LockMode::ShareUpdateExclusive
                } else {
                    LockMode::AccessExclusive
                };
                locks.push((target, mode));
            }
        }
        NodeEnum::RefreshMatViewStmt(refresh) => {
            if let Some(view) = ast::relation_name(refresh.relation.as_ref()) {
                let mode = if refresh.concurrent {
                    LockMode::ShareUpdateExclusive
                } else {
                    LockMode::AccessExclusive
                };
                locks.push((view, mode));
            }
        }
        NodeEnum::VacuumStmt(vacuum) => {
            if vacuum.is_vacuumcmd && ast::def_elem_named(&vacuum.options, "full").is_some() {
                for relation in &vacuum.rels {
                    if let Some(NodeEnum::VacuumRelation(rel)) = relation.node.as_ref() {
                        if let Some(table) = ast::relation_name(rel.relation.as_ref()) {
                            locks.push((table, LockMode::AccessExclusive));
                        }
                    }
                }
            }
        }
        NodeEnum::CreateStmt(create) => {
            if let Some(table) = ast::relation_name(create.relation.as_ref()) {
                locks.push((table, LockMode::AccessExclusive));
            }
        }
        NodeEnum::DeleteStmt(delete) => {
            if let Some(table) = ast::relation_name(delete.relation.as_ref()) {
                locks.push((table, LockMode::RowExclusive));
            }
        }
        NodeEnum::UpdateStmt(update) => {
            if let Some(table) = ast::relation_name(update.relation.as_ref()) {
                locks.push((table, LockMode::RowExclusive));
            }
        }
        NodeEnum::InsertStmt(insert) => {
            if let Some(table) = ast::relation_name(insert.relation.as_ref()) {
                locks.push((table, LockMode::RowExclusive));
            }
        }
        _ => {}
    }

    locks
}

fn alter_cmd_lock(cmd: &pg_query::protobuf::AlterTableCmd) -> LockMode {
    match ast::subtype(cmd) {
        Some(AlterTableType::AtValidateConstraint) => LockMode::ShareUpdateExclusive,
        Some(
            AlterTableType::AtEnableTrig
            | AlterTableType::AtEnableAlwaysTrig
            | AlterTableType::AtEnableReplicaTrig
            | AlterTableType::AtEnableTrigAll
            | AlterTableType::AtEnableTrigUser
            | AlterTableType::AtDisableTrig
            | AlterTableType::AtDisableTrigAll
            | AlterTableType::AtDisableTrigUser,
        ) => LockMode::ShareRowExclusive,
        Some(AlterTableType::AtDetachPartition) => {
            if ast::cmd_partition(cmd).is_some_and(|p| p.concurrent) {
                LockMode::ShareUpdateExclusive
            } else {
                LockMode::AccessExclusive
            }
        }
        _ => LockMode::AccessExclusive,
    }
}
