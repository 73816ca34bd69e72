//! Plugin API: namespaced rule registration with a fault boundary.
//!
//! Loading plugin code from disk is the loader collaborator's job; this
//! module owns the in-process contract. Plugin rule ids must carry the
//! `plugin:` prefix, collisions are rejected at registration, and a plugin
//! that panics mid-check loses its findings for that statement only.

use std::panic::{catch_unwind, AssertUnwindSafe};

use pgfence_core::errors::PluginError;
use rustc_hash::FxHashSet;
use tracing::warn;

use crate::rules::{CheckResult, Rule, RuleContext};

/// A loaded plugin: a name plus the rules it contributes.
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;
    fn rules(&self) -> Vec<Box<dyn Rule>>;
}

/// The registered plugin rules, grouped per plugin.
#[derive(Default)]
pub struct PluginSet {
    plugins: Vec<(String, Vec<Box<dyn Rule>>)>,
    ids: FxHashSet<String>,
}

impl PluginSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Validate and register a plugin. `reserved` is the built-in id set.
    pub fn register(&mut self, plugin: &dyn Plugin, reserved: &[&str]) -> Result<(), PluginError> {
        let name = plugin.name().to_string();
        let rules = plugin.rules();

        for rule in &rules {
            for id in rule.ids() {
                if !id.starts_with("plugin:") {
                    return Err(PluginError::BadRuleId {
                        plugin: name,
                        rule_id: (*id).to_string(),
                    });
                }
                if reserved.contains(id) || self.ids.contains(*id) {
                    return Err(PluginError::DuplicateRuleId {
                        plugin: name,
                        rule_id: (*id).to_string(),
                    });
                }
            }
        }
        for rule in &rules {
            for id in rule.ids() {
                self.ids.insert((*id).to_string());
            }
        }
        self.plugins.push((name, rules));
        Ok(())
    }

    /// Run every plugin rule on one statement. A panic inside a plugin
    /// discards that plugin's findings for the statement and the analysis
    /// continues.
    pub fn check_statement(&self, ctx: &RuleContext<'_>) -> Vec<CheckResult> {
        let mut out = Vec::new();
        for (name, rules) in &self.plugins {
            let produced = catch_unwind(AssertUnwindSafe(|| {
                let mut findings = Vec::new();
                for rule in rules {
                    let mut results = rule.check(ctx);
                    for result in &mut results {
                        result.applies_to_new_tables = rule.applies_to_new_tables();
                    }
                    findings.extend(results);
                }
                findings
            }));
            match produced {
                Ok(findings) => out.extend(findings),
                Err(_) => {
                    warn!(plugin = %name, "plugin panicked; its findings for this statement are discarded");
                }
            }
        }
        out
    }

    /// Every registered plugin rule id.
    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.ids.iter().map(String::as_str)
    }
}
