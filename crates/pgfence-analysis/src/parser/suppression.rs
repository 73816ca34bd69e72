//! Inline suppression directives — `-- pgfence-ignore` comments.

/// Sentinel rule id meaning "suppress every rule".
pub const SUPPRESS_ALL: &str = "*";

/// Collect the directives that apply to one statement.
///
/// Two regions are scanned: the statement's own preserved text (directives on
/// the statement's leading lines) and the gap between the previous statement
/// and this one. Recognized, case-insensitively:
///
/// - `-- pgfence-ignore` — suppress all rules for the next statement
/// - `-- pgfence-ignore: rule-a, rule-b` — suppress the listed rules
/// - `-- pgfence: ignore rule-a, rule-b` — legacy spelling of the list form
pub(crate) fn directives_for(statement_text: &str, gap: &str) -> Vec<String> {
    let mut rules = Vec::new();
    for line in gap.lines().chain(statement_text.lines()) {
        parse_directive_line(line, &mut rules);
        if rules.iter().any(|r| r == SUPPRESS_ALL) {
            return vec![SUPPRESS_ALL.to_string()];
        }
    }
    rules.sort();
    rules.dedup();
    rules
}

fn parse_directive_line(line: &str, rules: &mut Vec<String>) {
    let trimmed = line.trim();
    let Some(comment) = trimmed.strip_prefix("--") else {
        return;
    };
    let comment = comment.trim();
    let lower = comment.to_ascii_lowercase();

    if let Some(rest) = lower.strip_prefix("pgfence-ignore") {
        let rest = rest.trim_start();
        if rest.is_empty() {
            rules.push(SUPPRESS_ALL.to_string());
        } else if let Some(list) = rest.strip_prefix(':') {
            push_rule_list(list, rules);
        }
        return;
    }

    // Legacy form: `-- pgfence: ignore r1, r2`
    if let Some(rest) = lower.strip_prefix("pgfence:") {
        if let Some(list) = rest.trim_start().strip_prefix("ignore") {
            push_rule_list(list, rules);
        }
    }
}

fn push_rule_list(list: &str, rules: &mut Vec<String>) {
    for rule in list.split(',') {
        let rule = rule.trim();
        if !rule.is_empty() {
            rules.push(rule.to_string());
        }
    }
}
