use regex::RegexSet;

use sandbox_config::SecurityConfig;
use sandbox_error::RuntimeError;

/// Precompiled common SQL-injection escape patterns (§4.3), translated
/// one-to-one from `SQLValidator.INJECTION_PATTERNS` in the original
/// `sql_executor.py`. Compiled once at construction, not per call.
const INJECTION_PATTERNS: &[&str] = &[
    r";\s*--",
    r"'\s*OR\s+'?1'?\s*=\s*'?1",
    r"'\s*OR\s+''='",
    r"UNION\s+ALL\s+SELECT",
    r"INTO\s+OUTFILE",
    r"INTO\s+DUMPFILE",
    r"LOAD_FILE",
    r"@@version",
    r"information_schema",
    r"BENCHMARK\s*\(",
    r"SLEEP\s*\(",
    r"WAITFOR\s+DELAY",
];

/// The §4.3 validation pipeline: leading-keyword classification, a
/// substring ban scan, and the injection heuristic. Holds compiled
/// `RegexSet`s built once from configuration so `validate` never compiles
/// a pattern per call.
#[derive(Debug)]
pub struct SqlPolicy {
    allowed_statements: Vec<String>,
    banned_patterns: Vec<String>,
    injection_set: RegexSet,
}

impl SqlPolicy {
    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            allowed_statements: config.allowed_sql_statements.iter().map(|s| s.to_uppercase()).collect(),
            banned_patterns: config.banned_sql_patterns.clone(),
            injection_set: RegexSet::new(INJECTION_PATTERNS.iter().map(|p| format!("(?i){p}")))
                .expect("injection pattern set is a fixed, known-valid literal"),
        }
    }

    /// Validates a statement against the three-stage pipeline. Returns the
    /// list of violation names (never the statement text itself) so the
    /// caller can log categories without echoing blocked content (§4.3:
    /// "Blocked content is never echoed into error messages or logs").
    #[must_use]
    pub fn violations(&self, statement: &str) -> Vec<String> {
        let mut violations = Vec::new();
        let normalized = statement.trim_start();
        let upper = normalized.to_uppercase();

        let leading_keyword = upper.split_whitespace().next().unwrap_or("");
        if !self.allowed_statements.iter().any(|allowed| leading_keyword == allowed) {
            violations.push("disallowed_statement_class".to_string());
            tracing::warn!(
                target: "security",
                leading_keyword = %leading_keyword,
                "blocked_sql_statement"
            );
        }

        for pattern in &self.banned_patterns {
            if upper.contains(&pattern.to_uppercase()) {
                violations.push(format!("banned_pattern:{pattern}"));
                tracing::warn!(target: "security", pattern = %pattern, "blocked_sql_pattern");
            }
        }

        if self.injection_set.is_match(statement) {
            violations.push("injection_heuristic".to_string());
            tracing::warn!(target: "security", "sql_injection_detected");
        }

        violations
    }

    /// `true` iff [`Self::violations`] would return an empty list.
    #[must_use]
    pub fn is_allowed(&self, statement: &str) -> bool {
        self.violations(statement).is_empty()
    }

    /// Validates and maps to a `RuntimeError::PolicyViolation` naming only
    /// the first violated category, per §7 ("policy-violation ... yes,
    /// category only").
    pub fn validate(&self, statement: &str) -> Result<(), RuntimeError> {
        let violations = self.violations(statement);
        match violations.first() {
            Some(category) => Err(RuntimeError::policy_violation(category.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> SqlPolicy {
        SqlPolicy::from_config(&SecurityConfig::default())
    }

    #[test]
    fn select_is_allowed() {
        assert!(policy().is_allowed("SELECT 1 AS n"));
    }

    #[test]
    fn with_cte_is_allowed() {
        assert!(policy().is_allowed("WITH t AS (SELECT 1) SELECT * FROM t"));
    }

    #[test]
    fn drop_table_is_rejected() {
        let violations = policy().violations("DROP TABLE users");
        assert!(!violations.is_empty());
    }

    #[test]
    fn tautology_injection_is_detected() {
        let violations = policy().violations("SELECT * FROM t WHERE '1' OR '1'='1'");
        assert!(violations.iter().any(|v| v == "injection_heuristic"));
    }

    #[test]
    fn union_all_select_is_detected() {
        let violations = policy().violations("SELECT a FROM t UNION ALL SELECT password FROM users");
        assert!(violations.iter().any(|v| v == "injection_heuristic"));
    }

    #[test]
    fn multi_statement_terminator_is_banned() {
        let violations = policy().violations("SELECT 1; DROP TABLE users;");
        assert!(!violations.is_empty());
    }

    #[test]
    fn leading_whitespace_is_normalized_before_classification() {
        assert!(policy().is_allowed("   SELECT 1"));
    }
}
