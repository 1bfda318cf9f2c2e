use rustpython_parser::ast::{self, Expr, Stmt};
use rustpython_parser::Parse;

use sandbox_config::SecurityConfig;
use sandbox_error::RuntimeError;

/// Call names that escape the sandbox outright, translated one-to-one
/// from `CodeValidator._analyze_ast`'s call-rejection set.
const BANNED_CALLS: &[&str] = &["exec", "eval", "compile", "__import__", "open"];

/// Attribute chain components that reach the interpreter internals
/// (`obj.__class__.__bases__[0].__subclasses__()`-style sandbox escapes).
const DANGEROUS_ATTRIBUTES: &[&str] = &[
    "__class__",
    "__bases__",
    "__subclasses__",
    "__mro__",
    "__code__",
    "__globals__",
    "__dict__",
    "__builtins__",
    "func_globals",
    "gi_frame",
    "f_globals",
];

/// Textual and syntactic policy over a fragment of sandboxed source
/// (§4.5). The textual scan is a fast first pass; the syntactic scan
/// walks a real parsed AST so that e.g. `"ev" + "al"` doesn't evade the
/// substring check by construction, while `getattr(x, "__class__")`
/// still does — the syntactic walk only sees literal attribute/import/call
/// syntax, matching the same limitation the original AST walk has.
#[derive(Debug)]
pub struct CodePolicy {
    allowed_imports: Vec<String>,
    banned_patterns: Vec<String>,
}

impl CodePolicy {
    #[must_use]
    pub fn from_config(config: &SecurityConfig) -> Self {
        Self {
            allowed_imports: config.allowed_imports.clone(),
            banned_patterns: config.banned_code_patterns.clone(),
        }
    }

    /// Returns every violated category (never the source text itself, per
    /// the "blocked content is never echoed" rule shared with `sandbox-sql`).
    #[must_use]
    pub fn violations(&self, code: &str) -> Vec<String> {
        let mut violations = Vec::new();
        let lowered = code.to_lowercase();

        for pattern in &self.banned_patterns {
            if lowered.contains(&pattern.to_lowercase()) {
                violations.push(format!("banned_pattern:{pattern}"));
                tracing::warn!(target: "security", pattern = %pattern, "blocked_code_pattern");
            }
        }

        match ast::Suite::parse(code, "<sandboxed>") {
            Ok(suite) => {
                for stmt in &suite {
                    self.walk_stmt(stmt, &mut violations);
                }
            }
            Err(_) => {
                violations.push("syntax_error".to_string());
            }
        }

        violations
    }

    #[must_use]
    pub fn is_allowed(&self, code: &str) -> bool {
        self.violations(code).is_empty()
    }

    pub fn validate(&self, code: &str) -> Result<(), RuntimeError> {
        match self.violations(code).first() {
            Some(category) => Err(RuntimeError::policy_violation(category.clone())),
            None => Ok(()),
        }
    }

    fn walk_stmt(&self, stmt: &Stmt, violations: &mut Vec<String>) {
        match stmt {
            Stmt::Import(import) => {
                for alias in &import.names {
                    self.check_import(alias.name.as_str(), violations);
                }
            }
            Stmt::ImportFrom(import) => {
                let module = import.module.as_ref().map(|m| m.as_str()).unwrap_or_default();
                self.check_import(module, violations);
            }
            Stmt::FunctionDef(def) => {
                for s in &def.body {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::AsyncFunctionDef(def) => {
                for s in &def.body {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::ClassDef(def) => {
                for s in &def.body {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::If(node) => {
                self.walk_expr(&node.test, violations);
                for s in node.body.iter().chain(node.orelse.iter()) {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::For(node) => {
                self.walk_expr(&node.iter, violations);
                for s in node.body.iter().chain(node.orelse.iter()) {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::AsyncFor(node) => {
                self.walk_expr(&node.iter, violations);
                for s in node.body.iter().chain(node.orelse.iter()) {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::While(node) => {
                self.walk_expr(&node.test, violations);
                for s in node.body.iter().chain(node.orelse.iter()) {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::With(node) => {
                for item in &node.items {
                    self.walk_expr(&item.context_expr, violations);
                }
                for s in &node.body {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::AsyncWith(node) => {
                for item in &node.items {
                    self.walk_expr(&item.context_expr, violations);
                }
                for s in &node.body {
                    self.walk_stmt(s, violations);
                }
            }
            Stmt::Try(node) => {
                for s in node.body.iter().chain(node.orelse.iter()).chain(node.finalbody.iter()) {
                    self.walk_stmt(s, violations);
                }
                for handler in &node.handlers {
                    let ast::ExceptHandler::ExceptHandler(handler) = handler;
                    for s in &handler.body {
                        self.walk_stmt(s, violations);
                    }
                }
            }
            Stmt::Assign(node) => {
                self.walk_expr(&node.value, violations);
            }
            Stmt::AugAssign(node) => {
                self.walk_expr(&node.value, violations);
            }
            Stmt::AnnAssign(node) => {
                if let Some(value) = &node.value {
                    self.walk_expr(value, violations);
                }
            }
            Stmt::Return(node) => {
                if let Some(value) = &node.value {
                    self.walk_expr(value, violations);
                }
            }
            Stmt::Expr(node) => {
                self.walk_expr(&node.value, violations);
            }
            Stmt::Assert(node) => {
                self.walk_expr(&node.test, violations);
            }
            _ => {}
        }
    }

    fn walk_expr(&self, expr: &Expr, violations: &mut Vec<String>) {
        match expr {
            Expr::Call(call) => {
                if let Expr::Name(name) = call.func.as_ref() {
                    if BANNED_CALLS.contains(&name.id.as_str()) {
                        violations.push(format!("banned_call:{}", name.id.as_str()));
                        tracing::warn!(target: "security", function = %name.id.as_str(), "blocked_function_call");
                    }
                } else if let Expr::Attribute(_) = call.func.as_ref() {
                    let chain = attribute_chain(call.func.as_ref());
                    if self.is_dangerous_attribute_chain(&chain) {
                        violations.push(format!("dangerous_attribute:{chain}"));
                        tracing::warn!(target: "security", attribute = %chain, "blocked_attribute_access");
                    }
                }
                self.walk_expr(&call.func, violations);
                for arg in &call.args {
                    self.walk_expr(arg, violations);
                }
            }
            Expr::Attribute(attr) => {
                let name = attr.attr.as_str();
                if name.starts_with("__") && !name.ends_with("__") {
                    violations.push(format!("dunder_attribute:{name}"));
                }
                let chain = attribute_chain(expr);
                if self.is_dangerous_attribute_chain(&chain) {
                    violations.push(format!("dangerous_attribute:{chain}"));
                }
                self.walk_expr(&attr.value, violations);
            }
            Expr::BinOp(node) => {
                self.walk_expr(&node.left, violations);
                self.walk_expr(&node.right, violations);
            }
            Expr::BoolOp(node) => {
                for value in &node.values {
                    self.walk_expr(value, violations);
                }
            }
            Expr::UnaryOp(node) => self.walk_expr(&node.operand, violations),
            Expr::Compare(node) => {
                self.walk_expr(&node.left, violations);
                for comparator in &node.comparators {
                    self.walk_expr(comparator, violations);
                }
            }
            Expr::Subscript(node) => {
                self.walk_expr(&node.value, violations);
                self.walk_expr(&node.slice, violations);
            }
            Expr::List(node) => {
                for elt in &node.elts {
                    self.walk_expr(elt, violations);
                }
            }
            Expr::Tuple(node) => {
                for elt in &node.elts {
                    self.walk_expr(elt, violations);
                }
            }
            Expr::Dict(node) => {
                for value in &node.values {
                    self.walk_expr(value, violations);
                }
            }
            _ => {}
        }
    }

    fn check_import(&self, module: &str, violations: &mut Vec<String>) {
        if !self.is_allowed_import(module) {
            violations.push(format!("banned_import:{module}"));
            tracing::warn!(target: "security", module = %module, "blocked_import");
        }
    }

    fn is_allowed_import(&self, module: &str) -> bool {
        self.allowed_imports.iter().any(|allowed| module == allowed || module.starts_with(&format!("{allowed}.")))
    }

    fn is_dangerous_attribute_chain(&self, chain: &str) -> bool {
        chain.split('.').any(|part| DANGEROUS_ATTRIBUTES.contains(&part))
    }
}

fn attribute_chain(expr: &Expr) -> String {
    let mut parts = Vec::new();
    let mut current = expr;
    loop {
        match current {
            Expr::Attribute(attr) => {
                parts.push(attr.attr.as_str().to_string());
                current = attr.value.as_ref();
            }
            Expr::Name(name) => {
                parts.push(name.id.as_str().to_string());
                break;
            }
            _ => break,
        }
    }
    parts.reverse();
    parts.join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> CodePolicy {
        CodePolicy::from_config(&SecurityConfig::default())
    }

    #[test]
    fn allowed_import_passes() {
        assert!(policy().is_allowed("import math\nresult = math.sqrt(4)"));
    }

    #[test]
    fn disallowed_import_is_rejected() {
        let violations = policy().violations("import os\nos.system('ls')");
        assert!(violations.iter().any(|v| v.starts_with("banned_import")));
    }

    #[test]
    fn submodule_of_allowed_import_passes() {
        assert!(policy().is_allowed("import pandas.testing"));
    }

    #[test]
    fn eval_call_is_rejected() {
        let violations = policy().violations("result = eval('1 + 1')");
        assert!(violations.iter().any(|v| v == "banned_call:eval"));
    }

    #[test]
    fn dunder_subclasses_walk_is_rejected() {
        let violations = policy().violations("x = ().__class__.__bases__[0].__subclasses__()");
        assert!(violations.iter().any(|v| v.starts_with("dangerous_attribute")));
    }

    #[test]
    fn syntax_error_is_reported() {
        let violations = policy().violations("def (:");
        assert!(violations.iter().any(|v| v == "syntax_error"));
    }

    #[test]
    fn banned_textual_pattern_short_circuits_before_parse_matters() {
        let violations = policy().violations("subprocess.run(['ls'])");
        assert!(violations.iter().any(|v| v.starts_with("banned_pattern")));
    }
}
