use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Permissions a [`Principal`] may hold. A closed set, per §3 — the core
/// never needs to reason about arbitrary scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Permission {
    ExecuteSql,
    ExecuteCode,
    ProduceVisualization,
}

/// The verified identity associated with a request. Lifetime equals the
/// owning [`sandbox_context::ExecutionContext`]'s.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub authenticated: bool,
    pub workspace_id: String,
    pub workspace_name: String,
    pub user_id: Option<String>,
    pub credential_label: String,
    pub permissions: Vec<Permission>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Principal {
    #[must_use]
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }

    /// The permissive dev-mode principal: every permission granted, loudly
    /// labeled so it can never be mistaken for a real identity in logs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            authenticated: true,
            workspace_id: "dev-workspace".to_string(),
            workspace_name: "development".to_string(),
            user_id: None,
            credential_label: "permissive-dev-mode".to_string(),
            permissions: vec![Permission::ExecuteSql, Permission::ExecuteCode, Permission::ProduceVisualization],
            metadata: HashMap::new(),
        }
    }
}
