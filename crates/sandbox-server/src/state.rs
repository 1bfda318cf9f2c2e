use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sandbox_auth::{AuthVerifier, Permission, PermissiveVerifier, Principal, RemoteVerifier, StaticTableVerifier};
use sandbox_code::{CodePolicy, SandboxRunner};
use sandbox_config::{AuthenticationConfig, Config, ConfigHandle};
use sandbox_context::ResourceLimits;
use sandbox_db::{ConnectionDescriptor, ConnectionRegistry};
use sandbox_error::RuntimeError;
use sandbox_sql::{Masker, SqlExecutor, SqlPolicy};
use sandbox_viz::{JsonRenderer, VisualizationAdapter};

/// Everything a route handler needs, shared behind `Arc` so `AppState`
/// stays cheap to clone into every axum handler (per-request cloning is
/// the expected pattern for `State<S>` extractors).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConfigHandle>,
    pub registry: Arc<ConnectionRegistry>,
    pub sql_executor: Arc<SqlExecutor>,
    pub code_runner: Arc<SandboxRunner>,
    pub viz_adapter: Arc<VisualizationAdapter>,
    pub auth_verifier: Arc<dyn AuthVerifier>,
}

impl AppState {
    /// Builds every capability surface from one loaded [`Config`] —
    /// the startup wiring `main` delegates to, kept separate so tests can
    /// build a state without going through process startup.
    pub async fn build(config: Config) -> Result<Self, RuntimeError> {
        let query_defaults = ResourceLimits {
            max_rows: config.resource_limits.max_rows,
            timeout_seconds: config.resource_limits.query_timeout_seconds,
            memory_mb: config.resource_limits.memory_mb,
            output_kb: config.resource_limits.output_kb,
        };
        let code_defaults = ResourceLimits {
            timeout_seconds: config.resource_limits.code_timeout_seconds,
            ..query_defaults
        };

        let descriptors: Vec<ConnectionDescriptor> =
            config.database_connections.iter().map(ConnectionDescriptor::from_config).collect();
        let registry = Arc::new(ConnectionRegistry::bootstrap(descriptors).await?);

        let sql_executor = Arc::new(SqlExecutor::new(
            registry.clone(),
            SqlPolicy::from_config(&config.security),
            Masker::from_config(&config.security),
            query_defaults,
        ));

        let code_runner = Arc::new(SandboxRunner::new(
            config.server.code_worker_path.clone().into(),
            CodePolicy::from_config(&config.security),
            code_defaults,
        ));

        let viz_adapter = Arc::new(VisualizationAdapter::new(
            config.data_sharing.clone(),
            query_defaults,
            Arc::new(JsonRenderer),
        ));

        let auth_verifier = build_verifier(&config.authentication);

        Ok(Self {
            config: Arc::new(ConfigHandle::new(config)),
            registry,
            sql_executor,
            code_runner,
            viz_adapter,
            auth_verifier,
        })
    }
}

/// Resolves the configured authentication provider into a live
/// [`AuthVerifier`] (§4.1). `Config::validate` has already refused
/// `Permissive` in `Environment::Production` by the time this runs.
fn build_verifier(auth: &AuthenticationConfig) -> Arc<dyn AuthVerifier> {
    match auth {
        AuthenticationConfig::StaticTable { credentials } => {
            let table = credentials
                .iter()
                .map(|(credential, workspace_id)| (credential.clone(), development_principal_for(workspace_id)))
                .collect();
            Arc::new(StaticTableVerifier::new(table))
        }
        AuthenticationConfig::Remote { endpoint, timeout_ms } => {
            Arc::new(RemoteVerifier::new(endpoint.clone(), Duration::from_millis(*timeout_ms)))
        }
        AuthenticationConfig::Permissive => Arc::new(PermissiveVerifier::new()),
    }
}

/// A `StaticTable` entry grants every permission to its mapped workspace —
/// the configuration surface has no per-credential permission scoping
/// (§3's `Permission` set is closed and small enough that finer-grained
/// static grants are not worth a second config table).
fn development_principal_for(workspace_id: &str) -> Principal {
    Principal {
        authenticated: true,
        workspace_id: workspace_id.to_string(),
        workspace_name: workspace_id.to_string(),
        user_id: None,
        credential_label: "static-table".to_string(),
        permissions: vec![Permission::ExecuteSql, Permission::ExecuteCode, Permission::ProduceVisualization],
        metadata: HashMap::new(),
    }
}
