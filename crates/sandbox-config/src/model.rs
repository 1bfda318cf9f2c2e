use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// Deployment environment. Only affects defaults and log verbosity —
/// never gates security behavior (see [`AuthenticationConfig`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Governs how strictly the execution paths enforce policy. `Strict` is
/// the only mode permitted in `Production` (enforced by
/// [`crate::validate`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Strict,
    Permissive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_host")]
    pub bind_host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_rpc_port")]
    pub rpc_port: u16,
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,
    #[serde(default = "default_concurrency_cap")]
    pub concurrency_cap: usize,
    /// Path (or bare name, resolved via `PATH`) to the `sandbox-code-worker`
    /// binary the code sandbox runner spawns per `execute-code` call.
    #[serde(default = "default_code_worker_path")]
    pub code_worker_path: String,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_rpc_port() -> u16 {
    8081
}
fn default_worker_count() -> usize {
    4
}
fn default_concurrency_cap() -> usize {
    256
}
fn default_code_worker_path() -> String {
    "sandbox-code-worker".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            http_port: default_http_port(),
            rpc_port: default_rpc_port(),
            worker_count: default_worker_count(),
            concurrency_cap: default_concurrency_cap(),
            code_worker_path: default_code_worker_path(),
        }
    }
}

/// Defaults feeding `sandbox_context::ResourceLimits`; a context's explicit
/// per-request values always win.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceLimitsConfig {
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,
    #[serde(default = "default_cpu_seconds")]
    pub cpu_seconds: u64,
    #[serde(default = "default_output_kb")]
    pub output_kb: u64,
    #[serde(default = "default_max_rows")]
    pub max_rows: u64,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_query_timeout")]
    pub query_timeout_seconds: u64,
    #[serde(default = "default_code_timeout")]
    pub code_timeout_seconds: u64,
}

fn default_memory_mb() -> u64 {
    512
}
fn default_cpu_seconds() -> u64 {
    30
}
fn default_output_kb() -> u64 {
    1024
}
fn default_max_rows() -> u64 {
    10_000
}
fn default_concurrency() -> usize {
    64
}
fn default_query_timeout() -> u64 {
    60
}
fn default_code_timeout() -> u64 {
    30
}

impl Default for ResourceLimitsConfig {
    fn default() -> Self {
        Self {
            memory_mb: default_memory_mb(),
            cpu_seconds: default_cpu_seconds(),
            output_kb: default_output_kb(),
            max_rows: default_max_rows(),
            concurrency: default_concurrency(),
            query_timeout_seconds: default_query_timeout(),
            code_timeout_seconds: default_code_timeout(),
        }
    }
}

/// Policy inputs for §4.3 (SQL) and §4.5 (code). Compiled once into
/// `Regex`/`GlobSet` by the owning crates — this struct only carries the
/// raw, serializable patterns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "default_allowed_imports")]
    pub allowed_imports: Vec<String>,
    #[serde(default = "default_banned_code_patterns")]
    pub banned_code_patterns: Vec<String>,
    #[serde(default = "default_allowed_sql_statements")]
    pub allowed_sql_statements: Vec<String>,
    #[serde(default = "default_banned_sql_patterns")]
    pub banned_sql_patterns: Vec<String>,
    #[serde(default = "default_sensitive_column_globs")]
    pub sensitive_column_globs: Vec<String>,
    #[serde(default = "default_true")]
    pub mask_enabled: bool,
}

fn default_allowed_imports() -> Vec<String> {
    vec![
        "math", "statistics", "json", "re", "datetime", "itertools", "collections",
        "pandas", "numpy", "scipy", "sklearn", "plotly",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_banned_code_patterns() -> Vec<String> {
    vec![
        "eval(", "exec(", "compile(", "__import__", "os.system", "subprocess",
        "socket", "pickle.loads", "ctypes", "importlib", "globals()", "__globals__",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_allowed_sql_statements() -> Vec<String> {
    vec!["SELECT".to_string(), "WITH".to_string()]
}

fn default_banned_sql_patterns() -> Vec<String> {
    vec![
        "DROP", "DELETE", "TRUNCATE", "ALTER", "GRANT", "REVOKE", "INSERT", "UPDATE",
        "--", "/*", ";",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

fn default_sensitive_column_globs() -> Vec<String> {
    vec!["*password*", "*secret*", "*ssn*", "*token*", "*api_key*", "*credit_card*"]
        .into_iter()
        .map(str::to_string)
        .collect()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_imports: default_allowed_imports(),
            banned_code_patterns: default_banned_code_patterns(),
            allowed_sql_statements: default_allowed_sql_statements(),
            banned_sql_patterns: default_banned_sql_patterns(),
            sensitive_column_globs: default_sensitive_column_globs(),
            mask_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSharingConfig {
    #[serde(default = "default_max_rows")]
    pub max_rows_to_caller: u64,
    #[serde(default = "default_force_aggregate_threshold")]
    pub force_aggregate_threshold: u64,
    #[serde(default = "default_max_viz_points")]
    pub max_viz_points: u64,
}

fn default_force_aggregate_threshold() -> u64 {
    50_000
}
fn default_max_viz_points() -> u64 {
    500
}

impl Default for DataSharingConfig {
    fn default() -> Self {
        Self {
            max_rows_to_caller: default_max_rows(),
            force_aggregate_threshold: default_force_aggregate_threshold(),
            max_viz_points: default_max_viz_points(),
        }
    }
}

/// Auth provider selector. `StaticTable` and `Remote` are production
/// options; `Permissive` is dev-only and always logs a startup warning
/// (enforced in `sandbox-auth`, not here).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(tag = "provider", rename_all = "snake_case")]
pub enum AuthenticationConfig {
    #[default]
    StaticTable {
        #[serde(default)]
        credentials: HashMap<String, String>,
    },
    Remote {
        endpoint: String,
        #[serde(default = "default_remote_auth_timeout_ms")]
        timeout_ms: u64,
    },
    Permissive,
}

fn default_remote_auth_timeout_ms() -> u64 {
    2_000
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PlatformConfig {
    pub registration_url: Option<String>,
    pub token: Option<String>,
    pub tls_cert_path: Option<String>,
    pub tls_key_path: Option<String>,
}

/// Closed set of supported database vendors (Design Note: "variants are
/// static and closed; dynamic discovery is not required").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VendorTag {
    Postgres,
    Mysql,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionDescriptorConfig {
    pub id: String,
    pub display_name: String,
    pub vendor: VendorTag,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub schema: Option<String>,
    pub role: Option<String>,
    pub warehouse: Option<String>,
    pub catalog: Option<String>,
    pub username: String,
    pub password: Option<String>,
    #[serde(default)]
    pub ssl_mode: SslMode,
    pub ssl_ca_path: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    #[serde(default = "default_statement_timeout_ms")]
    pub statement_timeout_ms: u64,
    #[serde(default = "default_pool_min")]
    pub pool_min: usize,
    #[serde(default = "default_pool_max")]
    pub pool_max: usize,
    #[serde(default = "default_idle_eviction_seconds")]
    pub idle_eviction_seconds: u64,
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}
fn default_statement_timeout_ms() -> u64 {
    30_000
}
fn default_pool_min() -> usize {
    1
}
fn default_pool_max() -> usize {
    10
}
fn default_idle_eviction_seconds() -> u64 {
    300
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SslMode {
    Disable,
    #[default]
    Prefer,
    Require,
}

/// Root configuration document. Deserialized from TOML; an env-var
/// override pass runs after parsing (see `loader::apply_env_overrides`).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub environment: Environment,
    #[serde(default)]
    pub execution_mode: ExecutionMode,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub resource_limits: ResourceLimitsConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub data_sharing: DataSharingConfig,
    #[serde(default)]
    pub authentication: AuthenticationConfig,
    #[serde(default)]
    pub platform: PlatformConfig,
    #[serde(default)]
    pub database_connections: Vec<ConnectionDescriptorConfig>,
}
