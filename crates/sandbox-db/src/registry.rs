use std::collections::HashMap;

use dashmap::DashMap;
use sandbox_config::VendorTag;
use sandbox_error::RuntimeError;
use uuid::Uuid;

use crate::any_pool::AnyPool;
use crate::connector::{ColumnDescription, TableSummary};
use crate::connectors::{MysqlConnector, PostgresConnector};
use crate::connector::Connector;
use crate::descriptor::{ConnectionDescriptor, ConnectionDescriptorInput};
use crate::types::{Row, Value};

/// The keyed cache of connection pools backing `list-connections`,
/// `create-connection`, `delete-connection`, `test-connection`,
/// `sync-schema`, and `get-table-samples` (§6). One entry per configured
/// descriptor; `acquire` hands out a pooled connection scoped to a single
/// `connection-id`, per §4.2's "pool is keyed by connection-id".
pub struct ConnectionRegistry {
    pools: DashMap<String, AnyPool>,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self { pools: DashMap::new() }
    }

    /// Eagerly opens a pool for every descriptor in the initial
    /// configuration (`database_connections`, §6).
    pub async fn bootstrap(descriptors: Vec<ConnectionDescriptor>) -> Result<Self, RuntimeError> {
        let registry = Self::new();
        for descriptor in descriptors {
            let id = descriptor.id.clone();
            let pool = AnyPool::open(descriptor).await?;
            registry.pools.insert(id, pool);
        }
        Ok(registry)
    }

    #[must_use]
    pub fn get(&self, connection_id: &str) -> Option<AnyPool> {
        self.pools.get(connection_id).map(|entry| entry.value().clone())
    }

    /// `list-connections` (§6): every descriptor currently registered, with
    /// secrets never serialized back (enforced by `ConnectionDescriptor`'s
    /// `Serialize` impl on the secret bag, not by this method).
    #[must_use]
    pub fn list(&self) -> Vec<ConnectionDescriptor> {
        self.pools.iter().map(|entry| entry.value().descriptor().clone()).collect()
    }

    /// `create-connection` (§6): assigns a fresh id, eagerly opens the pool,
    /// and registers it. Round-trips with `list` minus secrets, per §8's
    /// idempotence law.
    pub async fn create(&self, input: ConnectionDescriptorInput) -> Result<ConnectionDescriptor, RuntimeError> {
        let id = Uuid::new_v4().to_string();
        let descriptor = ConnectionDescriptor {
            id: id.clone(),
            display_name: input.display_name,
            vendor: input.vendor,
            host: input.host,
            port: input.port,
            database: input.database,
            schema: input.schema,
            role: input.role,
            warehouse: input.warehouse,
            catalog: input.catalog,
            username: input.username,
            secrets: crate::descriptor::SecretBag {
                password: input.password.map(crate::descriptor::Secret::new),
                private_key: None,
            },
            ssl_mode: input.ssl_mode,
            ssl_ca_path: input.ssl_ca_path,
            connect_timeout: std::time::Duration::from_secs(5),
            statement_timeout: std::time::Duration::from_secs(30),
            pool_min: 1,
            pool_max: 10,
            idle_eviction: std::time::Duration::from_secs(300),
        };

        let pool = AnyPool::open(descriptor.clone()).await?;
        self.pools.insert(id, pool);
        Ok(descriptor)
    }

    /// `delete-connection` (§6): drains and closes the pool, then removes
    /// it from the registry. A second delete of the same id is a no-op
    /// error rather than silently succeeding, so callers notice a typo'd id.
    pub async fn delete(&self, connection_id: &str) -> Result<(), RuntimeError> {
        match self.pools.remove(connection_id) {
            Some((_, pool)) => {
                pool.close().await;
                Ok(())
            }
            None => Err(RuntimeError::validation(format!("unknown connection id: {connection_id}"))),
        }
    }

    /// `test-connection(d)` (§6, §8): succeeds iff `open(d)` succeeds,
    /// independent of the registry — the descriptor under test is never
    /// registered or pooled.
    pub async fn test(descriptor: &ConnectionDescriptor) -> Result<(), RuntimeError> {
        match descriptor.vendor {
            VendorTag::Postgres => {
                let connector = PostgresConnector;
                let mut conn = connector.open(descriptor).await?;
                let healthy = connector.probe(&mut conn).await;
                connector.close(conn).await?;
                if healthy {
                    Ok(())
                } else {
                    Err(RuntimeError::ConnectionFailed { reason: "opened but failed health probe".to_string() })
                }
            }
            VendorTag::Mysql => {
                let connector = MysqlConnector;
                let mut conn = connector.open(descriptor).await?;
                let healthy = connector.probe(&mut conn).await;
                connector.close(conn).await?;
                if healthy {
                    Ok(())
                } else {
                    Err(RuntimeError::ConnectionFailed { reason: "opened but failed health probe".to_string() })
                }
            }
        }
    }

    /// `sync-schema` (§6): enumerates tables, then describes each one.
    /// Read-only introspection — never touches row data.
    pub async fn sync_schema(&self, connection_id: &str, schema: Option<&str>) -> Result<HashMap<String, Vec<ColumnDescription>>, RuntimeError> {
        let pool = self.get(connection_id).ok_or_else(|| RuntimeError::validation(format!("unknown connection id: {connection_id}")))?;
        let conn = pool.acquire().await?;
        let tables = conn.list_tables(schema).await?;
        let mut described = HashMap::with_capacity(tables.len());
        for table in &tables {
            let columns = conn.describe_table(&table.name, table.schema.as_deref().or(schema)).await?;
            described.insert(table.name.clone(), columns);
        }
        conn.release().await;
        Ok(described)
    }

    #[must_use]
    pub fn vendor(&self, connection_id: &str) -> Option<VendorTag> {
        self.get(connection_id).as_ref().map(|pool| pool.descriptor().vendor)
    }

    /// `get-table-samples` (§6): a bounded `SELECT *` used to preview a
    /// table's shape, independent of the `execute-sql` policy path — this
    /// is an administrative introspection operation, not a user query.
    pub async fn table_samples(&self, connection_id: &str, table: &str, limit: u64) -> Result<Vec<Row>, RuntimeError> {
        if !is_safe_identifier(table) {
            return Err(RuntimeError::validation(format!("invalid table identifier: {table}")));
        }
        let pool = self.get(connection_id).ok_or_else(|| RuntimeError::validation(format!("unknown connection id: {connection_id}")))?;
        let conn = pool.acquire().await?;
        let statement = format!("SELECT * FROM {table} LIMIT {limit}");
        let result = conn.execute(&statement, &HashMap::<String, Value>::new(), None).await;
        conn.release().await;
        Ok(result?.rows)
    }

    #[must_use]
    pub fn summaries(&self) -> Vec<(String, VendorTag)> {
        self.pools.iter().map(|entry| (entry.key().clone(), entry.value().descriptor().vendor)).collect()
    }
}

/// A conservative identifier whitelist (letters, digits, underscore, at
/// most one `.` for a schema-qualified name) for the one place this crate
/// interpolates a caller-supplied string directly into SQL text, since
/// table identifiers cannot be bound as parameters.
fn is_safe_identifier(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 128
        && candidate.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        && candidate.matches('.').count() <= 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_identifiers_with_sql_metacharacters() {
        assert!(!is_safe_identifier("users; DROP TABLE users"));
        assert!(!is_safe_identifier("users--"));
        assert!(!is_safe_identifier(""));
    }

    #[test]
    fn accepts_plain_and_schema_qualified_identifiers() {
        assert!(is_safe_identifier("users"));
        assert!(is_safe_identifier("public.users"));
    }
}
