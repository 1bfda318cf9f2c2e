use std::collections::HashMap;
use std::sync::Arc;

use sandbox_error::RuntimeError;

use crate::connector::{ColumnDescription, RawQueryResult, RowStream, TableSummary};
use crate::connectors::{MysqlConnector, PostgresConnector};
use crate::descriptor::ConnectionDescriptor;
use crate::pool::{ConnectionPool, PooledConnection};
use crate::types::Value;
use sandbox_config::VendorTag;

/// A [`ConnectionPool`] for one of the closed set of vendors, type-erased
/// so a [`crate::registry::ConnectionRegistry`] can hold pools for
/// different vendors in one keyed map without making every caller of the
/// registry generic over `Connector`. Each variant is still the same
/// hand-rolled arena+index pool from `pool.rs` — this only flattens the
/// vendor dimension, it does not add a second pooling layer.
#[derive(Clone)]
pub enum AnyPool {
    Postgres(Arc<ConnectionPool<PostgresConnector>>),
    Mysql(Arc<ConnectionPool<MysqlConnector>>),
}

impl AnyPool {
    pub async fn open(descriptor: ConnectionDescriptor) -> Result<Self, RuntimeError> {
        match descriptor.vendor {
            VendorTag::Postgres => {
                let pool = ConnectionPool::new(Arc::new(PostgresConnector), descriptor).await?;
                Ok(Self::Postgres(Arc::new(pool)))
            }
            VendorTag::Mysql => {
                let pool = ConnectionPool::new(Arc::new(MysqlConnector), descriptor).await?;
                Ok(Self::Mysql(Arc::new(pool)))
            }
        }
    }

    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        match self {
            Self::Postgres(pool) => pool.descriptor(),
            Self::Mysql(pool) => pool.descriptor(),
        }
    }

    pub async fn sizes(&self) -> (usize, usize) {
        match self {
            Self::Postgres(pool) => pool.sizes().await,
            Self::Mysql(pool) => pool.sizes().await,
        }
    }

    pub async fn acquire(&self) -> Result<AnyPooledConnection, RuntimeError> {
        match self {
            Self::Postgres(pool) => Ok(AnyPooledConnection::Postgres(pool.acquire().await?)),
            Self::Mysql(pool) => Ok(AnyPooledConnection::Mysql(pool.acquire().await?)),
        }
    }

    pub async fn close(&self) {
        match self {
            Self::Postgres(pool) => pool.close().await,
            Self::Mysql(pool) => pool.close().await,
        }
    }
}

/// A scoped handle to one connection of whichever vendor backs it.
/// Delegates straight through to the underlying [`PooledConnection`];
/// releasing it (by `Drop` or the explicit async `release`) behaves
/// exactly as documented there.
pub enum AnyPooledConnection {
    Postgres(PooledConnection<PostgresConnector>),
    Mysql(PooledConnection<MysqlConnector>),
}

impl AnyPooledConnection {
    pub async fn execute(
        &self,
        statement: &str,
        bindings: &HashMap<String, Value>,
        row_limit: Option<u64>,
    ) -> Result<RawQueryResult, RuntimeError> {
        match self {
            Self::Postgres(conn) => conn.execute(statement, bindings, row_limit).await,
            Self::Mysql(conn) => conn.execute(statement, bindings, row_limit).await,
        }
    }

    pub async fn stream(
        &self,
        statement: &str,
        bindings: &HashMap<String, Value>,
        batch_size: usize,
        row_limit: Option<u64>,
    ) -> Result<RowStream, RuntimeError> {
        match self {
            Self::Postgres(conn) => conn.stream(statement, bindings, batch_size, row_limit).await,
            Self::Mysql(conn) => conn.stream(statement, bindings, batch_size, row_limit).await,
        }
    }

    pub async fn list_tables(&self, schema: Option<&str>) -> Result<Vec<TableSummary>, RuntimeError> {
        match self {
            Self::Postgres(conn) => conn.list_tables(schema).await,
            Self::Mysql(conn) => conn.list_tables(schema).await,
        }
    }

    pub async fn describe_table(&self, table: &str, schema: Option<&str>) -> Result<Vec<ColumnDescription>, RuntimeError> {
        match self {
            Self::Postgres(conn) => conn.describe_table(table, schema).await,
            Self::Mysql(conn) => conn.describe_table(table, schema).await,
        }
    }

    pub async fn release(self) {
        match self {
            Self::Postgres(conn) => conn.release().await,
            Self::Mysql(conn) => conn.release().await,
        }
    }
}
