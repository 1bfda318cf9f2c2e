//! Connector contract (§4.2), per-vendor adapters, and the bounded
//! connection pool shared by the SQL execution path.

mod any_pool;
mod connector;
mod connectors;
mod descriptor;
mod pool;
mod registry;
mod types;

pub use any_pool::{AnyPool, AnyPooledConnection};
pub use connector::{
    apply_row_limit, rewrite_named_placeholders, ColumnDescription, Connector, RawQueryResult, RowBatch, RowStream,
    TableSummary,
};
pub use connectors::{MysqlConnection, MysqlConnector, PostgresConnection, PostgresConnector};
pub use descriptor::{ConnectionDescriptor, ConnectionDescriptorInput, Secret, SecretBag};
pub use pool::{ConnectionPool, PooledConnection};
pub use registry::ConnectionRegistry;
pub use types::{CanonicalType, ColumnSchema, Row, Value};

pub use sandbox_config::{SslMode, VendorTag};
