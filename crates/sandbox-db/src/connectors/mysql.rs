use std::collections::HashMap;

use async_stream::try_stream;
use async_trait::async_trait;
use sandbox_error::RuntimeError;
use sqlx::mysql::{MySqlConnectOptions, MySqlRow};
use sqlx::{Column, ConnectOptions, Connection, MySqlConnection, Row as SqlxRow, TypeInfo};

use crate::connector::{
    apply_row_limit, rewrite_named_placeholders, ColumnDescription, Connector, RawQueryResult, RowBatch, RowStream,
    TableSummary,
};
use crate::descriptor::ConnectionDescriptor;
use crate::types::{CanonicalType, ColumnSchema, Row, Value};

/// Connector for MySQL, over `sqlx` — the second vendor named in §4.2's
/// design notes (the original `connectors/mysql.py`), kept as a `sqlx`
/// implementation (rather than a second hand-rolled wire client) since
/// `sqlx` is already a teacher workspace dependency used for its MySQL
/// feature.
#[derive(Debug, Default)]
pub struct MysqlConnector;

pub struct MysqlConnection {
    conn: MySqlConnection,
}

fn canonical_type(type_name: &str) -> CanonicalType {
    match type_name {
        "BOOLEAN" | "TINYINT(1)" => CanonicalType::Bool,
        "TINYINT" | "SMALLINT" | "INT" | "BIGINT" | "MEDIUMINT" => CanonicalType::Int,
        "FLOAT" | "DOUBLE" | "DECIMAL" => CanonicalType::Float,
        "DATETIME" | "TIMESTAMP" | "DATE" => CanonicalType::Timestamp,
        "JSON" => CanonicalType::Json,
        "BLOB" | "VARBINARY" | "BINARY" => CanonicalType::Bytes,
        _ => CanonicalType::Text,
    }
}

fn row_to_schema(row: &MySqlRow) -> Vec<ColumnSchema> {
    row.columns()
        .iter()
        .map(|c| ColumnSchema {
            name: c.name().to_string(),
            declared_type: canonical_type(c.type_info().name()),
            masked: false,
        })
        .collect()
}

fn mysql_row_to_row(row: &MySqlRow) -> Row {
    let values = row
        .columns()
        .iter()
        .enumerate()
        .map(|(idx, c)| match canonical_type(c.type_info().name()) {
            CanonicalType::Bool => row.try_get::<Option<bool>, _>(idx).ok().flatten().map_or(Value::Null, Value::Bool),
            CanonicalType::Int => row.try_get::<Option<i64>, _>(idx).ok().flatten().map_or(Value::Null, Value::Int),
            CanonicalType::Float => row.try_get::<Option<f64>, _>(idx).ok().flatten().map_or(Value::Null, Value::Float),
            CanonicalType::Bytes => {
                row.try_get::<Option<Vec<u8>>, _>(idx).ok().flatten().map_or(Value::Null, Value::Bytes)
            }
            _ => row.try_get::<Option<String>, _>(idx).ok().flatten().map_or(Value::Null, Value::Text),
        })
        .collect();
    Row { values }
}

#[async_trait]
impl Connector for MysqlConnector {
    type Connection = MysqlConnection;

    async fn open(&self, descriptor: &ConnectionDescriptor) -> Result<Self::Connection, RuntimeError> {
        let options = MySqlConnectOptions::new()
            .host(&descriptor.host)
            .port(descriptor.port)
            .database(&descriptor.database)
            .username(&descriptor.username)
            .password(descriptor.secrets.password.as_ref().map(|s| s.expose()).unwrap_or(""));

        let conn = tokio::time::timeout(descriptor.connect_timeout, options.connect())
            .await
            .map_err(|_| RuntimeError::ConnectionFailed { reason: "connect timeout".to_string() })?
            .map_err(|e| RuntimeError::ConnectionFailed { reason: e.to_string() })?;
        Ok(MysqlConnection { conn })
    }

    async fn close(&self, conn: Self::Connection) -> Result<(), RuntimeError> {
        conn.conn.close().await.map_err(|e| RuntimeError::internal(e.to_string()))
    }

    async fn probe(&self, conn: &mut Self::Connection) -> bool {
        conn.conn.ping().await.is_ok()
    }

    async fn execute(
        &self,
        conn: &mut Self::Connection,
        statement: &str,
        bindings: &HashMap<String, Value>,
        row_limit: Option<u64>,
    ) -> Result<RawQueryResult, RuntimeError> {
        let bounded = row_limit.map(|n| apply_row_limit(statement, n));
        let (rewritten, ordered) = rewrite_named_placeholders(bounded.as_deref().unwrap_or(statement), bindings, |_| "?".to_string());
        let mut query = sqlx::query(&rewritten);
        for value in &ordered {
            query = bind_one(query, value);
        }
        let rows =
            query.fetch_all(&mut conn.conn).await.map_err(|e| RuntimeError::query_error(e.to_string(), statement))?;

        let columns = rows.first().map(row_to_schema).unwrap_or_default();
        let out_rows = rows.iter().map(mysql_row_to_row).collect();
        Ok(RawQueryResult { columns, rows: out_rows })
    }

    async fn stream(
        &self,
        conn: &mut Self::Connection,
        statement: &str,
        bindings: &HashMap<String, Value>,
        batch_size: usize,
        row_limit: Option<u64>,
    ) -> Result<RowStream, RuntimeError> {
        let result = self.execute(conn, statement, bindings, row_limit).await?;
        let batch_size = batch_size.max(1);
        let columns = result.columns;
        let rows = result.rows;
        let stream = try_stream! {
            for chunk in rows.chunks(batch_size) {
                yield RowBatch { columns: columns.clone(), rows: chunk.to_vec() };
            }
        };
        Ok(Box::pin(stream))
    }

    async fn list_tables(&self, conn: &mut Self::Connection, schema: Option<&str>) -> Result<Vec<TableSummary>, RuntimeError> {
        let query = match schema {
            Some(s) => sqlx::query("SELECT table_schema, table_name FROM information_schema.tables WHERE table_schema = ?")
                .bind(s.to_string()),
            None => sqlx::query("SELECT table_schema, table_name FROM information_schema.tables WHERE table_schema = DATABASE()"),
        };
        let rows = query.fetch_all(&mut conn.conn).await.map_err(|e| RuntimeError::query_error(e.to_string(), "list_tables"))?;
        Ok(rows
            .iter()
            .map(|r| TableSummary { schema: r.try_get::<Option<String>, _>(0).ok().flatten(), name: r.get(1) })
            .collect())
    }

    async fn describe_table(
        &self,
        conn: &mut Self::Connection,
        table: &str,
        schema: Option<&str>,
    ) -> Result<Vec<ColumnDescription>, RuntimeError> {
        let schema_filter = schema.map(str::to_string).unwrap_or_else(|| "DATABASE()".to_string());
        let sql = if schema.is_some() {
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
             WHERE table_schema = ? AND table_name = ? ORDER BY ordinal_position"
        } else {
            "SELECT column_name, data_type, is_nullable FROM information_schema.columns \
             WHERE table_schema = DATABASE() AND table_name = ? ORDER BY ordinal_position"
        };
        let query = if schema.is_some() {
            sqlx::query(sql).bind(schema_filter).bind(table.to_string())
        } else {
            sqlx::query(sql).bind(table.to_string())
        };
        let rows =
            query.fetch_all(&mut conn.conn).await.map_err(|e| RuntimeError::query_error(e.to_string(), "describe_table"))?;
        Ok(rows
            .iter()
            .map(|r| {
                let data_type: String = r.get(1);
                let nullable: String = r.get(2);
                ColumnDescription {
                    name: r.get(0),
                    declared_type: canonical_type(&data_type.to_uppercase()),
                    nullable: nullable.eq_ignore_ascii_case("YES"),
                }
            })
            .collect())
    }
}

fn bind_one<'q>(
    query: sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, sqlx::MySql, sqlx::mysql::MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<i64>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s),
        Value::Bytes(b) => query.bind(b),
        Value::Timestamp(t) => query.bind(*t),
        Value::Json(j) => query.bind(j),
    }
}
