//! Per-vendor `Connector` implementations. One module per entry in the
//! closed `VendorTag` enum (§4.2 design note: "variants are static and
//! closed; dynamic discovery is not required").

mod mysql;
mod postgres;

pub use mysql::{MysqlConnection, MysqlConnector};
pub use postgres::{PostgresConnection, PostgresConnector};
