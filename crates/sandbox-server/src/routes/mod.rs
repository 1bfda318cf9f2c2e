pub mod code;
pub mod connections;
pub mod health;
pub mod sql;
pub mod viz;
