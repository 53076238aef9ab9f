//! Forge State Module
//!
//! SQLite-backed durable state (audit log + snapshot index) and the
//! on-disk freeze flag.

mod database;
mod freeze;
mod schema;

pub use database::Database;
pub use freeze::{freeze, is_frozen, thaw};
pub use schema::{CREATE_TABLES, SCHEMA_VERSION};
