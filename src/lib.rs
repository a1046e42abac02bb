//! Steward: account deduplication and hierarchy consistency for
//! multi-tenant CRM data. SQLite-backed; every operation is scoped to a
//! tenant and the parent/child tree carries denormalized level and path
//! columns that the engine keeps consistent (and can audit).

pub mod accounts;
pub mod config;
pub mod db;
pub mod dedup;
pub mod error;
pub mod helpers;
pub mod hierarchy;
pub mod integrity;
pub mod merge;
mod migrations;
pub mod relationships;
pub mod similarity;
pub mod types;
pub mod validation;

pub use config::EngineConfig;
pub use db::StewardDb;
pub use error::StewardError;
