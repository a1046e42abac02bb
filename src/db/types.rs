//! Shared type definitions for the database layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{EntityType, RelationshipType};

/// Errors specific to database operations.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Failed to create database directory: {0}")]
    CreateDir(std::io::Error),

    #[error("Schema migration failed: {0}")]
    Migration(String),
}

/// A row from the `accounts` table.
///
/// `tags` is stored as a JSON array column and parsed by the row mapper.
/// `custom_fields` stays a raw JSON string: an opaque blob this engine
/// never interprets beyond an emptiness check during merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbAccount {
    pub id: String,
    pub tenant_id: String,
    pub name: String,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub industry: Option<String>,
    pub entity_type: EntityType,
    pub account_number: Option<String>,
    pub email: Option<String>,
    pub annual_revenue: Option<f64>,
    pub employee_count: Option<i64>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub description: Option<String>,
    /// Ordered, duplicate-free list of tags.
    pub tags: Vec<String>,
    /// Opaque JSON object blob.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<String>,
    /// Weak reference to the parent account in the same tenant.
    pub parent_id: Option<String>,
    /// Zero-based depth from the tree root.
    pub hierarchy_level: i64,
    /// Ancestor ids joined by `/`, terminating in this account's own id.
    pub hierarchy_path: String,
    pub created_at: String,
    pub updated_at: String,
    /// Acting user recorded by create, field update, and merge.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// A row from the `account_relationships` table: a directed edge between two
/// accounts in the same tenant, independent of the hierarchy tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbRelationship {
    pub id: String,
    pub tenant_id: String,
    pub from_id: String,
    pub to_id: String,
    pub relationship_type: RelationshipType,
    pub description: Option<String>,
    pub created_at: String,
}
