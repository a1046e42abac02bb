//! Core domain types shared across the engine.

use serde::{Deserialize, Serialize};

use crate::db::DbAccount;

/// Classification of an account within a corporate structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    #[default]
    Company,
    Division,
    Subsidiary,
    Branch,
    Partner,
    Other,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Company => "company",
            EntityType::Division => "division",
            EntityType::Subsidiary => "subsidiary",
            EntityType::Branch => "branch",
            EntityType::Partner => "partner",
            EntityType::Other => "other",
        }
    }

    /// Parse a stored value, mapping anything unrecognized to `Other`
    /// rather than failing the row.
    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "company" => EntityType::Company,
            "division" => EntityType::Division,
            "subsidiary" => EntityType::Subsidiary,
            "branch" => EntityType::Branch,
            "partner" => EntityType::Partner,
            _ => EntityType::Other,
        }
    }
}

/// Kind of a directed edge between two accounts, independent of the
/// hierarchy tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipType {
    Vendor,
    Customer,
    Partner,
    Competitor,
    Affiliate,
    #[default]
    Other,
}

impl RelationshipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipType::Vendor => "vendor",
            RelationshipType::Customer => "customer",
            RelationshipType::Partner => "partner",
            RelationshipType::Competitor => "competitor",
            RelationshipType::Affiliate => "affiliate",
            RelationshipType::Other => "other",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "vendor" => RelationshipType::Vendor,
            "customer" => RelationshipType::Customer,
            "partner" => RelationshipType::Partner,
            "competitor" => RelationshipType::Competitor,
            "affiliate" => RelationshipType::Affiliate,
            _ => RelationshipType::Other,
        }
    }
}

/// Input payload for creating an account.
///
/// Hierarchy placement goes through `parent_id` only; level and path are
/// always computed by the engine, never accepted from callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAccount {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annual_revenue: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Input payload for creating a relationship edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRelationship {
    pub from_id: String,
    pub to_id: String,
    #[serde(default)]
    pub relationship_type: RelationshipType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Outcome of a bulk create. Items are processed independently, so one bad
/// payload never blocks the rest; failures are reported by input position.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateReport {
    pub created: Vec<DbAccount>,
    pub failed: Vec<BulkCreateError>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkCreateError {
    pub index: usize,
    pub name: String,
    pub error: String,
}
