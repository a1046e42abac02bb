//! Account lifecycle operations.
//!
//! Create, bulk create, single-field update, lookup, and guarded delete.
//! Creation validates the whole payload up front and, when a parent is
//! given, places the new account in the hierarchy inside the same
//! transaction, so a bad parent leaves no orphan row behind. Field updates
//! go through a column whitelist; hierarchy placement never changes here,
//! only through the hierarchy operations.

use chrono::Utc;
use rusqlite::types::Value as SqlValue;

use crate::config::EngineConfig;
use crate::db::{DbAccount, StewardDb};
use crate::error::StewardError;
use crate::hierarchy::{apply_parent, TenantTree};
use crate::types::{BulkCreateError, BulkCreateReport, EntityType, NewAccount};
use crate::validation::{
    custom_fields_problem, email_problem, name_problem, phone_problem, tags_problems,
    url_problem, validate_new_account,
};

// =============================================================================
// Create
// =============================================================================

/// Validate and persist a new account.
///
/// `parent_id`, when present, is applied through the hierarchy machinery in
/// the same transaction as the insert: a missing parent or a depth overrun
/// rolls the whole creation back.
pub fn create_account(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
    payload: NewAccount,
    acting_user: &str,
) -> Result<DbAccount, StewardError> {
    validate_new_account(&payload)?;

    let now = Utc::now().to_rfc3339();
    let id = uuid::Uuid::new_v4().to_string();
    let account = DbAccount {
        id: id.clone(),
        tenant_id: tenant_id.to_string(),
        name: payload.name,
        website: payload.website,
        phone: payload.phone,
        industry: payload.industry,
        entity_type: payload.entity_type,
        account_number: payload.account_number,
        email: payload.email,
        annual_revenue: payload.annual_revenue,
        employee_count: payload.employee_count,
        address: payload.address,
        city: payload.city,
        country: payload.country,
        description: payload.description,
        tags: payload.tags,
        custom_fields: payload.custom_fields,
        parent_id: None,
        hierarchy_level: 0,
        hierarchy_path: id.clone(),
        created_at: now.clone(),
        updated_at: now,
        updated_by: Some(acting_user.to_string()),
    };

    let created = db.with_transaction(|db| {
        db.upsert_account(&account)?;
        if let Some(parent_id) = payload.parent_id.as_deref() {
            let mut tree = TenantTree::load(db, tenant_id)?;
            apply_parent(db, cfg, &mut tree, &account.id, Some(parent_id))?;
            return db
                .get_account(tenant_id, &account.id)?
                .ok_or_else(|| StewardError::AccountNotFound(account.id.clone()));
        }
        Ok(account.clone())
    })?;

    log::info!(
        "Created account {} ({}) for tenant {tenant_id}",
        created.id,
        created.name
    );
    Ok(created)
}

/// Bulk create. Each item stands alone: a failure is recorded with its input
/// index and the rest still go through.
pub fn create_many(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
    payloads: Vec<NewAccount>,
    acting_user: &str,
) -> BulkCreateReport {
    let mut report = BulkCreateReport {
        created: Vec::new(),
        failed: Vec::new(),
    };
    for (index, payload) in payloads.into_iter().enumerate() {
        let name = payload.name.clone();
        match create_account(db, cfg, tenant_id, payload, acting_user) {
            Ok(account) => report.created.push(account),
            Err(err) => {
                log::warn!("Bulk create item {index} ({name}) failed: {err}");
                report.failed.push(BulkCreateError {
                    index,
                    name,
                    error: err.to_string(),
                });
            }
        }
    }
    log::info!(
        "Bulk create for tenant {tenant_id}: {} created, {} failed",
        report.created.len(),
        report.failed.len()
    );
    report
}

// =============================================================================
// Single-field update
// =============================================================================

/// Update one whitelisted field. Hierarchy placement and identity columns
/// are not reachable from here.
pub fn update_account_field(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
    field: &str,
    value: &serde_json::Value,
    acting_user: &str,
) -> Result<DbAccount, StewardError> {
    if db.get_account(tenant_id, id)?.is_none() {
        return Err(StewardError::AccountNotFound(id.to_string()));
    }

    let (column, sql_value) = convert_field(field, value)?;
    db.with_transaction(|db| {
        db.update_account_column(tenant_id, id, column, sql_value.clone())?;
        db.update_account_column(
            tenant_id,
            id,
            "updated_by",
            SqlValue::Text(acting_user.to_string()),
        )?;
        Ok(())
    })?;

    log::info!("Updated {field} on account {id} for tenant {tenant_id}");
    db.get_account(tenant_id, id)?
        .ok_or_else(|| StewardError::AccountNotFound(id.to_string()))
}

/// Map a field name to its column and a validated SQL value.
fn convert_field(
    field: &str,
    value: &serde_json::Value,
) -> Result<(&'static str, SqlValue), StewardError> {
    use serde_json::Value as Json;

    fn fail(problem: String) -> StewardError {
        StewardError::ValidationFailed(vec![problem])
    }

    // Optional text columns accept null to clear the value.
    fn optional_text(
        column: &'static str,
        field: &str,
        value: &Json,
        check: Option<fn(&str) -> Option<String>>,
    ) -> Result<(&'static str, SqlValue), StewardError> {
        match value {
            Json::Null => Ok((column, SqlValue::Null)),
            Json::String(text) => {
                if let Some(check) = check {
                    let trimmed = text.trim();
                    if !trimmed.is_empty() {
                        if let Some(problem) = check(trimmed) {
                            return Err(fail(problem));
                        }
                    }
                }
                Ok((column, SqlValue::Text(text.clone())))
            }
            _ => Err(fail(format!("{field} must be a string or null"))),
        }
    }

    match field {
        "name" => {
            let text = value
                .as_str()
                .ok_or_else(|| fail("name must be a string".to_string()))?;
            if text.trim().is_empty() {
                return Err(fail("name must not be blank".to_string()));
            }
            if let Some(problem) = name_problem(text.trim()) {
                return Err(fail(problem));
            }
            Ok(("name", SqlValue::Text(text.to_string())))
        }
        "website" => optional_text("website", field, value, Some(url_problem)),
        "phone" => optional_text("phone", field, value, Some(phone_problem)),
        "email" => optional_text("email", field, value, Some(email_problem)),
        "industry" => optional_text("industry", field, value, None),
        "accountNumber" => optional_text("account_number", field, value, None),
        "address" => optional_text("address", field, value, None),
        "city" => optional_text("city", field, value, None),
        "country" => optional_text("country", field, value, None),
        "description" => optional_text("description", field, value, None),
        "entityType" => {
            let entity_type: EntityType = serde_json::from_value(value.clone())
                .map_err(|_| fail(format!("entityType is not recognized: {value}")))?;
            Ok(("entity_type", SqlValue::Text(entity_type.as_str().to_string())))
        }
        "annualRevenue" => match value {
            Json::Null => Ok(("annual_revenue", SqlValue::Null)),
            Json::Number(n) => {
                let revenue = n
                    .as_f64()
                    .filter(|v| *v >= 0.0)
                    .ok_or_else(|| fail("annualRevenue must be a non-negative number".to_string()))?;
                Ok(("annual_revenue", SqlValue::Real(revenue)))
            }
            _ => Err(fail("annualRevenue must be a number or null".to_string())),
        },
        "employeeCount" => match value {
            Json::Null => Ok(("employee_count", SqlValue::Null)),
            Json::Number(n) => {
                let count = n
                    .as_i64()
                    .filter(|v| *v >= 0)
                    .ok_or_else(|| fail("employeeCount must be a non-negative integer".to_string()))?;
                Ok(("employee_count", SqlValue::Integer(count)))
            }
            _ => Err(fail("employeeCount must be an integer or null".to_string())),
        },
        "tags" => {
            let tags: Vec<String> = serde_json::from_value(value.clone())
                .map_err(|_| fail("tags must be an array of strings".to_string()))?;
            let problems = tags_problems(&tags);
            if !problems.is_empty() {
                return Err(StewardError::ValidationFailed(problems));
            }
            let encoded =
                serde_json::to_string(&tags).unwrap_or_else(|_| "[]".to_string());
            Ok(("tags", SqlValue::Text(encoded)))
        }
        "customFields" => match value {
            Json::Null => Ok(("custom_fields", SqlValue::Null)),
            Json::String(text) => {
                if let Some(problem) = custom_fields_problem(text) {
                    return Err(fail(problem));
                }
                Ok(("custom_fields", SqlValue::Text(text.clone())))
            }
            Json::Object(_) => Ok(("custom_fields", SqlValue::Text(value.to_string()))),
            _ => Err(fail("customFields must be a JSON object".to_string())),
        },
        other => Err(fail(format!("field is not updatable: {other}"))),
    }
}

// =============================================================================
// Lookup
// =============================================================================

pub fn get_account(
    db: &StewardDb,
    tenant_id: &str,
    id: &str,
) -> Result<DbAccount, StewardError> {
    db.get_account(tenant_id, id)?
        .ok_or_else(|| StewardError::AccountNotFound(id.to_string()))
}

pub fn get_accounts(db: &StewardDb, tenant_id: &str) -> Result<Vec<DbAccount>, StewardError> {
    Ok(db.get_accounts_for_tenant(tenant_id)?)
}

/// Case-insensitive exact-name lookup. Absence is not an error here; callers
/// use this to probe before create.
pub fn get_account_by_name(
    db: &StewardDb,
    tenant_id: &str,
    name: &str,
) -> Result<Option<DbAccount>, StewardError> {
    Ok(db.get_account_by_name(tenant_id, name)?)
}

// =============================================================================
// Delete
// =============================================================================

/// Delete an account and its relationships. Accounts with children are
/// refused; detach or reparent the children first.
pub fn delete_account(db: &StewardDb, tenant_id: &str, id: &str) -> Result<(), StewardError> {
    db.with_transaction(|db| {
        if db.get_account(tenant_id, id)?.is_none() {
            return Err(StewardError::AccountNotFound(id.to_string()));
        }
        let children = db.count_children(tenant_id, id)?;
        if children > 0 {
            return Err(StewardError::HasChildren(format!(
                "account {id} still has {children} child accounts"
            )));
        }
        db.delete_relationships_for_account(tenant_id, id)?;
        db.delete_account(tenant_id, id)?;
        log::info!("Deleted account {id} for tenant {tenant_id}");
        Ok(())
    })
}
