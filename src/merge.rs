//! Account merging.
//!
//! Folds a secondary account into a primary one: missing scalars fill
//! forward, tags union, the secondary's children and relationships move to
//! the primary, and the secondary row is deleted. Everything runs in one
//! transaction so a mid-merge failure leaves both accounts untouched.

use chrono::Utc;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::db::{DbAccount, StewardDb};
use crate::error::StewardError;
use crate::helpers::non_blank;
use crate::hierarchy::{apply_parent, TenantTree};

/// Summary of what a merge changed.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    pub account: DbAccount,
    /// Field names copied from the secondary into previously-empty slots.
    pub fields_filled: Vec<String>,
    pub tags_added: usize,
    pub children_moved: usize,
    /// Relationship endpoint updates, not distinct rows.
    pub relationships_repointed: usize,
}

/// Merge `secondary_id` into `primary_id` within one tenant.
///
/// The primary wins every conflict: the secondary only contributes where the
/// primary has nothing. Both accounts must belong to `tenant_id`; a secondary
/// that exists under another tenant is a cross-tenant error, not a missing
/// account.
pub fn merge_accounts(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
    primary_id: &str,
    secondary_id: &str,
    acting_user: &str,
) -> Result<MergeOutcome, StewardError> {
    if primary_id == secondary_id {
        return Err(StewardError::ValidationFailed(vec![
            "cannot merge an account into itself".to_string(),
        ]));
    }

    db.with_transaction(|db| {
        let mut primary = db
            .get_account(tenant_id, primary_id)?
            .ok_or_else(|| StewardError::AccountNotFound(primary_id.to_string()))?;
        let secondary = match db.get_account(tenant_id, secondary_id)? {
            Some(account) => account,
            None => {
                return Err(match db.get_account_any_tenant(secondary_id)? {
                    Some(_) => StewardError::CrossTenant(format!(
                        "account {secondary_id} belongs to a different tenant"
                    )),
                    None => StewardError::AccountNotFound(secondary_id.to_string()),
                });
            }
        };

        let mut fields_filled = fill_forward(&mut primary, &secondary);

        let mut tags_added = 0usize;
        for tag in &secondary.tags {
            if !primary.tags.contains(tag) {
                primary.tags.push(tag.clone());
                tags_added += 1;
            }
        }

        if custom_fields_empty(&primary.custom_fields)
            && !custom_fields_empty(&secondary.custom_fields)
        {
            primary.custom_fields = secondary.custom_fields.clone();
            fields_filled.push("customFields".to_string());
        }

        let mut tree = TenantTree::load(db, tenant_id)?;
        let child_ids: Vec<String> = tree
            .children_of(secondary_id)
            .iter()
            .map(|&idx| tree.node(idx).id.clone())
            .collect();
        for child_id in &child_ids {
            apply_parent(db, cfg, &mut tree, child_id, Some(primary_id))?;
        }

        let relationships_repointed =
            db.repoint_relationships(tenant_id, secondary_id, primary_id)?;

        primary.updated_at = Utc::now().to_rfc3339();
        primary.updated_by = Some(acting_user.to_string());
        db.upsert_account(&primary)?;
        db.delete_account(tenant_id, secondary_id)?;

        log::info!(
            "Merged account {secondary_id} into {primary_id} for tenant {tenant_id} \
             ({} fields filled, {} tags added, {} children moved)",
            fields_filled.len(),
            tags_added,
            child_ids.len()
        );

        Ok(MergeOutcome {
            account: primary,
            fields_filled,
            tags_added,
            children_moved: child_ids.len(),
            relationships_repointed,
        })
    })
}

/// Copy each scalar the primary is missing from the secondary. Blank strings
/// count as missing; source values are copied as stored.
fn fill_forward(primary: &mut DbAccount, secondary: &DbAccount) -> Vec<String> {
    let mut filled = Vec::new();

    fn take_text(
        target: &mut Option<String>,
        source: &Option<String>,
        label: &str,
        filled: &mut Vec<String>,
    ) {
        if non_blank(target.as_deref()).is_none() && non_blank(source.as_deref()).is_some() {
            *target = source.clone();
            filled.push(label.to_string());
        }
    }

    take_text(&mut primary.website, &secondary.website, "website", &mut filled);
    take_text(&mut primary.phone, &secondary.phone, "phone", &mut filled);
    take_text(&mut primary.industry, &secondary.industry, "industry", &mut filled);
    take_text(
        &mut primary.account_number,
        &secondary.account_number,
        "accountNumber",
        &mut filled,
    );
    take_text(&mut primary.email, &secondary.email, "email", &mut filled);
    take_text(&mut primary.address, &secondary.address, "address", &mut filled);
    take_text(&mut primary.city, &secondary.city, "city", &mut filled);
    take_text(&mut primary.country, &secondary.country, "country", &mut filled);
    take_text(
        &mut primary.description,
        &secondary.description,
        "description",
        &mut filled,
    );

    if primary.annual_revenue.is_none() && secondary.annual_revenue.is_some() {
        primary.annual_revenue = secondary.annual_revenue;
        filled.push("annualRevenue".to_string());
    }
    if primary.employee_count.is_none() && secondary.employee_count.is_some() {
        primary.employee_count = secondary.employee_count;
        filled.push("employeeCount".to_string());
    }

    filled
}

/// Treats `None`, blank, and `{}` as empty. Unparseable text is kept as-is
/// rather than overwritten.
fn custom_fields_empty(value: &Option<String>) -> bool {
    match value.as_deref().map(str::trim) {
        None | Some("") => true,
        Some(text) => matches!(
            serde_json::from_str::<serde_json::Value>(text),
            Ok(serde_json::Value::Object(map)) if map.is_empty()
        ),
    }
}
