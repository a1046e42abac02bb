//! Hierarchy consistency verification.
//!
//! Stored `hierarchy_level` and `hierarchy_path` are denormalized from the
//! parent pointers, and `parent_id` is deliberately a weak reference, so rows
//! can drift out of line with each other. The sweep recomputes the expected
//! placement of every account from its parent chain and reports every
//! discrepancy it finds; it never stops at the first one.

use std::collections::HashSet;

use serde::Serialize;

use crate::db::StewardDb;
use crate::error::StewardError;
use crate::hierarchy::TenantTree;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    MissingParent,
    Cycle,
    WrongLevel,
    WrongPath,
    DanglingRelationship,
}

/// One inconsistency. `subject_id` is an account id, or a relationship id
/// for `DanglingRelationship`. `detail` is self-contained human text.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyViolation {
    pub subject_id: String,
    pub kind: ViolationKind,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityReport {
    pub tenant_id: String,
    pub accounts_checked: usize,
    pub relationships_checked: usize,
    pub violations: Vec<HierarchyViolation>,
}

impl IntegrityReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

enum Walk {
    Placed { level: i64, path: String },
    MissingParent(String),
    Cycle,
}

/// Follow parent pointers from `id` to a root. The visited set makes the
/// walk terminate on corrupt data instead of looping.
fn expected_placement(tree: &TenantTree, id: &str) -> Walk {
    let mut chain: Vec<&str> = vec![id];
    let mut visited: HashSet<&str> = HashSet::from([id]);
    let mut current = tree.get(id).and_then(|n| n.parent_id.as_deref());
    while let Some(parent_id) = current {
        let Some(parent) = tree.get(parent_id) else {
            return Walk::MissingParent(parent_id.to_string());
        };
        if !visited.insert(parent_id) {
            return Walk::Cycle;
        }
        chain.push(parent_id);
        current = parent.parent_id.as_deref();
    }
    let level = (chain.len() - 1) as i64;
    chain.reverse();
    Walk::Placed {
        level,
        path: chain.join("/"),
    }
}

/// Full sweep over one tenant: every account's stored placement against its
/// recomputed one, plus relationship endpoints against the account set.
pub fn integrity_report(db: &StewardDb, tenant_id: &str) -> Result<IntegrityReport, StewardError> {
    let tree = TenantTree::load(db, tenant_id)?;
    let mut violations: Vec<HierarchyViolation> = Vec::new();

    for account in tree.accounts() {
        match expected_placement(&tree, &account.id) {
            Walk::MissingParent(parent_id) => violations.push(HierarchyViolation {
                subject_id: account.id.clone(),
                kind: ViolationKind::MissingParent,
                detail: format!(
                    "account {} points at parent {parent_id}, which does not exist in tenant {tenant_id}",
                    account.id
                ),
            }),
            Walk::Cycle => violations.push(HierarchyViolation {
                subject_id: account.id.clone(),
                kind: ViolationKind::Cycle,
                detail: format!(
                    "parent chain from account {} loops back on itself",
                    account.id
                ),
            }),
            Walk::Placed { level, path } => {
                if account.hierarchy_level != level {
                    violations.push(HierarchyViolation {
                        subject_id: account.id.clone(),
                        kind: ViolationKind::WrongLevel,
                        detail: format!(
                            "account {} stores level {} but its parent chain yields {level}",
                            account.id, account.hierarchy_level
                        ),
                    });
                }
                if account.hierarchy_path != path {
                    violations.push(HierarchyViolation {
                        subject_id: account.id.clone(),
                        kind: ViolationKind::WrongPath,
                        detail: format!(
                            "account {} stores path {:?} but its parent chain yields {path:?}",
                            account.id, account.hierarchy_path
                        ),
                    });
                }
            }
        }
    }

    let relationships = db.get_relationships_for_tenant(tenant_id)?;
    for relationship in &relationships {
        for endpoint in [&relationship.from_id, &relationship.to_id] {
            if !tree.contains(endpoint) {
                violations.push(HierarchyViolation {
                    subject_id: relationship.id.clone(),
                    kind: ViolationKind::DanglingRelationship,
                    detail: format!(
                        "relationship {} references missing account {endpoint}",
                        relationship.id
                    ),
                });
            }
        }
    }

    log::info!(
        "Integrity sweep for tenant {tenant_id}: {} accounts, {} relationships, {} violations",
        tree.accounts().len(),
        relationships.len(),
        violations.len()
    );

    Ok(IntegrityReport {
        tenant_id: tenant_id.to_string(),
        accounts_checked: tree.accounts().len(),
        relationships_checked: relationships.len(),
        violations,
    })
}

/// Strict form of the sweep: clean tenants pass, anything else comes back as
/// one aggregate error carrying every violation.
pub fn validate_hierarchy_integrity(
    db: &StewardDb,
    tenant_id: &str,
) -> Result<(), StewardError> {
    let report = integrity_report(db, tenant_id)?;
    if report.is_clean() {
        Ok(())
    } else {
        Err(StewardError::IntegrityViolation(
            report
                .violations
                .into_iter()
                .map(|violation| violation.detail)
                .collect(),
        ))
    }
}
