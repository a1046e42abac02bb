//! Duplicate candidate detection.
//!
//! Two paths: a targeted lookup used on create/update (exact identity
//! matches plus a scored name-contains superset), and an exhaustive
//! all-pairs tenant sweep meant for background maintenance, not a request
//! path. Both use set semantics: an account appears at most once no matter
//! how many comparisons flag it.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::db::{DbAccount, StewardDb};
use crate::error::StewardError;
use crate::helpers::non_blank;
use crate::similarity::{score, score_detailed, CandidateFields};

/// One flagged pair from a scan report, highest confidence first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePair {
    pub first_id: String,
    pub first_name: String,
    pub second_id: String,
    pub second_name: String,
    pub confidence: f32,
    pub reason: String,
}

/// Duplicate candidates for one probe record.
///
/// Exact matches on name, website, or phone are included unconditionally;
/// accounts whose name merely contains the probe's name are kept only when
/// the weighted score clears the configured threshold (inclusive).
pub fn find_potential_duplicates(
    db: &StewardDb,
    cfg: &EngineConfig,
    fields: &CandidateFields,
    tenant_id: &str,
    exclude_id: Option<&str>,
) -> Result<Vec<DbAccount>, StewardError> {
    let mut results: Vec<DbAccount> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    // A blank field is absent, not an empty value to match on.
    let exact = db.find_exact_matches(
        tenant_id,
        exclude_id,
        non_blank(fields.name.as_deref()),
        non_blank(fields.website.as_deref()),
        non_blank(fields.phone.as_deref()),
    )?;
    for account in exact {
        if seen.insert(account.id.clone()) {
            results.push(account);
        }
    }

    if let Some(name) = non_blank(fields.name.as_deref()) {
        let superset = db.find_by_name_containing(tenant_id, name, exclude_id)?;
        for account in superset {
            if seen.contains(&account.id) {
                continue;
            }
            let candidate = CandidateFields::from(&account);
            let s = score(fields, &candidate);
            if s >= cfg.similarity_threshold {
                log::debug!("Account {} scored {s:.3} against the probe", account.id);
                seen.insert(account.id.clone());
                results.push(account);
            }
        }
    }

    Ok(results)
}

/// Exhaustive all-pairs sweep over a tenant. Any pair clearing the threshold
/// puts both members in the result. Quadratic in tenant size; run it as a
/// maintenance job.
pub fn find_all_potential_duplicates_in_tenant(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
) -> Result<Vec<DbAccount>, StewardError> {
    let accounts = db.get_accounts_for_tenant(tenant_id)?;
    let fields: Vec<CandidateFields> = accounts.iter().map(CandidateFields::from).collect();

    let mut flagged: HashSet<usize> = HashSet::new();
    for i in 0..accounts.len() {
        for j in (i + 1)..accounts.len() {
            if score(&fields[i], &fields[j]) >= cfg.similarity_threshold {
                flagged.insert(i);
                flagged.insert(j);
            }
        }
    }

    log::info!(
        "Duplicate sweep for tenant {tenant_id} flagged {} of {} accounts",
        flagged.len(),
        accounts.len()
    );

    Ok(accounts
        .into_iter()
        .enumerate()
        .filter(|(idx, _)| flagged.contains(idx))
        .map(|(_, account)| account)
        .collect())
}

/// Pair-level sweep report for review tooling: every pair clearing the
/// threshold, with per-field scores folded into a reason string, sorted by
/// confidence descending.
pub fn duplicate_scan_report(
    db: &StewardDb,
    cfg: &EngineConfig,
    tenant_id: &str,
) -> Result<Vec<DuplicatePair>, StewardError> {
    let accounts = db.get_accounts_for_tenant(tenant_id)?;
    let fields: Vec<CandidateFields> = accounts.iter().map(CandidateFields::from).collect();

    let mut pairs: Vec<DuplicatePair> = Vec::new();
    for i in 0..accounts.len() {
        for j in (i + 1)..accounts.len() {
            let (confidence, parts) = score_detailed(&fields[i], &fields[j]);
            if confidence < cfg.similarity_threshold {
                continue;
            }
            let reason = parts
                .iter()
                .map(|(field, s)| format!("{field} {s:.2}"))
                .collect::<Vec<_>>()
                .join(", ");
            pairs.push(DuplicatePair {
                first_id: accounts[i].id.clone(),
                first_name: accounts[i].name.clone(),
                second_id: accounts[j].id.clone(),
                second_name: accounts[j].name.clone(),
                confidence,
                reason,
            });
        }
    }

    pairs.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(pairs)
}
