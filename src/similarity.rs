//! Weighted fuzzy similarity between two account field sets.
//!
//! Only fields present on both sides participate: a missing or blank field
//! drops out of the numerator and the denominator, so partial records are
//! never penalized for data they simply don't have. Name and website get
//! graded edit-distance credit; phone, industry, and entity type are
//! all-or-nothing.

use serde::{Deserialize, Serialize};

use crate::db::DbAccount;
use crate::helpers::{non_blank, normalize_phone, normalize_text};
use crate::types::EntityType;

const NAME_WEIGHT: f32 = 3.0;
const WEBSITE_WEIGHT: f32 = 2.0;
const PHONE_WEIGHT: f32 = 2.0;
const INDUSTRY_WEIGHT: f32 = 1.0;
const ENTITY_TYPE_WEIGHT: f32 = 1.0;

/// The subset of account fields the scorer compares. Built from a stored row
/// via `From<&DbAccount>`, or assembled directly for not-yet-saved probes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
}

impl From<&DbAccount> for CandidateFields {
    fn from(account: &DbAccount) -> Self {
        // Stored rows can carry blank strings; those are absent for scoring.
        CandidateFields {
            name: non_blank(Some(account.name.as_str())).map(str::to_string),
            website: non_blank(account.website.as_deref()).map(str::to_string),
            phone: non_blank(account.phone.as_deref()).map(str::to_string),
            industry: non_blank(account.industry.as_deref()).map(str::to_string),
            entity_type: Some(account.entity_type),
        }
    }
}

/// A field participates in scoring only when it holds visible content.
fn present(value: &Option<String>) -> Option<&str> {
    non_blank(value.as_deref())
}

/// Weighted similarity in `[0, 1]`. Returns `0.0` when the two sides share
/// no comparable fields.
pub fn score(a: &CandidateFields, b: &CandidateFields) -> f32 {
    score_detailed(a, b).0
}

/// Like [`score`], but also reports each compared field with its raw
/// per-field similarity, for candidate-report reasons.
pub fn score_detailed(a: &CandidateFields, b: &CandidateFields) -> (f32, Vec<(&'static str, f32)>) {
    let mut weighted_sum = 0.0f32;
    let mut weight_total = 0.0f32;
    let mut parts: Vec<(&'static str, f32)> = Vec::new();

    if let (Some(a_name), Some(b_name)) = (present(&a.name), present(&b.name)) {
        let s = string_similarity(a_name, b_name);
        weighted_sum += NAME_WEIGHT * s;
        weight_total += NAME_WEIGHT;
        parts.push(("name", s));
    }

    if let (Some(a_site), Some(b_site)) = (present(&a.website), present(&b.website)) {
        let s = string_similarity(a_site, b_site);
        weighted_sum += WEBSITE_WEIGHT * s;
        weight_total += WEBSITE_WEIGHT;
        parts.push(("website", s));
    }

    if let (Some(a_phone), Some(b_phone)) = (present(&a.phone), present(&b.phone)) {
        // Digits-only exact match; no partial credit for phone numbers.
        let s = if normalize_phone(a_phone) == normalize_phone(b_phone) {
            1.0
        } else {
            0.0
        };
        weighted_sum += PHONE_WEIGHT * s;
        weight_total += PHONE_WEIGHT;
        parts.push(("phone", s));
    }

    if let (Some(a_ind), Some(b_ind)) = (present(&a.industry), present(&b.industry)) {
        let s = if a_ind.to_lowercase() == b_ind.to_lowercase() {
            1.0
        } else {
            0.0
        };
        weighted_sum += INDUSTRY_WEIGHT * s;
        weight_total += INDUSTRY_WEIGHT;
        parts.push(("industry", s));
    }

    if let (Some(a_type), Some(b_type)) = (a.entity_type, b.entity_type) {
        let s = if a_type == b_type { 1.0 } else { 0.0 };
        weighted_sum += ENTITY_TYPE_WEIGHT * s;
        weight_total += ENTITY_TYPE_WEIGHT;
        parts.push(("entityType", s));
    }

    if weight_total == 0.0 {
        return (0.0, parts);
    }
    (weighted_sum / weight_total, parts)
}

/// Graded string similarity: trimmed case-folded equality scores 1.0,
/// anything else `1 - editDistance / max(len)` on the normalized forms.
pub fn string_similarity(a: &str, b: &str) -> f32 {
    let a = normalize_text(a);
    let b = normalize_text(b);
    if a == b {
        return 1.0;
    }
    let max_len = a.chars().count().max(b.chars().count());
    let distance = strsim::levenshtein(&a, &b);
    1.0 - distance as f32 / max_len as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn named(name: &str) -> CandidateFields {
        CandidateFields {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_kitten_sitting_classic_distance() {
        assert_eq!(strsim::levenshtein("kitten", "sitting"), 3);
        let s = string_similarity("kitten", "sitting");
        assert!((s - (1.0 - 3.0 / 7.0)).abs() < 1e-6, "got {s}");
    }

    #[test]
    fn test_exact_name_ignores_case_and_whitespace() {
        assert_eq!(score(&named("Acme"), &named(" acme ")), 1.0);
        assert_eq!(string_similarity("ACME Corp", "acme corp"), 1.0);
    }

    #[test]
    fn test_score_is_symmetric() {
        let a = CandidateFields {
            name: Some("Acme Corp".to_string()),
            website: Some("acme.example".to_string()),
            phone: Some("555-0100".to_string()),
            industry: Some("Manufacturing".to_string()),
            entity_type: Some(EntityType::Company),
        };
        let b = CandidateFields {
            name: Some("Acme Corporation".to_string()),
            website: Some("acme.example".to_string()),
            phone: Some("5550199".to_string()),
            industry: Some("Retail".to_string()),
            entity_type: Some(EntityType::Division),
        };
        assert_eq!(score(&a, &b), score(&b, &a));
    }

    #[test]
    fn test_phone_is_exact_after_digit_strip() {
        let a = CandidateFields {
            phone: Some("(555) 123-4567".to_string()),
            ..Default::default()
        };
        let b = CandidateFields {
            phone: Some("5551234567".to_string()),
            ..Default::default()
        };
        assert_eq!(score(&a, &b), 1.0);

        let c = CandidateFields {
            phone: Some("5551234568".to_string()),
            ..Default::default()
        };
        assert_eq!(score(&a, &c), 0.0);
    }

    #[test]
    fn test_no_overlapping_fields_scores_zero() {
        let a = named("Acme");
        let b = CandidateFields {
            website: Some("acme.example".to_string()),
            ..Default::default()
        };
        assert_eq!(score(&a, &b), 0.0);
    }

    #[test]
    fn test_missing_fields_drop_out_of_the_weight_base() {
        // Only name + entity type are comparable: (3 * nameSim + 1 * 1.0) / 4.
        let a = CandidateFields {
            name: Some("kitten".to_string()),
            entity_type: Some(EntityType::Company),
            ..Default::default()
        };
        let b = CandidateFields {
            name: Some("sitting".to_string()),
            entity_type: Some(EntityType::Company),
            website: None,
            ..Default::default()
        };
        let name_sim = 1.0 - 3.0 / 7.0;
        let expected = (3.0 * name_sim + 1.0) / 4.0;
        assert!((score(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_entity_type_mismatch_costs_its_weight() {
        let a = CandidateFields {
            name: Some("Acme".to_string()),
            entity_type: Some(EntityType::Company),
            ..Default::default()
        };
        let b = CandidateFields {
            name: Some("Acme".to_string()),
            entity_type: Some(EntityType::Division),
            ..Default::default()
        };
        // (3 * 1.0 + 1 * 0.0) / 4
        assert_eq!(score(&a, &b), 0.75);
    }

    #[test]
    fn test_industry_compares_case_insensitively() {
        let a = CandidateFields {
            industry: Some("Technology".to_string()),
            ..Default::default()
        };
        let b = CandidateFields {
            industry: Some("TECHNOLOGY".to_string()),
            ..Default::default()
        };
        assert_eq!(score(&a, &b), 1.0);
    }

    #[test]
    fn test_detailed_parts_name_compared_fields() {
        let a = CandidateFields {
            name: Some("Acme".to_string()),
            phone: Some("5550100".to_string()),
            ..Default::default()
        };
        let b = CandidateFields {
            name: Some("Acme".to_string()),
            phone: Some("5550100".to_string()),
            industry: Some("Retail".to_string()),
            ..Default::default()
        };
        let (total, parts) = score_detailed(&a, &b);
        assert_eq!(total, 1.0);
        let fields: Vec<&str> = parts.iter().map(|(f, _)| *f).collect();
        assert_eq!(fields, vec!["name", "phone"]);
    }

    #[test]
    fn test_from_db_account_carries_identity_fields() {
        let mut account = crate::db::test_utils::blank_account("t1", "a1", "Acme");
        account.website = Some("acme.example".to_string());
        let fields = CandidateFields::from(&account);
        assert_eq!(fields.name.as_deref(), Some("Acme"));
        assert_eq!(fields.website.as_deref(), Some("acme.example"));
        assert!(fields.phone.is_none());
        assert_eq!(fields.entity_type, Some(EntityType::Company));
    }

    #[test]
    fn test_blank_fields_drop_out_of_scoring() {
        // Two blank phones must not count as matching data.
        let a = CandidateFields {
            name: Some("aaaa".to_string()),
            phone: Some("   ".to_string()),
            entity_type: Some(EntityType::Company),
            ..Default::default()
        };
        let b = CandidateFields {
            name: Some("aabb".to_string()),
            phone: Some(String::new()),
            entity_type: Some(EntityType::Company),
            ..Default::default()
        };
        let (total, parts) = score_detailed(&a, &b);
        let compared: Vec<&str> = parts.iter().map(|(f, _)| *f).collect();
        assert_eq!(compared, vec!["name", "entityType"]);
        // (3 * 0.5 + 1.0) / 4, not (3 * 0.5 + 2.0 + 1.0) / 6.
        assert!((total - 0.625).abs() < 1e-6, "got {total}");
    }

    #[test]
    fn test_blank_versus_filled_field_is_not_compared() {
        // A one-sided blank drops out instead of scoring 0.0 against content.
        let a = CandidateFields {
            name: Some("Acme".to_string()),
            website: Some("  ".to_string()),
            ..Default::default()
        };
        let b = CandidateFields {
            name: Some("Acme".to_string()),
            website: Some("acme.example".to_string()),
            ..Default::default()
        };
        assert_eq!(score(&a, &b), 1.0);
    }

    #[test]
    fn test_from_db_account_drops_blank_fields() {
        let mut account = crate::db::test_utils::blank_account("t1", "a1", "Acme");
        account.website = Some("   ".to_string());
        account.phone = Some(String::new());
        account.industry = Some(" ".to_string());
        let fields = CandidateFields::from(&account);
        assert_eq!(fields.name.as_deref(), Some("Acme"));
        assert!(fields.website.is_none());
        assert!(fields.phone.is_none());
        assert!(fields.industry.is_none());
    }
}
