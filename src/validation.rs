//! Input validation for account payloads.
//!
//! Checks accumulate across every field and surface once as a single
//! `ValidationFailed`, so a caller fixing a payload sees the whole list
//! rather than one problem per round trip.

use std::collections::HashSet;

use regex::Regex;

use crate::error::StewardError;
use crate::helpers::{non_blank, normalize_phone};
use crate::types::NewAccount;

pub const MAX_NAME_LEN: usize = 255;

/// Validate a create payload, reporting every problem at once.
pub fn validate_new_account(payload: &NewAccount) -> Result<(), StewardError> {
    let mut problems = Vec::new();

    match non_blank(Some(payload.name.as_str())) {
        None => problems.push("name must not be blank".to_string()),
        Some(name) => {
            if let Some(p) = name_problem(name) {
                problems.push(p);
            }
        }
    }

    if let Some(website) = non_blank(payload.website.as_deref()) {
        if let Some(p) = url_problem(website) {
            problems.push(p);
        }
    }

    if let Some(phone) = non_blank(payload.phone.as_deref()) {
        if let Some(p) = phone_problem(phone) {
            problems.push(p);
        }
    }

    if let Some(email) = non_blank(payload.email.as_deref()) {
        if let Some(p) = email_problem(email) {
            problems.push(p);
        }
    }

    if let Some(revenue) = payload.annual_revenue {
        if !(revenue >= 0.0) {
            problems.push("annualRevenue must be a non-negative number".to_string());
        }
    }

    if let Some(count) = payload.employee_count {
        if count < 0 {
            problems.push("employeeCount must be non-negative".to_string());
        }
    }

    problems.extend(tags_problems(&payload.tags));

    if let Some(custom) = non_blank(payload.custom_fields.as_deref()) {
        if let Some(p) = custom_fields_problem(custom) {
            problems.push(p);
        }
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(StewardError::ValidationFailed(problems))
    }
}

pub fn name_problem(name: &str) -> Option<String> {
    if name.chars().count() > MAX_NAME_LEN {
        return Some(format!("name must be at most {MAX_NAME_LEN} characters"));
    }
    None
}

pub fn url_problem(value: &str) -> Option<String> {
    let re = Regex::new(r"^(https?://)?[A-Za-z0-9][A-Za-z0-9.-]*\.[A-Za-z]{2,}(/\S*)?$").unwrap();
    if re.is_match(value) {
        None
    } else {
        Some(format!("website is not a valid URL: {value}"))
    }
}

pub fn email_problem(value: &str) -> Option<String> {
    let re = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    if re.is_match(value) {
        None
    } else {
        Some(format!("email is not a valid address: {value}"))
    }
}

/// Phones are free-form on input but must carry 7-15 digits once
/// formatting is stripped.
pub fn phone_problem(value: &str) -> Option<String> {
    let digits = normalize_phone(value);
    if digits.len() < 7 || digits.len() > 15 {
        return Some("phone must contain 7-15 digits".to_string());
    }
    None
}

/// Tags must be non-blank and free of exact duplicates (order is preserved
/// elsewhere, so duplicates cannot be silently collapsed).
pub fn tags_problems(tags: &[String]) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = HashSet::new();
    let mut any_blank = false;
    for tag in tags {
        if non_blank(Some(tag)).is_none() {
            any_blank = true;
        } else if !seen.insert(tag.clone()) {
            problems.push(format!("duplicate tag: {tag}"));
        }
    }
    if any_blank {
        problems.push("tags must not contain blank entries".to_string());
    }
    problems
}

pub fn custom_fields_problem(value: &str) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(value) {
        Ok(serde_json::Value::Object(_)) => None,
        Ok(_) => Some("customFields must be a JSON object".to_string()),
        Err(_) => Some("customFields is not valid JSON".to_string()),
    }
}
