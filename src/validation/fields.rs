//! Field schemas.
//!
//! Each schema takes the raw string, trims it, and returns either the
//! normalized value or every rule it broke as a human-readable message.
//! Lengths are counted in characters, not bytes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Result of a single field schema.
pub type FieldResult<T> = Result<T, Vec<String>>;

static SAFE_TEXT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z0-9\s.,!?'-]+$").expect("safe text pattern"));

static SLUG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("slug pattern"));

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9_'+\-.]*[a-z0-9_+\-]@(?:[a-z0-9][a-z0-9\-]*\.)+[a-z]{2,}$")
        .expect("email pattern")
});

static SCRIPT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)script").expect("script pattern"));

pub const EMAIL_MAX: usize = 254;
pub const TEXT_MIN: usize = 2;
pub const TEXT_MAX: usize = 100;
pub const REASON_MIN: usize = 10;
pub const REASON_MAX: usize = 1000;
pub const SLUG_MIN: usize = 3;
pub const SLUG_MAX: usize = 50;
pub const PASSWORD_MAX: usize = 128;
pub const EVENT_NAME_MIN: usize = 3;
pub const DESCRIPTION_MAX: usize = 500;

fn finish<T>(value: T, errors: Vec<String>) -> FieldResult<T> {
    if errors.is_empty() {
        Ok(value)
    } else {
        Err(errors)
    }
}

fn length_errors(value: &str, min: usize, max: usize, label: &str, errors: &mut Vec<String>) {
    let len = value.chars().count();
    if len < min {
        errors.push(format!("{label} must be at least {min} characters"));
    }
    if len > max {
        errors.push(format!("{label} must be less than {max} characters"));
    }
}

/// Email: trimmed, lowercased, shape-checked and at most 254 characters.
pub fn email(raw: &str) -> FieldResult<String> {
    let value = raw.trim().to_lowercase();
    let mut errors = Vec::new();

    let shape_ok = !value.starts_with('.') && !value.contains("..") && EMAIL.is_match(&value);
    if !shape_ok {
        errors.push("Please enter a valid email address".to_string());
    }
    if value.chars().count() > EMAIL_MAX {
        errors.push(format!("Email must be less than {EMAIL_MAX} characters"));
    }

    finish(value, errors)
}

fn safe_text(raw: &str, label: &str) -> FieldResult<String> {
    let value = raw.trim().to_string();
    let mut errors = Vec::new();

    length_errors(&value, TEXT_MIN, TEXT_MAX, label, &mut errors);
    if !SAFE_TEXT.is_match(&value) {
        errors.push(format!("{label} contains invalid characters"));
    }

    finish(value, errors)
}

/// Person name: 2 to 100 characters from the safe-text allow-list.
pub fn name(raw: &str) -> FieldResult<String> {
    safe_text(raw, "Name")
}

/// City: same rules as [`name`].
pub fn city(raw: &str) -> FieldResult<String> {
    safe_text(raw, "City")
}

/// Free-text reason: 10 to 1000 characters, no angle brackets, no `script`.
pub fn reason(raw: &str) -> FieldResult<String> {
    let value = raw.trim().to_string();
    let mut errors = Vec::new();

    length_errors(&value, REASON_MIN, REASON_MAX, "Reason", &mut errors);
    if value.contains(['<', '>']) {
        errors.push("Reason cannot contain HTML tags".to_string());
    }
    if SCRIPT.is_match(&value) {
        errors.push("Reason contains invalid content".to_string());
    }

    finish(value, errors)
}

/// Event slug: 3 to 50 characters, lowercase alphanumeric runs joined by single hyphens.
pub fn event_slug(raw: &str) -> FieldResult<String> {
    let value = raw.trim().to_string();
    let mut errors = Vec::new();

    length_errors(&value, SLUG_MIN, SLUG_MAX, "Slug", &mut errors);
    if !SLUG.is_match(&value) {
        errors.push("Slug must be lowercase letters, numbers, and hyphens only".to_string());
    }

    finish(value, errors)
}

/// Attendee role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Developer,
    Designer,
    Manager,
    Student,
    Other,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Developer,
        Role::Designer,
        Role::Manager,
        Role::Student,
        Role::Other,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Developer => "developer",
            Role::Designer => "designer",
            Role::Manager => "manager",
            Role::Student => "student",
            Role::Other => "other",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| {
                format!("Role must be one of: developer, designer, manager, student, other (received '{s}')")
            })
    }
}

/// Role: one of the fixed enumeration, matched exactly.
pub fn role(raw: &str) -> FieldResult<Role> {
    raw.trim().parse().map_err(|e| vec![e])
}

/// Admin password: 1 to 128 characters, not trimmed.
pub fn password(raw: &str) -> FieldResult<String> {
    let len = raw.chars().count();
    if len == 0 {
        return Err(vec!["Password is required".to_string()]);
    }
    if len > PASSWORD_MAX {
        return Err(vec!["Password too long".to_string()]);
    }
    Ok(raw.to_string())
}

/// Event display name: 3 to 100 characters.
pub fn event_name(raw: &str) -> FieldResult<String> {
    let value = raw.trim().to_string();
    let mut errors = Vec::new();
    length_errors(&value, EVENT_NAME_MIN, TEXT_MAX, "Event name", &mut errors);
    finish(value, errors)
}

/// Event description: at most 500 characters.
pub fn description(raw: &str) -> FieldResult<String> {
    let value = raw.trim().to_string();
    if value.chars().count() > DESCRIPTION_MAX {
        return Err(vec![format!(
            "Description must be less than {DESCRIPTION_MAX} characters"
        )]);
    }
    Ok(value)
}

/// Event date: RFC 3339, `YYYY-MM-DD`, or a `datetime-local` value.
///
/// An empty string means "no date" and yields `None`.
pub fn date(raw: &str) -> FieldResult<Option<String>> {
    let value = raw.trim();
    if value.is_empty() {
        return Ok(None);
    }

    let parses = DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDate::parse_from_str(value, "%Y-%m-%d").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M").is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S").is_ok();

    if parses {
        Ok(Some(value.to_string()))
    } else {
        Err(vec!["Invalid date format".to_string()])
    }
}
