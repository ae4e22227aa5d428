//! Form schemas.
//!
//! A form reads its fields out of an untyped JSON body, applies the field
//! schemas, and collects every message. Unknown keys are ignored.

use serde::Serialize;
use serde_json::{Map, Value};
use uuid::Uuid;

use super::fields::{self, FieldResult, Role};
use super::sanitize::sanitize_input;

/// Longest accepted value for free-text RSVP extras and venues.
pub const EXTRA_MAX: usize = 200;

/// Outcome of [`validate_form`].
#[derive(Debug, Clone, PartialEq)]
pub enum FormResult<F> {
    Valid(F),
    Invalid(Vec<String>),
}

impl<F> FormResult<F> {
    pub fn into_result(self) -> Result<F, Vec<String>> {
        match self {
            FormResult::Valid(form) => Ok(form),
            FormResult::Invalid(errors) => Err(errors),
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, FormResult::Valid(_))
    }
}

/// A typed form that can be parsed from an untrusted JSON value.
pub trait FormSchema: Sized {
    fn parse(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Self>;
}

/// Validate an untyped body against a form schema.
///
/// Never panics: a non-object body, missing keys and mistyped values all
/// become messages.
pub fn validate_form<F: FormSchema>(input: &Value) -> FormResult<F> {
    let Some(object) = input.as_object() else {
        return FormResult::Invalid(vec!["Expected a JSON object".to_string()]);
    };

    let mut errors = Vec::new();
    match F::parse(object, &mut errors) {
        Some(form) if errors.is_empty() => FormResult::Valid(form),
        _ => {
            if errors.is_empty() {
                errors.push("Invalid input".to_string());
            }
            FormResult::Invalid(errors)
        }
    }
}

/// Look up a string field. `None` when absent, null, or mistyped.
fn text<'a>(
    input: &'a Map<String, Value>,
    key: &str,
    required: bool,
    errors: &mut Vec<String>,
) -> Option<&'a str> {
    match input.get(key) {
        Some(Value::String(s)) => Some(s.as_str()),
        None | Some(Value::Null) => {
            if required {
                errors.push(format!("{key} is required"));
            }
            None
        }
        Some(_) => {
            errors.push(format!("{key} must be a string"));
            None
        }
    }
}

fn apply<T>(result: FieldResult<T>, errors: &mut Vec<String>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(mut messages) => {
            errors.append(&mut messages);
            None
        }
    }
}

fn required<T>(
    input: &Map<String, Value>,
    key: &str,
    schema: fn(&str) -> FieldResult<T>,
    errors: &mut Vec<String>,
) -> Option<T> {
    text(input, key, true, errors).and_then(|raw| apply(schema(raw), errors))
}

/// Absent, null and blank values are `Ok(None)`.
fn optional<T>(
    input: &Map<String, Value>,
    key: &str,
    schema: fn(&str) -> FieldResult<T>,
    errors: &mut Vec<String>,
) -> Option<Option<T>> {
    let before = errors.len();
    match text(input, key, false, errors) {
        Some(raw) if raw.trim().is_empty() => Some(None),
        Some(raw) => apply(schema(raw), errors).map(Some),
        None if errors.len() > before => None,
        None => Some(None),
    }
}

fn free_text(raw: &str) -> FieldResult<String> {
    let value = sanitize_input(raw);
    if value.chars().count() > EXTRA_MAX {
        return Err(vec![format!("Value must be less than {EXTRA_MAX} characters")]);
    }
    Ok(value)
}

fn uuid_field(input: &Map<String, Value>, key: &str, label: &str, errors: &mut Vec<String>) -> Option<Uuid> {
    match input.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => match Uuid::parse_str(s.trim()) {
            Ok(id) => Some(id),
            Err(_) => {
                errors.push(format!("Invalid {label}"));
                None
            }
        },
        _ => {
            errors.push(format!("{label} is required"));
            None
        }
    }
}

fn capacity(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Option<u32>> {
    match input.get("capacity") {
        None | Some(Value::Null) => Some(None),
        Some(value) => match value.as_u64().and_then(|n| u32::try_from(n).ok()) {
            Some(n) if n > 0 => Some(Some(n)),
            _ => {
                errors.push("Capacity must be a positive whole number".to_string());
                None
            }
        },
    }
}

/// `eventDate` is accepted as an alias of `date`.
fn date_field(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Option<String>> {
    let key = if input.contains_key("date") { "date" } else { "eventDate" };
    optional(input, key, fields::date, errors).map(Option::flatten)
}

/// Subscription for event announcements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotifyForm {
    pub email: String,
}

impl FormSchema for NotifyForm {
    fn parse(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Self> {
        let email = required(input, "email", fields::email, errors)?;
        Some(Self { email })
    }
}

/// Request to bring an event to a new city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestForm {
    pub name: String,
    pub email: String,
    pub city: String,
    pub role: Role,
    pub reason: String,
}

impl FormSchema for RequestForm {
    fn parse(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Self> {
        let name = required(input, "name", fields::name, errors);
        let email = required(input, "email", fields::email, errors);
        let city = required(input, "city", fields::city, errors);
        let role = required(input, "role", fields::role, errors);
        let reason = required(input, "reason", fields::reason, errors);

        Some(Self {
            name: name?,
            email: email?,
            city: city?,
            role: role?,
            reason: reason?,
        })
    }
}

/// Admin login body. Also used for re-authentication.
#[derive(Clone, PartialEq, Eq)]
pub struct AdminLogin {
    pub password: String,
}

impl std::fmt::Debug for AdminLogin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminLogin").field("password", &"[REDACTED]").finish()
    }
}

impl FormSchema for AdminLogin {
    fn parse(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Self> {
        let password = match input.get("password") {
            Some(Value::String(s)) => apply(fields::password(s), errors),
            _ => {
                errors.push("Password is required".to_string());
                None
            }
        }?;
        Some(Self { password })
    }
}

/// New event created from the admin dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateEvent {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub date: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub capacity: Option<u32>,
    pub notify_subscribers: bool,
}

impl FormSchema for CreateEvent {
    fn parse(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Self> {
        let slug = required(input, "slug", fields::event_slug, errors);
        let name = required(input, "name", fields::event_name, errors);
        let description = optional(input, "description", fields::description, errors);
        let date = date_field(input, errors);
        let city = optional(input, "city", fields::city, errors);
        let venue = optional(input, "venue", free_text, errors);
        let capacity = capacity(input, errors);
        let notify_subscribers = input
            .get("notifySubscribers")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Some(Self {
            slug: slug?,
            name: name?,
            description: description?,
            date: date?,
            city: city?,
            venue: venue?,
            capacity: capacity?,
            notify_subscribers,
        })
    }
}

/// Partial update of an existing event. Absent fields are left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateEvent {
    pub id: Uuid,
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub capacity: Option<u32>,
}

impl FormSchema for UpdateEvent {
    fn parse(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Self> {
        let id = uuid_field(input, "id", "Event ID", errors);
        let slug = optional(input, "slug", fields::event_slug, errors);
        let name = optional(input, "name", fields::event_name, errors);
        let description = optional(input, "description", fields::description, errors);
        let date = date_field(input, errors);
        let city = optional(input, "city", fields::city, errors);
        let venue = optional(input, "venue", free_text, errors);
        let capacity = capacity(input, errors);

        Some(Self {
            id: id?,
            slug: slug?,
            name: name?,
            description: description?,
            date: date?,
            city: city?,
            venue: venue?,
            capacity: capacity?,
        })
    }
}

/// Public RSVP submission.
///
/// Reports a single message, matching what the RSVP form displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsvpForm {
    pub event_id: Uuid,
    pub event_slug: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub linkedin_url: Option<String>,
    pub message: Option<String>,
}

fn non_blank<'a>(input: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn extra(input: &Map<String, Value>, key: &str) -> Option<String> {
    non_blank(input, key)
        .map(|raw| sanitize_input(raw).chars().take(EXTRA_MAX).collect::<String>())
        .filter(|s| !s.is_empty())
}

impl FormSchema for RsvpForm {
    fn parse(input: &Map<String, Value>, errors: &mut Vec<String>) -> Option<Self> {
        let (Some(event_id), Some(name), Some(email)) = (
            non_blank(input, "eventId"),
            non_blank(input, "name"),
            non_blank(input, "email"),
        ) else {
            errors.push("Event ID, name, and email are required".to_string());
            return None;
        };

        let email = email.to_lowercase();
        let at = email.find('@');
        let shape_ok = !email.chars().any(char::is_whitespace)
            && email.matches('@').count() == 1
            && at.is_some_and(|i| i > 0 && email[i + 1..].contains('.'))
            && !email.ends_with('.')
            && !email[at.map_or(0, |i| i + 1)..].starts_with('.');
        if !shape_ok {
            errors.push("Invalid email format".to_string());
            return None;
        }

        let Ok(event_id) = Uuid::parse_str(event_id) else {
            errors.push("Invalid event ID".to_string());
            return None;
        };

        let name = sanitize_input(name);
        if name.is_empty() || name.chars().count() > fields::TEXT_MAX {
            errors.push(format!("Name must be between 1 and {} characters", fields::TEXT_MAX));
            return None;
        }

        Some(Self {
            event_id,
            event_slug: non_blank(input, "eventSlug").map(str::to_string),
            name,
            email,
            phone: extra(input, "phone"),
            company: extra(input, "company"),
            role: extra(input, "role"),
            linkedin_url: extra(input, "linkedinUrl"),
            message: extra(input, "message"),
        })
    }
}
