//! Markup stripping for free-text values that are echoed back to people.

use once_cell::sync::Lazy;
use regex::Regex;

static JAVASCRIPT_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)javascript:").expect("scheme pattern"));

static EVENT_HANDLER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)on\w+=").expect("handler pattern"));

fn strip_once(input: &str) -> String {
    let without_brackets: String = input.chars().filter(|c| !matches!(c, '<' | '>')).collect();
    let without_scheme = JAVASCRIPT_SCHEME.replace_all(&without_brackets, "");
    EVENT_HANDLER.replace_all(&without_scheme, "").into_owned()
}

/// Remove angle brackets, `javascript:` and `on<name>=` sequences, then trim.
///
/// Repeats until the output is stable, so removals cannot splice a new
/// forbidden sequence together (`jav<ascript:` stays gone).
pub fn sanitize_input(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = strip_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}
