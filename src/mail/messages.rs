//! Message builders.
//!
//! Bodies are deliberately plain: a heading, escaped paragraphs or a
//! detail table, and one link.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use super::MailMessage;
use crate::store::{Event, Rsvp};

/// Which public form produced a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    Notify,
    Request,
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            other => out.push(other),
        }
    }
    out
}

pub fn event_url(site_url: &str, slug: &str) -> String {
    format!("{}/events/{}", site_url.trim_end_matches('/'), slug)
}

/// `Saturday, March 14, 2026`, or `TBA` when absent or unparseable.
pub fn format_event_date(date: Option<&str>) -> String {
    let Some(raw) = date.map(str::trim).filter(|d| !d.is_empty()) else {
        return "TBA".to_string();
    };

    let day = DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok())
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
                .ok()
                .map(|dt| dt.date())
        });

    match day {
        Some(day) => day.format("%A, %B %-d, %Y").to_string(),
        None => raw.to_string(),
    }
}

fn layout(title: &str, body: &str, link: (&str, &str)) -> String {
    let (label, href) = link;
    format!(
        "<html><body>\
         <p><strong>DEV GATHERING</strong></p>\
         <h2>{}</h2>\
         {body}\
         <p><a href=\"{}\">{}</a></p>\
         </body></html>",
        escape_html(title),
        escape_html(href),
        escape_html(label),
    )
}

fn detail_table(rows: &[(&str, &str)]) -> String {
    let cells: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                "<tr><td>{}</td><td>{}</td></tr>",
                escape_html(label),
                escape_html(value)
            )
        })
        .collect();
    format!("<table>{cells}</table>")
}

/// Tell the organizer about a form submission.
pub fn admin_notification(
    kind: Submission,
    to: &str,
    fields: &[(&str, &str)],
    site_url: &str,
) -> MailMessage {
    let (subject, title) = match kind {
        Submission::Notify => ("New Email Subscription - Dev Gathering", "New Subscriber"),
        Submission::Request => ("New City Request - Dev Gathering", "City Request"),
    };
    let admin = format!("{}/admin", site_url.trim_end_matches('/'));

    MailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        html: layout(title, &detail_table(fields), ("Go to Admin Panel", admin.as_str())),
    }
}

/// Confirm a submission to the person who made it.
pub fn acknowledgment(kind: Submission, to: &str, site_url: &str) -> MailMessage {
    let (subject, title, body) = match kind {
        Submission::Notify => (
            "Welcome to Dev Gathering",
            "You're on the list.",
            "We'll notify you when the next event is announced in your area.",
        ),
        Submission::Request => (
            "We received your request",
            "We hear you.",
            "We'll review your request and get back to you soon.",
        ),
    };

    MailMessage {
        to: to.to_string(),
        subject: subject.to_string(),
        html: layout(
            title,
            &format!("<p>{}</p>", escape_html(body)),
            ("Visit Website", site_url),
        ),
    }
}

/// Announce a published event to one subscriber.
pub fn event_announcement(to: &str, event: &Event, site_url: &str) -> MailMessage {
    let city = event.city.as_deref().unwrap_or("TBA");
    let date = format_event_date(event.event_date.as_deref());
    let body = detail_table(&[
        ("Event", event.name.as_str()),
        ("City", city),
        ("Date", date.as_str()),
    ]);

    MailMessage {
        to: to.to_string(),
        subject: format!("New Event in {city}: {}", event.name),
        html: layout(
            "New Event Announced",
            &body,
            ("RSVP Now", event_url(site_url, &event.slug).as_str()),
        ),
    }
}

/// Invitation for an approved attendee.
pub fn rsvp_invitation(rsvp: &Rsvp, event: &Event, site_url: &str) -> MailMessage {
    let date = format_event_date(event.event_date.as_deref());
    let body = format!(
        "<p>Hey <strong>{}</strong>,</p>\
         <p>We're excited to have you join us. Here are the event details:</p>\
         {}",
        escape_html(&rsvp.name),
        detail_table(&[
            ("Event", event.name.as_str()),
            ("Date", date.as_str()),
            ("City", event.city.as_deref().unwrap_or("TBA")),
            ("Venue", event.venue.as_deref().unwrap_or("TBA")),
        ])
    );

    MailMessage {
        to: rsvp.email.clone(),
        subject: format!("You're confirmed for {}!", event.name),
        html: layout(
            "You're In!",
            &body,
            ("View Event Details", event_url(site_url, &event.slug).as_str()),
        ),
    }
}
