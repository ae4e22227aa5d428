//! Records held by the repository.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::validation::{CreateEvent, RequestForm, Role, RsvpForm, UpdateEvent};

/// A meetup, published or draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub event_date: Option<String>,
    pub capacity: Option<u32>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for a new event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewEvent {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub event_date: Option<String>,
    pub capacity: Option<u32>,
    pub is_published: bool,
}

impl From<CreateEvent> for NewEvent {
    /// Events created with subscriber notification are published immediately.
    fn from(form: CreateEvent) -> Self {
        Self {
            slug: form.slug,
            name: form.name,
            description: form.description,
            city: form.city,
            venue: form.venue,
            event_date: form.date,
            capacity: form.capacity,
            is_published: form.notify_subscribers,
        }
    }
}

/// Partial update; `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub id: Uuid,
    pub slug: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub city: Option<String>,
    pub venue: Option<String>,
    pub event_date: Option<String>,
    pub capacity: Option<u32>,
}

impl From<UpdateEvent> for EventUpdate {
    fn from(form: UpdateEvent) -> Self {
        Self {
            id: form.id,
            slug: form.slug,
            name: form.name,
            description: form.description,
            city: form.city,
            venue: form.venue,
            event_date: form.date,
            capacity: form.capacity,
        }
    }
}

impl EventUpdate {
    pub(crate) fn apply(self, event: &mut Event) {
        if let Some(slug) = self.slug {
            event.slug = slug;
        }
        if let Some(name) = self.name {
            event.name = name;
        }
        if self.description.is_some() {
            event.description = self.description;
        }
        if self.city.is_some() {
            event.city = self.city;
        }
        if self.venue.is_some() {
            event.venue = self.venue;
        }
        if self.event_date.is_some() {
            event.event_date = self.event_date;
        }
        if self.capacity.is_some() {
            event.capacity = self.capacity;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RsvpStatus {
    Pending,
    Approved,
    Rejected,
}

impl RsvpStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RsvpStatus::Pending => "pending",
            RsvpStatus::Approved => "approved",
            RsvpStatus::Rejected => "rejected",
        }
    }
}

/// One attendee's request to join an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rsvp {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub linkedin_url: Option<String>,
    pub message: Option<String>,
    pub status: RsvpStatus,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRsvp {
    pub event_id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub linkedin_url: Option<String>,
    pub message: Option<String>,
}

impl From<RsvpForm> for NewRsvp {
    fn from(form: RsvpForm) -> Self {
        Self {
            event_id: form.event_id,
            name: form.name,
            email: form.email,
            phone: form.phone,
            company: form.company,
            role: form.role,
            linkedin_url: form.linkedin_url,
            message: form.message,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub email: String,
    pub is_active: bool,
    pub subscribed_at: DateTime<Utc>,
}

/// Request for an event in a new city.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CityRequest {
    pub name: String,
    pub email: String,
    pub city: String,
    pub role: Role,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}

impl CityRequest {
    pub fn from_form(form: RequestForm, created_at: DateTime<Utc>) -> Self {
        Self {
            name: form.name,
            email: form.email,
            city: form.city,
            role: form.role,
            reason: form.reason,
            created_at,
        }
    }
}
