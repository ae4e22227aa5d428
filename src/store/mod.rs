//! Persistence subsystem.
//!
//! # Data Flow
//! ```text
//! handler (validated form)
//!     → models.rs (NewEvent / EventUpdate / NewRsvp / CityRequest)
//!     → EventRepository (trait object held in AppState)
//!     → memory.rs (single process) or a hosted database adapter
//! ```
//!
//! # Design Decisions
//! - Handlers only see the trait; the hosted database stays an external
//!   collaborator
//! - Uniqueness (event slug, one RSVP per event and email) is enforced by the
//!   repository and surfaces as `Conflict`
//! - Every call is wrapped in a deadline by the caller (`resilience`)

pub mod memory;
pub mod models;

use futures_util::future::BoxFuture;
use uuid::Uuid;

pub use memory::MemoryRepository;
pub use models::{
    CityRequest, Event, EventUpdate, NewEvent, NewRsvp, Rsvp, RsvpStatus, Subscriber,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0}")]
    Conflict(&'static str),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub const SLUG_CONFLICT: &str = "Event with this slug already exists.";
pub const RSVP_CONFLICT: &str = "You have already submitted an RSVP for this event.";

pub type RepoResult<'a, T> = BoxFuture<'a, Result<T, RepositoryError>>;

/// Storage for events, RSVPs, subscribers and city requests.
pub trait EventRepository: Send + Sync {
    /// All events, newest first.
    fn list_events(&self) -> RepoResult<'_, Vec<Event>>;

    /// Published events, soonest date first; undated events last.
    fn list_published_events(&self) -> RepoResult<'_, Vec<Event>>;

    fn event_by_slug<'a>(&'a self, slug: &'a str) -> RepoResult<'a, Option<Event>>;

    fn event_by_id(&self, id: Uuid) -> RepoResult<'_, Option<Event>>;

    fn create_event(&self, event: NewEvent) -> RepoResult<'_, Event>;

    fn update_event(&self, update: EventUpdate) -> RepoResult<'_, Event>;

    fn delete_event(&self, id: Uuid) -> RepoResult<'_, ()>;

    /// Mark an event published and return it.
    fn publish_event<'a>(&'a self, slug: &'a str) -> RepoResult<'a, Event>;

    /// Insert or reactivate a subscriber by email.
    fn upsert_subscriber<'a>(&'a self, email: &'a str) -> RepoResult<'a, ()>;

    fn active_subscriber_count(&self) -> RepoResult<'_, usize>;

    fn active_subscriber_emails(&self) -> RepoResult<'_, Vec<String>>;

    /// Every subscriber ever recorded, active or not.
    fn waitlist_count(&self) -> RepoResult<'_, usize>;

    fn save_city_request(&self, request: CityRequest) -> RepoResult<'_, ()>;

    fn create_rsvp(&self, rsvp: NewRsvp) -> RepoResult<'_, Rsvp>;

    /// RSVPs for one event, newest first.
    fn rsvps_for_event(&self, event_id: Uuid) -> RepoResult<'_, Vec<Rsvp>>;

    /// Change status; approval stamps `approved_at`.
    fn set_rsvp_status(&self, id: Uuid, status: RsvpStatus) -> RepoResult<'_, Rsvp>;

    /// An RSVP together with its event.
    fn rsvp_with_event(&self, id: Uuid) -> RepoResult<'_, (Rsvp, Event)>;
}
