//! In-memory repository.
//!
//! Used for single-process deployments and tests. Contents are lost on
//! restart.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::models::{CityRequest, Event, EventUpdate, NewEvent, NewRsvp, Rsvp, RsvpStatus, Subscriber};
use super::{EventRepository, RepoResult, RepositoryError, RSVP_CONFLICT, SLUG_CONFLICT};

#[derive(Debug, Default)]
struct Inner {
    // Insertion order; newest last.
    events: Vec<Event>,
    rsvps: Vec<Rsvp>,
    subscribers: Vec<Subscriber>,
    city_requests: Vec<CityRequest>,
}

#[derive(Debug, Default)]
pub struct MemoryRepository {
    inner: RwLock<Inner>,
    offline: AtomicBool,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with `Unavailable` (failure injection).
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    pub async fn city_requests(&self) -> Vec<CityRequest> {
        self.inner.read().await.city_requests.clone()
    }

    fn available(&self) -> Result<(), RepositoryError> {
        if self.offline.load(Ordering::Relaxed) {
            Err(RepositoryError::Unavailable("repository is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

impl EventRepository for MemoryRepository {
    fn list_events(&self) -> RepoResult<'_, Vec<Event>> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            Ok(inner.events.iter().rev().cloned().collect())
        }
        .boxed()
    }

    fn list_published_events(&self) -> RepoResult<'_, Vec<Event>> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            let mut events: Vec<Event> = inner
                .events
                .iter()
                .filter(|e| e.is_published)
                .cloned()
                .collect();
            events.sort_by(|a, b| match (&a.event_date, &b.event_date) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            });
            Ok(events)
        }
        .boxed()
    }

    fn event_by_slug<'a>(&'a self, slug: &'a str) -> RepoResult<'a, Option<Event>> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            Ok(inner.events.iter().find(|e| e.slug == slug).cloned())
        }
        .boxed()
    }

    fn event_by_id(&self, id: Uuid) -> RepoResult<'_, Option<Event>> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            Ok(inner.events.iter().find(|e| e.id == id).cloned())
        }
        .boxed()
    }

    fn create_event(&self, event: NewEvent) -> RepoResult<'_, Event> {
        async move {
            self.available()?;
            let mut inner = self.inner.write().await;
            if inner.events.iter().any(|e| e.slug == event.slug) {
                return Err(RepositoryError::Conflict(SLUG_CONFLICT));
            }

            let created = Event {
                id: Uuid::new_v4(),
                slug: event.slug,
                name: event.name,
                description: event.description,
                city: event.city,
                venue: event.venue,
                event_date: event.event_date,
                capacity: event.capacity,
                is_published: event.is_published,
                created_at: Utc::now(),
            };
            inner.events.push(created.clone());
            Ok(created)
        }
        .boxed()
    }

    fn update_event(&self, update: EventUpdate) -> RepoResult<'_, Event> {
        async move {
            self.available()?;
            let mut inner = self.inner.write().await;
            if let Some(slug) = &update.slug {
                if inner.events.iter().any(|e| &e.slug == slug && e.id != update.id) {
                    return Err(RepositoryError::Conflict(SLUG_CONFLICT));
                }
            }

            let event = inner
                .events
                .iter_mut()
                .find(|e| e.id == update.id)
                .ok_or(RepositoryError::NotFound("event"))?;
            update.apply(event);
            Ok(event.clone())
        }
        .boxed()
    }

    fn delete_event(&self, id: Uuid) -> RepoResult<'_, ()> {
        async move {
            self.available()?;
            let mut inner = self.inner.write().await;
            let before = inner.events.len();
            inner.events.retain(|e| e.id != id);
            if inner.events.len() == before {
                return Err(RepositoryError::NotFound("event"));
            }
            inner.rsvps.retain(|r| r.event_id != id);
            Ok(())
        }
        .boxed()
    }

    fn publish_event<'a>(&'a self, slug: &'a str) -> RepoResult<'a, Event> {
        async move {
            self.available()?;
            let mut inner = self.inner.write().await;
            let event = inner
                .events
                .iter_mut()
                .find(|e| e.slug == slug)
                .ok_or(RepositoryError::NotFound("event"))?;
            event.is_published = true;
            Ok(event.clone())
        }
        .boxed()
    }

    fn upsert_subscriber<'a>(&'a self, email: &'a str) -> RepoResult<'a, ()> {
        async move {
            self.available()?;
            let mut inner = self.inner.write().await;
            let now = Utc::now();
            match inner.subscribers.iter_mut().find(|s| s.email == email) {
                Some(existing) => {
                    existing.is_active = true;
                    existing.subscribed_at = now;
                }
                None => inner.subscribers.push(Subscriber {
                    email: email.to_string(),
                    is_active: true,
                    subscribed_at: now,
                }),
            }
            Ok(())
        }
        .boxed()
    }

    fn active_subscriber_count(&self) -> RepoResult<'_, usize> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            Ok(inner.subscribers.iter().filter(|s| s.is_active).count())
        }
        .boxed()
    }

    fn active_subscriber_emails(&self) -> RepoResult<'_, Vec<String>> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            Ok(inner
                .subscribers
                .iter()
                .filter(|s| s.is_active)
                .map(|s| s.email.clone())
                .collect())
        }
        .boxed()
    }

    fn waitlist_count(&self) -> RepoResult<'_, usize> {
        async move {
            self.available()?;
            Ok(self.inner.read().await.subscribers.len())
        }
        .boxed()
    }

    fn save_city_request(&self, request: CityRequest) -> RepoResult<'_, ()> {
        async move {
            self.available()?;
            self.inner.write().await.city_requests.push(request);
            Ok(())
        }
        .boxed()
    }

    fn create_rsvp(&self, rsvp: NewRsvp) -> RepoResult<'_, Rsvp> {
        async move {
            self.available()?;
            let mut inner = self.inner.write().await;
            if !inner.events.iter().any(|e| e.id == rsvp.event_id) {
                return Err(RepositoryError::NotFound("event"));
            }
            if inner
                .rsvps
                .iter()
                .any(|r| r.event_id == rsvp.event_id && r.email == rsvp.email)
            {
                return Err(RepositoryError::Conflict(RSVP_CONFLICT));
            }

            let created = Rsvp {
                id: Uuid::new_v4(),
                event_id: rsvp.event_id,
                name: rsvp.name,
                email: rsvp.email,
                phone: rsvp.phone,
                company: rsvp.company,
                role: rsvp.role,
                linkedin_url: rsvp.linkedin_url,
                message: rsvp.message,
                status: RsvpStatus::Pending,
                created_at: Utc::now(),
                approved_at: None,
            };
            inner.rsvps.push(created.clone());
            Ok(created)
        }
        .boxed()
    }

    fn rsvps_for_event(&self, event_id: Uuid) -> RepoResult<'_, Vec<Rsvp>> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            Ok(inner
                .rsvps
                .iter()
                .rev()
                .filter(|r| r.event_id == event_id)
                .cloned()
                .collect())
        }
        .boxed()
    }

    fn set_rsvp_status(&self, id: Uuid, status: RsvpStatus) -> RepoResult<'_, Rsvp> {
        async move {
            self.available()?;
            let mut inner = self.inner.write().await;
            let rsvp = inner
                .rsvps
                .iter_mut()
                .find(|r| r.id == id)
                .ok_or(RepositoryError::NotFound("RSVP"))?;
            rsvp.status = status;
            if status == RsvpStatus::Approved {
                rsvp.approved_at = Some(Utc::now());
            }
            Ok(rsvp.clone())
        }
        .boxed()
    }

    fn rsvp_with_event(&self, id: Uuid) -> RepoResult<'_, (Rsvp, Event)> {
        async move {
            self.available()?;
            let inner = self.inner.read().await;
            let rsvp = inner
                .rsvps
                .iter()
                .find(|r| r.id == id)
                .ok_or(RepositoryError::NotFound("RSVP"))?;
            let event = inner
                .events
                .iter()
                .find(|e| e.id == rsvp.event_id)
                .ok_or(RepositoryError::NotFound("event"))?;
            Ok((rsvp.clone(), event.clone()))
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_event(slug: &str) -> NewEvent {
        NewEvent {
            slug: slug.to_string(),
            name: format!("Event {slug}"),
            ..Default::default()
        }
    }

    fn new_rsvp(event_id: Uuid, email: &str) -> NewRsvp {
        NewRsvp {
            event_id,
            name: "Ada".to_string(),
            email: email.to_string(),
            phone: None,
            company: None,
            role: None,
            linkedin_url: None,
            message: None,
        }
    }

    #[tokio::test]
    async fn test_slug_is_unique() {
        let repo = MemoryRepository::new();
        repo.create_event(new_event("pune-meetup")).await.unwrap();

        let err = repo.create_event(new_event("pune-meetup")).await.unwrap_err();
        assert_eq!(err, RepositoryError::Conflict(SLUG_CONFLICT));
    }

    #[tokio::test]
    async fn test_update_rejects_taken_slug() {
        let repo = MemoryRepository::new();
        repo.create_event(new_event("first")).await.unwrap();
        let second = repo.create_event(new_event("second")).await.unwrap();

        let clash = EventUpdate {
            id: second.id,
            slug: Some("first".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            repo.update_event(clash).await,
            Err(RepositoryError::Conflict(_))
        ));

        let rename = EventUpdate {
            id: second.id,
            name: Some("Renamed".to_string()),
            city: Some("Pune".to_string()),
            ..Default::default()
        };
        let updated = repo.update_event(rename).await.unwrap();
        assert_eq!(updated.name, "Renamed");
        assert_eq!(updated.slug, "second");
        assert_eq!(updated.city.as_deref(), Some("Pune"));
    }

    #[tokio::test]
    async fn test_published_listing_orders_by_date() {
        let repo = MemoryRepository::new();
        for (slug, date, published) in [
            ("late", Some("2026-12-01"), true),
            ("draft", Some("2026-01-01"), false),
            ("undated", None, true),
            ("early", Some("2026-06-01"), true),
        ] {
            repo.create_event(NewEvent {
                event_date: date.map(str::to_string),
                is_published: published,
                ..new_event(slug)
            })
            .await
            .unwrap();
        }

        let slugs: Vec<_> = repo
            .list_published_events()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.slug)
            .collect();
        assert_eq!(slugs, ["early", "late", "undated"]);

        let all = repo.list_events().await.unwrap();
        assert_eq!(all[0].slug, "early");
        assert_eq!(all.len(), 4);
    }

    #[tokio::test]
    async fn test_one_rsvp_per_event_and_email() {
        let repo = MemoryRepository::new();
        let event = repo.create_event(new_event("meetup")).await.unwrap();

        let rsvp = repo.create_rsvp(new_rsvp(event.id, "a@b.co")).await.unwrap();
        assert_eq!(rsvp.status, RsvpStatus::Pending);
        assert_eq!(
            repo.create_rsvp(new_rsvp(event.id, "a@b.co")).await,
            Err(RepositoryError::Conflict(RSVP_CONFLICT))
        );
        assert_eq!(
            repo.create_rsvp(new_rsvp(Uuid::new_v4(), "a@b.co")).await,
            Err(RepositoryError::NotFound("event"))
        );
    }

    #[tokio::test]
    async fn test_approval_stamps_time() {
        let repo = MemoryRepository::new();
        let event = repo.create_event(new_event("meetup")).await.unwrap();
        let rsvp = repo.create_rsvp(new_rsvp(event.id, "a@b.co")).await.unwrap();

        let approved = repo
            .set_rsvp_status(rsvp.id, RsvpStatus::Approved)
            .await
            .unwrap();
        assert!(approved.approved_at.is_some());

        let (joined, joined_event) = repo.rsvp_with_event(rsvp.id).await.unwrap();
        assert_eq!(joined.status, RsvpStatus::Approved);
        assert_eq!(joined_event.id, event.id);
    }

    #[tokio::test]
    async fn test_delete_cascades_rsvps() {
        let repo = MemoryRepository::new();
        let event = repo.create_event(new_event("meetup")).await.unwrap();
        let rsvp = repo.create_rsvp(new_rsvp(event.id, "a@b.co")).await.unwrap();

        repo.delete_event(event.id).await.unwrap();
        assert!(repo.rsvps_for_event(event.id).await.unwrap().is_empty());
        assert!(repo.rsvp_with_event(rsvp.id).await.is_err());
        assert_eq!(
            repo.delete_event(event.id).await,
            Err(RepositoryError::NotFound("event"))
        );
    }

    #[tokio::test]
    async fn test_subscriber_upsert() {
        let repo = MemoryRepository::new();
        repo.upsert_subscriber("a@b.co").await.unwrap();
        repo.upsert_subscriber("a@b.co").await.unwrap();
        repo.upsert_subscriber("c@d.co").await.unwrap();

        assert_eq!(repo.active_subscriber_count().await.unwrap(), 2);
        assert_eq!(repo.waitlist_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_offline_fails_every_call() {
        let repo = MemoryRepository::new();
        repo.set_offline(true);
        assert!(matches!(
            repo.waitlist_count().await,
            Err(RepositoryError::Unavailable(_))
        ));
        repo.set_offline(false);
        assert_eq!(repo.waitlist_count().await.unwrap(), 0);
    }
}
