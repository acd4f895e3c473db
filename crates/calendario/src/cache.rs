//! In-memory working set of events and its link to the remote store.
//!
//! While `Connected`, every mutation goes to the store first and the cache
//! is refreshed from a full reload. Any store failure switches the cache to
//! `LocalOnly`: from then on mutations only touch memory, until an explicit
//! reload reaches the store again.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::store::{RemoteStore, StoreError};
use crate::types::{Category, Event, EventDraft, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Connected,
    LocalOnly,
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("event '{0}' not found")]
    NotFound(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("export requires a connection to the event store")]
    ExportUnavailable,
}

/// Where a successful mutation was applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Remote,
    Local,
}

pub struct EventCache {
    events: Vec<Event>,
    mode: StoreMode,
    store: Option<RemoteStore>,
    clock: Arc<dyn Clock>,
}

impl EventCache {
    /// An empty cache. Call [`EventCache::load`] to populate it.
    pub fn new(store: Option<RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            events: Vec::new(),
            mode: StoreMode::LocalOnly,
            store,
            clock,
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn mode(&self) -> StoreMode {
        self.mode
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    pub fn get(&self, id: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.id == id)
    }

    /// Replace the cache with the store's list. Without a store, or when the
    /// store cannot be read, fall back to the built-in dataset.
    pub async fn load(&mut self) -> StoreMode {
        let Some(store) = &self.store else {
            debug!("No event store configured, using local data");
            self.use_local_dataset();
            return self.mode;
        };

        match store.list().await {
            Ok(events) => {
                info!(count = events.len(), "Loaded events from store");
                self.events = events;
                self.mode = StoreMode::Connected;
            }
            Err(e) => {
                warn!(error = %e, "Event store unavailable, falling back to local data");
                self.use_local_dataset();
            }
        }
        self.mode
    }

    fn use_local_dataset(&mut self) {
        self.events = local_dataset();
        self.mode = StoreMode::LocalOnly;
    }

    /// Create an event, or replace the one with id `editing`
    pub async fn save(
        &mut self,
        draft: &EventDraft,
        editing: Option<&str>,
    ) -> Result<Applied, CacheError> {
        let draft = draft.validate()?;

        if let Some(id) = editing {
            if self.get(id).is_none() {
                return Err(CacheError::NotFound(id.to_string()));
            }
        }

        if self.mode == StoreMode::Connected {
            if let Some(store) = &self.store {
                if let Err(e) = store.add(&draft, editing).await {
                    return Err(self.store_failed(e));
                }
                self.load().await;
                return Ok(Applied::Remote);
            }
        }

        let created_at = self.clock.today().format("%Y-%m-%d").to_string();
        match editing {
            Some(id) => {
                let event = draft.into_event(id.to_string(), created_at);
                if let Some(slot) = self.events.iter_mut().find(|e| e.id == id) {
                    *slot = event;
                }
                info!(id = %id, "Updated event locally");
            }
            None => {
                let id = self.next_local_id();
                info!(id = %id, "Created event locally");
                self.events.push(draft.into_event(id, created_at));
            }
        }
        Ok(Applied::Local)
    }

    pub async fn delete(&mut self, id: &str) -> Result<Applied, CacheError> {
        if self.mode == StoreMode::Connected {
            if let Some(store) = &self.store {
                if let Err(e) = store.delete(id).await {
                    return Err(self.store_failed(e));
                }
                self.load().await;
                return Ok(Applied::Remote);
            }
        }

        let before = self.events.len();
        self.events.retain(|e| e.id != id);
        if self.events.len() == before {
            return Err(CacheError::NotFound(id.to_string()));
        }
        info!(id = %id, "Deleted event locally");
        Ok(Applied::Local)
    }

    /// Spreadsheet bytes from the store; not available offline
    pub async fn export(&mut self) -> Result<Vec<u8>, CacheError> {
        let store = match (&self.store, self.mode) {
            (Some(store), StoreMode::Connected) => store,
            _ => return Err(CacheError::ExportUnavailable),
        };
        match store.export().await {
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(self.store_failed(e)),
        }
    }

    fn store_failed(&mut self, error: StoreError) -> CacheError {
        warn!(error = %error, "Event store request failed, switching to local mode");
        self.mode = StoreMode::LocalOnly;
        CacheError::Store(error)
    }

    /// Millisecond timestamp from the clock, bumped until unused
    fn next_local_id(&self) -> String {
        let mut candidate = self.clock.now().timestamp_millis();
        while self.get(&candidate.to_string()).is_some() {
            candidate += 1;
        }
        candidate.to_string()
    }
}

/// Events shown when the store cannot be reached
pub fn local_dataset() -> Vec<Event> {
    let event = |id: &str, date: &str, title: &str, category, notes: &str, created: &str| Event {
        created_at: Some(created.to_string()),
        ..Event::new(
            id.to_string(),
            date.to_string(),
            title.to_string(),
            category,
            notes.to_string(),
        )
    };

    vec![
        event(
            "1",
            "2025-01-15",
            "Reunión de Docentes",
            Category::Docentes,
            "Reunión mensual del equipo docente",
            "2025-01-10",
        ),
        event(
            "2",
            "2025-01-20",
            "Presentación Final",
            Category::Presentaciones,
            "Presentación de proyectos de fin de curso",
            "2025-01-12",
        ),
        event(
            "3",
            "2025-01-25",
            "Taller para Alumnos",
            Category::Alumnos,
            "Taller de habilidades digitales",
            "2025-01-14",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::grid::events_for_date;
    use crate::store::tests::{make_event, spawn_fake_store, FakeStore};
    use chrono::{Local, NaiveDate, TimeZone};
    use std::time::Duration;

    fn fixed_clock() -> Arc<dyn Clock> {
        Arc::new(FixedClock::new(
            Local.with_ymd_and_hms(2025, 2, 20, 9, 30, 0).unwrap(),
        ))
    }

    fn draft(date: &str, title: &str) -> EventDraft {
        EventDraft {
            date: date.to_string(),
            title: title.to_string(),
            category: Category::Otros,
            notes: String::new(),
        }
    }

    async fn connected_cache(fake: Arc<FakeStore>) -> EventCache {
        let url = spawn_fake_store(fake).await;
        let store = RemoteStore::new(url, Duration::from_secs(5)).unwrap();
        let mut cache = EventCache::new(Some(store), fixed_clock());
        assert_eq!(cache.load().await, StoreMode::Connected);
        cache
    }

    async fn offline_cache() -> EventCache {
        let mut cache = EventCache::new(None, fixed_clock());
        cache.load().await;
        cache
    }

    // ========== load tests ==========

    #[tokio::test]
    async fn test_load_without_store_uses_local_dataset() {
        let cache = offline_cache().await;
        assert_eq!(cache.mode(), StoreMode::LocalOnly);
        assert_eq!(cache.events(), local_dataset().as_slice());
    }

    #[tokio::test]
    async fn test_load_from_store() {
        let fake = Arc::new(FakeStore::default());
        fake.events
            .lock()
            .unwrap()
            .push(make_event("a", "2025-02-01", "Remoto", Category::Alumnos));
        let cache = connected_cache(fake).await;

        assert_eq!(cache.events().len(), 1);
        assert_eq!(cache.get("a").unwrap().title, "Remoto");
    }

    #[tokio::test]
    async fn test_load_failure_falls_back_to_local() {
        let fake = Arc::new(FakeStore::default());
        *fake.fail.lock().unwrap() = true;
        let url = spawn_fake_store(fake).await;
        let store = RemoteStore::new(url, Duration::from_secs(5)).unwrap();

        let mut cache = EventCache::new(Some(store), fixed_clock());
        assert_eq!(cache.load().await, StoreMode::LocalOnly);
        assert_eq!(cache.events().len(), local_dataset().len());
    }

    #[tokio::test]
    async fn test_reload_leaves_local_mode_when_store_recovers() {
        let fake = Arc::new(FakeStore::default());
        *fake.fail.lock().unwrap() = true;
        let url = spawn_fake_store(fake.clone()).await;
        let store = RemoteStore::new(url, Duration::from_secs(5)).unwrap();
        let mut cache = EventCache::new(Some(store), fixed_clock());
        cache.load().await;

        *fake.fail.lock().unwrap() = false;
        assert_eq!(cache.mode(), StoreMode::LocalOnly);
        assert_eq!(cache.load().await, StoreMode::Connected);
        assert!(cache.events().is_empty());
    }

    // ========== local mutation tests ==========

    #[tokio::test]
    async fn test_save_local_then_events_for_date() {
        let mut cache = offline_cache().await;

        let applied = cache.save(&draft("2025-03-01", "X"), None).await.unwrap();
        assert_eq!(applied, Applied::Local);

        let date = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let found = events_for_date(cache.events(), date);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "X");
        assert_eq!(found[0].category, Category::Otros);
        assert_eq!(found[0].created_at.as_deref(), Some("2025-02-20"));
    }

    #[tokio::test]
    async fn test_save_local_ids_are_unique() {
        let mut cache = offline_cache().await;
        cache.save(&draft("2025-03-01", "A"), None).await.unwrap();
        cache.save(&draft("2025-03-01", "B"), None).await.unwrap();

        let mut ids: Vec<&str> = cache.events().iter().map(|e| e.id.as_str()).collect();
        let total = ids.len();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), total);
    }

    #[tokio::test]
    async fn test_save_local_edit_replaces_record() {
        let mut cache = offline_cache().await;
        let mut edit = draft("2025-01-16", "Reunión movida");
        edit.category = Category::Docentes;

        cache.save(&edit, Some("1")).await.unwrap();

        let event = cache.get("1").unwrap();
        assert_eq!(event.title, "Reunión movida");
        assert_eq!(event.date, "2025-01-16");
        assert_eq!(cache.events().len(), local_dataset().len());
    }

    #[tokio::test]
    async fn test_save_edit_unknown_id() {
        let mut cache = offline_cache().await;
        let err = cache.save(&draft("2025-01-16", "X"), Some("nope")).await.unwrap_err();
        assert!(matches!(err, CacheError::NotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_form() {
        let mut cache = offline_cache().await;
        let before = cache.events().to_vec();

        let err = cache.save(&draft("2025-03-01", "  "), None).await.unwrap_err();
        assert!(matches!(err, CacheError::Invalid(ValidationError::EmptyTitle)));
        let err = cache.save(&draft("", "X"), None).await.unwrap_err();
        assert!(matches!(err, CacheError::Invalid(ValidationError::MissingDate)));

        assert_eq!(cache.events(), before.as_slice());
    }

    #[tokio::test]
    async fn test_delete_local() {
        let mut cache = offline_cache().await;
        assert_eq!(cache.delete("2").await.unwrap(), Applied::Local);
        assert!(cache.get("2").is_none());
        assert!(matches!(
            cache.delete("2").await.unwrap_err(),
            CacheError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_export_unavailable_offline() {
        let mut cache = offline_cache().await;
        assert!(matches!(
            cache.export().await.unwrap_err(),
            CacheError::ExportUnavailable
        ));
    }

    // ========== connected mutation tests ==========

    #[tokio::test]
    async fn test_save_connected_reloads_from_store() {
        let fake = Arc::new(FakeStore::default());
        let mut cache = connected_cache(fake.clone()).await;

        let applied = cache.save(&draft("2025-03-01", "Remoto"), None).await.unwrap();
        assert_eq!(applied, Applied::Remote);
        assert_eq!(cache.mode(), StoreMode::Connected);
        assert_eq!(cache.events().len(), 1);
        assert_eq!(cache.events()[0].id, "srv-1");
        assert_eq!(fake.posts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_connected() {
        let fake = Arc::new(FakeStore::default());
        fake.events
            .lock()
            .unwrap()
            .push(make_event("a", "2025-02-01", "Remoto", Category::Alumnos));
        let mut cache = connected_cache(fake).await;

        assert_eq!(cache.delete("a").await.unwrap(), Applied::Remote);
        assert!(cache.events().is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_switches_to_local_mode() {
        let fake = Arc::new(FakeStore::default());
        fake.events
            .lock()
            .unwrap()
            .push(make_event("a", "2025-02-01", "Remoto", Category::Alumnos));
        let mut cache = connected_cache(fake.clone()).await;

        *fake.fail.lock().unwrap() = true;
        let err = cache.save(&draft("2025-03-01", "X"), None).await.unwrap_err();
        assert!(matches!(err, CacheError::Store(_)));
        assert_eq!(cache.mode(), StoreMode::LocalOnly);
        // Failed save leaves the cache untouched
        assert_eq!(cache.events().len(), 1);

        // Subsequent changes stay local even if the store comes back
        *fake.fail.lock().unwrap() = false;
        assert_eq!(
            cache.save(&draft("2025-03-01", "Y"), None).await.unwrap(),
            Applied::Local
        );
        assert!(fake.posts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_export_connected() {
        let fake = Arc::new(FakeStore::default());
        let mut cache = connected_cache(fake).await;
        assert!(!cache.export().await.unwrap().is_empty());
    }
}
