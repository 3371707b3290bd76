//! memory.rs
//!
//! Хранилище в памяти процесса. Повторяет поведение PgStore: те же ссылки
//! на медиа/категории, та же проверка версии, тот же подсчёт билетов.
//! Используется тестами и режимом STORE_BACKEND=memory.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{EventStore, MetricsSnapshot, MetricsStore, Page, StoreError, UpdateOutcome};
use crate::models::{
    Event, EventCategory, EventInput, MediaItem, NestedRef, NewEventCategory, NewMediaItem,
    Performance, Show,
};

#[derive(Debug, Clone)]
struct EventRecord {
    name: String,
    description: String,
    media_item_id: Option<i64>,
    category_id: Option<i64>,
    version: i64,
}

#[derive(Debug, Clone)]
struct VenueRecord {
    name: String,
    capacity: i32,
}

#[derive(Debug, Clone, Copy)]
struct ShowRecord {
    event_id: i64,
    venue_id: i64,
}

#[derive(Debug, Clone, Copy)]
struct BookingRecord {
    performance_id: i64,
    tickets: i64,
}

#[derive(Debug, Default)]
struct Tables {
    last_id: i64,
    media_items: BTreeMap<i64, MediaItem>,
    categories: BTreeMap<i64, EventCategory>,
    events: BTreeMap<i64, EventRecord>,
    venues: BTreeMap<i64, VenueRecord>,
    shows: BTreeMap<i64, ShowRecord>,
    performances: BTreeMap<i64, Performance>,
    bookings: BTreeMap<i64, BookingRecord>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn load_event(&self, id: i64) -> Option<Event> {
        let record = self.events.get(&id)?;
        Some(Event {
            id,
            name: record.name.clone(),
            description: record.description.clone(),
            media_item: record
                .media_item_id
                .and_then(|mid| self.media_items.get(&mid).cloned()),
            category: record
                .category_id
                .and_then(|cid| self.categories.get(&cid).cloned()),
            version: record.version,
        })
    }

    // Неизвестный id медиа даёт "без медиа"; новая запись ищется по url,
    // найденная остаётся как есть
    fn resolve_media_item(&mut self, media: Option<NestedRef<NewMediaItem>>) -> Option<i64> {
        match media? {
            NestedRef::Existing(id) => self.media_items.contains_key(&id).then_some(id),
            NestedRef::New(item) => {
                let existing = self
                    .media_items
                    .values()
                    .find(|m| m.url == item.url)
                    .map(|m| m.id);
                if existing.is_some() {
                    return existing;
                }
                let id = self.next_id();
                self.media_items.insert(
                    id,
                    MediaItem { id, media_type: item.media_type, url: item.url },
                );
                Some(id)
            }
        }
    }

    fn resolve_category(
        &mut self,
        category: Option<NestedRef<NewEventCategory>>,
    ) -> Result<Option<i64>, StoreError> {
        match category {
            None => Ok(None),
            Some(NestedRef::Existing(id)) => {
                if self.categories.contains_key(&id) {
                    Ok(Some(id))
                } else {
                    Err(StoreError::UnknownCategory(id))
                }
            }
            Some(NestedRef::New(new)) => {
                let existing = self
                    .categories
                    .values()
                    .find(|c| c.description == new.description)
                    .map(|c| c.id);
                if let Some(id) = existing {
                    return Ok(Some(id));
                }
                let id = self.next_id();
                self.categories.insert(
                    id,
                    EventCategory { id, description: new.description },
                );
                Ok(Some(id))
            }
        }
    }

    fn insert_event(&mut self, input: EventInput) -> Result<Event, StoreError> {
        let category_id = self.resolve_category(input.category)?;
        let media_item_id = self.resolve_media_item(input.media_item);
        let id = self.next_id();
        self.events.insert(
            id,
            EventRecord {
                name: input.name,
                description: input.description,
                media_item_id,
                category_id,
                version: 0,
            },
        );
        self.load_event(id)
            .ok_or_else(|| StoreError::Integrity(format!("event {id} vanished after insert")))
    }

    fn future_shows(&self, now: DateTime<Utc>) -> Vec<Show> {
        let mut shows = Vec::new();

        for (show_id, record) in &self.shows {
            let mut performances: Vec<Performance> = self
                .performances
                .values()
                .filter(|p| p.show_id == *show_id)
                .cloned()
                .collect();
            if !performances.iter().any(|p| p.date > now) {
                continue;
            }
            performances.sort_by_key(|p| (p.date, p.id));

            let (Some(event), Some(venue)) = (
                self.events.get(&record.event_id),
                self.venues.get(&record.venue_id),
            ) else {
                continue;
            };

            shows.push(Show {
                id: *show_id,
                event_name: event.name.clone(),
                venue_name: venue.name.clone(),
                capacity: venue.capacity,
                performances,
            });
        }

        shows
    }

    fn occupied_counts(&self, now: DateTime<Utc>) -> HashMap<i64, i64> {
        let mut counts: HashMap<i64, i64> = HashMap::new();

        for booking in self.bookings.values() {
            let upcoming = self
                .performances
                .get(&booking.performance_id)
                .is_some_and(|p| p.date > now);
            if upcoming {
                *counts.entry(booking.performance_id).or_insert(0) += booking.tickets;
            }
        }

        counts
    }
}

/// Таблицы под одним RwLock: каждая операция видит согласованный снимок.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_media_item(&self, media_type: &str, url: &str) -> i64 {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        tables.media_items.insert(
            id,
            MediaItem { id, media_type: media_type.to_string(), url: url.to_string() },
        );
        id
    }

    pub async fn insert_category(&self, description: &str) -> i64 {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        tables.categories.insert(
            id,
            EventCategory { id, description: description.to_string() },
        );
        id
    }

    pub async fn insert_venue(&self, name: &str, capacity: i32) -> i64 {
        let mut tables = self.tables.write().await;
        let id = tables.next_id();
        tables.venues.insert(id, VenueRecord { name: name.to_string(), capacity });
        id
    }

    pub async fn insert_show(&self, event_id: i64, venue_id: i64) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.events.contains_key(&event_id) {
            return Err(StoreError::Integrity(format!("event {event_id} does not exist")));
        }
        if !tables.venues.contains_key(&venue_id) {
            return Err(StoreError::Integrity(format!("venue {venue_id} does not exist")));
        }
        let id = tables.next_id();
        tables.shows.insert(id, ShowRecord { event_id, venue_id });
        Ok(id)
    }

    pub async fn insert_performance(&self, show_id: i64, date: DateTime<Utc>) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.shows.contains_key(&show_id) {
            return Err(StoreError::Integrity(format!("show {show_id} does not exist")));
        }
        let id = tables.next_id();
        tables.performances.insert(id, Performance { id, show_id, date });
        Ok(id)
    }

    /// Бронь с `tickets` билетами на выступление.
    pub async fn insert_booking(&self, performance_id: i64, tickets: i64) -> Result<i64, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.performances.contains_key(&performance_id) {
            return Err(StoreError::Integrity(format!(
                "performance {performance_id} does not exist"
            )));
        }
        let id = tables.next_id();
        tables.bookings.insert(id, BookingRecord { performance_id, tickets: tickets.max(0) });
        Ok(id)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_event(&self, input: EventInput) -> Result<Event, StoreError> {
        let mut tables = self.tables.write().await;
        tables.insert_event(input)
    }

    async fn find_event(&self, id: i64) -> Result<Option<Event>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.load_event(id))
    }

    async fn list_events(&self, page: Page) -> Result<Vec<Event>, StoreError> {
        let tables = self.tables.read().await;
        let start = page.start.unwrap_or(0).max(0) as usize;
        let max = page.max.map_or(usize::MAX, |m| m.max(0) as usize);

        Ok(tables
            .events
            .keys()
            .skip(start)
            .take(max)
            .filter_map(|id| tables.load_event(*id))
            .collect())
    }

    async fn update_event(&self, id: i64, input: EventInput) -> Result<UpdateOutcome, StoreError> {
        let mut tables = self.tables.write().await;

        // Строки нет - создаём новую из входных данных (новый id)
        let Some(current_version) = tables.events.get(&id).map(|r| r.version) else {
            return tables.insert_event(input).map(UpdateOutcome::Created);
        };

        let expected = input.expected_version.unwrap_or(current_version);
        if expected != current_version {
            let current = tables
                .load_event(id)
                .ok_or_else(|| StoreError::Integrity(format!("event {id} vanished during update")))?;
            return Err(StoreError::Conflict { current: Box::new(current) });
        }

        let category_id = tables.resolve_category(input.category)?;
        let media_item_id = tables.resolve_media_item(input.media_item);
        if let Some(record) = tables.events.get_mut(&id) {
            record.name = input.name;
            record.description = input.description;
            record.media_item_id = media_item_id;
            record.category_id = category_id;
            record.version += 1;
        }

        tables
            .load_event(id)
            .map(UpdateOutcome::Updated)
            .ok_or_else(|| StoreError::Integrity(format!("event {id} vanished during update")))
    }

    async fn delete_event(&self, id: i64) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.events.contains_key(&id) {
            return Ok(false);
        }
        if tables.shows.values().any(|s| s.event_id == id) {
            return Err(StoreError::Integrity(format!("event {id} is referenced by shows")));
        }
        tables.events.remove(&id);
        Ok(true)
    }
}

#[async_trait]
impl MetricsStore for MemoryStore {
    async fn metrics_snapshot(&self, now: DateTime<Utc>) -> Result<MetricsSnapshot, StoreError> {
        let tables = self.tables.read().await;
        Ok(MetricsSnapshot {
            shows: tables.future_shows(now),
            occupied_counts: tables.occupied_counts(now),
        })
    }
}
