//! store
//!
//! Хранилище событий и данных для метрик. Обработчик делает ровно один вызов
//! хранилища на запрос, и этот вызов - вся единица работы: реализация сама
//! открывает и закрывает транзакцию, между запросами ничего не разделяется.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

use crate::models::{Event, EventInput, Show};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// Строка изменилась после чтения: версия не совпала.
    #[error("event {} was modified concurrently (current version {})", .current.id, .current.version)]
    Conflict { current: Box<Event> },

    #[error("event category {0} does not exist")]
    UnknownCategory(i64),

    /// Нарушена ссылочная целостность (например, на событие ссылаются шоу).
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Результат PUT: строка обновлена на месте или создана заново (её не было).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated(Event),
    Created(Event),
}

/// Пагинация списка: `start` - смещение, `max` - предел. None - не применяется.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Page {
    pub start: Option<i64>,
    pub max: Option<i64>,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn create_event(&self, input: EventInput) -> Result<Event, StoreError>;

    /// Событие с медиа и категорией (eager LEFT JOIN).
    async fn find_event(&self, id: i64) -> Result<Option<Event>, StoreError>;

    /// Все события по возрастанию id.
    async fn list_events(&self, page: Page) -> Result<Vec<Event>, StoreError>;

    async fn update_event(&self, id: i64, input: EventInput) -> Result<UpdateOutcome, StoreError>;

    /// false - такой строки не было.
    async fn delete_event(&self, id: i64) -> Result<bool, StoreError>;
}

/// Данные для метрик, прочитанные из одного снимка базы.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Шоу, у которых есть хотя бы одно выступление строго после `now`, по id.
    pub shows: Vec<Show>,
    /// performance_id -> число билетов по броням на выступления после `now`.
    pub occupied_counts: HashMap<i64, i64>,
}

#[async_trait]
pub trait MetricsStore: Send + Sync {
    /// Оба запроса метрик в одной транзакции.
    async fn metrics_snapshot(&self, now: DateTime<Utc>) -> Result<MetricsSnapshot, StoreError>;
}
