use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: i64,
    pub media_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventCategory {
    pub id: i64,
    pub description: String,
}

/// Событие вместе с подгруженными (LEFT JOIN) медиа и категорией.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub media_item: Option<MediaItem>,
    pub category: Option<EventCategory>,
    pub version: i64,
}

/// Ссылка на связанную запись: существующая по id или новая из переданных полей.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NestedRef<T> {
    Existing(i64),
    New(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewMediaItem {
    pub media_type: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEventCategory {
    pub description: String,
}

/// Поля события, пришедшие в запросе. Идентичность задаёт хранилище.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInput {
    pub name: String,
    pub description: String,
    pub media_item: Option<NestedRef<NewMediaItem>>,
    pub category: Option<NestedRef<NewEventCategory>>,
    /// Версия, которую видел клиент. None - сравниваем с только что прочитанной.
    pub expected_version: Option<i64>,
}
