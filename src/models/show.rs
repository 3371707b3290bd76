use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Performance {
    pub id: i64,
    pub show_id: i64,
    pub date: DateTime<Utc>,
}

/// Шоу с названием события, площадкой и всеми выступлениями (по дате).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Show {
    pub id: i64,
    pub event_name: String,
    pub venue_name: String,
    pub capacity: i32,
    pub performances: Vec<Performance>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetric {
    pub date: DateTime<Utc>,
    pub occupied_count: i64,
}

/// Вычисляемое представление, в базе не хранится.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShowMetric {
    pub show: i64,
    pub event: String,
    pub venue: String,
    pub capacity: i32,
    pub performances: Vec<PerformanceMetric>,
}
