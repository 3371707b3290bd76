use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgConnection, PgPool};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::{EventStore, MetricsSnapshot, MetricsStore, Page, StoreError, UpdateOutcome};
use crate::models::{
    Event, EventCategory, EventInput, MediaItem, NestedRef, NewEventCategory, NewMediaItem,
    Performance, Show,
};

// Событие + медиа + категория одним запросом
const SELECT_EVENT: &str = r#"
    SELECT DISTINCT
        e.id,
        e.name,
        e.description,
        e.version,
        m.id AS media_item_id,
        m.media_type,
        m.url,
        c.id AS category_id,
        c.description AS category_description
    FROM events e
    LEFT JOIN media_items m ON m.id = e.media_item_id
    LEFT JOIN event_categories c ON c.id = e.category_id
"#;

#[derive(Debug, FromRow)]
struct EventRow {
    id: i64,
    name: String,
    description: String,
    version: i64,
    media_item_id: Option<i64>,
    media_type: Option<String>,
    url: Option<String>,
    category_id: Option<i64>,
    category_description: Option<String>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        let media_item = match (row.media_item_id, row.media_type, row.url) {
            (Some(id), Some(media_type), Some(url)) => Some(MediaItem { id, media_type, url }),
            _ => None,
        };
        let category = match (row.category_id, row.category_description) {
            (Some(id), Some(description)) => Some(EventCategory { id, description }),
            _ => None,
        };

        Event {
            id: row.id,
            name: row.name,
            description: row.description,
            media_item,
            category,
            version: row.version,
        }
    }
}

#[derive(Debug, FromRow)]
struct ShowRow {
    id: i64,
    event_name: String,
    venue_name: String,
    capacity: i32,
}

/// Хранилище поверх PostgreSQL. Каждый метод - одна транзакция на весь запрос.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

async fn fetch_event(conn: &mut PgConnection, id: i64) -> Result<Option<Event>, sqlx::Error> {
    let query = format!("{SELECT_EVENT} WHERE e.id = $1 ORDER BY e.id");
    let row = sqlx::query_as::<_, EventRow>(&query)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(Event::from))
}

// Неизвестный id медиа => событие без медиа. Новая запись совпадает с существующей
// по url; существующую строку не меняем, на неё могут ссылаться другие события.
async fn resolve_media_item(
    conn: &mut PgConnection,
    media: Option<NestedRef<NewMediaItem>>,
) -> Result<Option<i64>, sqlx::Error> {
    match media {
        None => Ok(None),
        Some(NestedRef::Existing(id)) => {
            sqlx::query_scalar::<_, i64>("SELECT id FROM media_items WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await
        }
        Some(NestedRef::New(item)) => {
            sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO media_items (media_type, url)
                VALUES ($1, $2)
                ON CONFLICT (url) DO UPDATE SET url = EXCLUDED.url
                RETURNING id
                "#,
            )
            .bind(item.media_type)
            .bind(item.url)
            .fetch_one(&mut *conn)
            .await
            .map(Some)
        }
    }
}

async fn resolve_category(
    conn: &mut PgConnection,
    category: Option<NestedRef<NewEventCategory>>,
) -> Result<Option<i64>, StoreError> {
    match category {
        None => Ok(None),
        Some(NestedRef::Existing(id)) => {
            let found = sqlx::query_scalar::<_, i64>("SELECT id FROM event_categories WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *conn)
                .await?;
            found.map(Some).ok_or(StoreError::UnknownCategory(id))
        }
        Some(NestedRef::New(new)) => {
            let id = sqlx::query_scalar::<_, i64>(
                r#"
                INSERT INTO event_categories (description)
                VALUES ($1)
                ON CONFLICT (description) DO UPDATE SET description = EXCLUDED.description
                RETURNING id
                "#,
            )
            .bind(new.description)
            .fetch_one(&mut *conn)
            .await?;
            Ok(Some(id))
        }
    }
}

async fn insert_event(conn: &mut PgConnection, input: EventInput) -> Result<Event, StoreError> {
    let category_id = resolve_category(conn, input.category).await?;
    let media_item_id = resolve_media_item(conn, input.media_item).await?;

    let id = sqlx::query_scalar::<_, i64>(
        r#"
        INSERT INTO events (name, description, media_item_id, category_id)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(input.name)
    .bind(input.description)
    .bind(media_item_id)
    .bind(category_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(map_integrity)?;

    fetch_event(conn, id)
        .await?
        .ok_or_else(|| StoreError::Integrity(format!("event {id} vanished after insert")))
}

// Нарушения ключей отдаём как Integrity, остальное как есть
fn map_integrity(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_foreign_key_violation() || db.is_check_violation() {
            return StoreError::Integrity(db.message().to_string());
        }
    }
    StoreError::Database(err)
}

#[async_trait]
impl EventStore for PgStore {
    async fn create_event(&self, input: EventInput) -> Result<Event, StoreError> {
        let mut tx = self.pool.begin().await?;
        let event = insert_event(&mut tx, input).await?;
        tx.commit().await?;

        debug!("event {} inserted", event.id);
        Ok(event)
    }

    async fn find_event(&self, id: i64) -> Result<Option<Event>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_event(&mut conn, id).await?)
    }

    async fn list_events(&self, page: Page) -> Result<Vec<Event>, StoreError> {
        // LIMIT NULL = без ограничения, OFFSET NULL = 0
        let query = format!("{SELECT_EVENT} ORDER BY e.id LIMIT $1 OFFSET $2");
        let rows = sqlx::query_as::<_, EventRow>(&query)
            .bind(page.max)
            .bind(page.start)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    async fn update_event(&self, id: i64, input: EventInput) -> Result<UpdateOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let Some(current) = fetch_event(&mut tx, id).await? else {
            let created = insert_event(&mut tx, input).await?;
            tx.commit().await?;
            return Ok(UpdateOutcome::Created(created));
        };

        let expected = input.expected_version.unwrap_or(current.version);
        if expected != current.version {
            tx.rollback().await?;
            return Err(StoreError::Conflict { current: Box::new(current) });
        }

        let category_id = resolve_category(&mut tx, input.category).await?;
        let media_item_id = resolve_media_item(&mut tx, input.media_item).await?;

        // compare-and-swap по версии
        let result = sqlx::query(
            r#"
            UPDATE events
            SET name = $1,
                description = $2,
                media_item_id = $3,
                category_id = $4,
                version = version + 1
            WHERE id = $5 AND version = $6
            "#,
        )
        .bind(input.name)
        .bind(input.description)
        .bind(media_item_id)
        .bind(category_id)
        .bind(id)
        .bind(expected)
        .execute(&mut *tx)
        .await
        .map_err(map_integrity)?;

        if result.rows_affected() == 0 {
            warn!("event {} changed between read and write (expected version {})", id, expected);

            // READ COMMITTED: повторное чтение в той же транзакции видит чужую запись
            let latest = fetch_event(&mut tx, id).await?;
            tx.rollback().await?;
            return match latest {
                Some(latest) => Err(StoreError::Conflict { current: Box::new(latest) }),
                None => Err(StoreError::Integrity(format!("event {id} was deleted concurrently"))),
            };
        }

        let updated = fetch_event(&mut tx, id)
            .await?
            .ok_or_else(|| StoreError::Integrity(format!("event {id} vanished during update")))?;
        tx.commit().await?;

        Ok(UpdateOutcome::Updated(updated))
    }

    async fn delete_event(&self, id: i64) -> Result<bool, StoreError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(map_integrity)?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MetricsStore for PgStore {
    async fn metrics_snapshot(&self, now: DateTime<Utc>) -> Result<MetricsSnapshot, StoreError> {
        let mut tx = self.pool.begin().await?;
        // оба запроса видят один и тот же снимок
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await?;

        let shows = select_future_shows(&mut tx, now).await?;
        let occupied_counts = if shows.is_empty() {
            HashMap::new()
        } else {
            count_occupied_seats(&mut tx, now).await?
        };
        tx.commit().await?;

        Ok(MetricsSnapshot { shows, occupied_counts })
    }
}

async fn select_future_shows(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<Vec<Show>, sqlx::Error> {
    let show_rows = sqlx::query_as::<_, ShowRow>(
        r#"
        SELECT DISTINCT
            s.id,
            e.name AS event_name,
            v.name AS venue_name,
            v.capacity
        FROM shows s
        JOIN performances p ON p.show_id = s.id
        JOIN events e ON e.id = s.event_id
        JOIN venues v ON v.id = s.venue_id
        WHERE p.date > $1
        ORDER BY s.id
        "#,
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    if show_rows.is_empty() {
        return Ok(Vec::new());
    }

    let show_ids: Vec<i64> = show_rows.iter().map(|s| s.id).collect();
    let performances = sqlx::query_as::<_, Performance>(
        r#"
        SELECT id, show_id, date
        FROM performances
        WHERE show_id = ANY($1)
        ORDER BY show_id, date, id
        "#,
    )
    .bind(&show_ids[..])
    .fetch_all(&mut *conn)
    .await?;

    let mut by_show: HashMap<i64, Vec<Performance>> = HashMap::new();
    for performance in performances {
        by_show.entry(performance.show_id).or_default().push(performance);
    }

    Ok(show_rows
        .into_iter()
        .map(|row| Show {
            performances: by_show.remove(&row.id).unwrap_or_default(),
            id: row.id,
            event_name: row.event_name,
            venue_name: row.venue_name,
            capacity: row.capacity,
        })
        .collect())
}

async fn count_occupied_seats(
    conn: &mut PgConnection,
    now: DateTime<Utc>,
) -> Result<HashMap<i64, i64>, sqlx::Error> {
    let rows = sqlx::query_as::<_, (i64, i64)>(
        r#"
        SELECT b.performance_id, COUNT(t.id) AS occupied
        FROM bookings b
        JOIN performances p ON p.id = b.performance_id
        LEFT JOIN tickets t ON t.booking_id = b.id
        WHERE p.date > $1
        GROUP BY b.performance_id
        "#,
    )
    .bind(now)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows.into_iter().collect())
}
