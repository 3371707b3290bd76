//! PgStore against a real PostgreSQL.
//!
//! `#[sqlx::test]` creates a fresh database per test from `DATABASE_URL`
//! and applies `src/migrations` before the test body runs.

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
};
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use sqlx::PgPool;
use std::sync::Arc;
use tower::ServiceExt;

use ticketmonster::{
    config::Config,
    models::{EventInput, NestedRef, NewEventCategory, NewMediaItem},
    services::metrics::build_metrics,
    store::{EventStore, MetricsStore, Page, PgStore, StoreError, UpdateOutcome},
    AppState,
};

fn input(name: &str) -> EventInput {
    EventInput {
        name: name.to_string(),
        description: format!("{name} - a long enough description"),
        media_item: None,
        category: Some(NestedRef::New(NewEventCategory { description: "Concert".to_string() })),
        expected_version: None,
    }
}

async fn insert_venue(pool: &PgPool, name: &str, capacity: i32) -> i64 {
    sqlx::query_scalar::<_, i64>("INSERT INTO venues (name, capacity) VALUES ($1, $2) RETURNING id")
        .bind(name)
        .bind(capacity)
        .fetch_one(pool)
        .await
        .expect("insert venue")
}

async fn insert_show(pool: &PgPool, event_id: i64, venue_id: i64) -> i64 {
    sqlx::query_scalar::<_, i64>("INSERT INTO shows (event_id, venue_id) VALUES ($1, $2) RETURNING id")
        .bind(event_id)
        .bind(venue_id)
        .fetch_one(pool)
        .await
        .expect("insert show")
}

async fn insert_performance(pool: &PgPool, show_id: i64, date: DateTime<Utc>) -> i64 {
    sqlx::query_scalar::<_, i64>("INSERT INTO performances (show_id, date) VALUES ($1, $2) RETURNING id")
        .bind(show_id)
        .bind(date)
        .fetch_one(pool)
        .await
        .expect("insert performance")
}

async fn insert_booking(pool: &PgPool, performance_id: i64, tickets: usize) -> i64 {
    let booking_id = sqlx::query_scalar::<_, i64>(
        "INSERT INTO bookings (performance_id, contact_email) VALUES ($1, 'guest@example.org') RETURNING id",
    )
    .bind(performance_id)
    .fetch_one(pool)
    .await
    .expect("insert booking");

    for _ in 0..tickets {
        sqlx::query("INSERT INTO tickets (booking_id, price) VALUES ($1, 25.0)")
            .bind(booking_id)
            .execute(pool)
            .await
            .expect("insert ticket");
    }
    booking_id
}

#[sqlx::test(migrations = "./src/migrations")]
async fn list_is_ordered_and_paginated(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut ids = Vec::new();
    for name in ["First event", "Second event", "Third event"] {
        ids.push(store.create_event(input(name)).await.unwrap().id);
    }

    let all: Vec<i64> = store
        .list_events(Page::default())
        .await
        .unwrap()
        .iter()
        .map(|e| e.id)
        .collect();
    assert_eq!(all, ids);

    let page = store
        .list_events(Page { start: Some(1), max: Some(1) })
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].id, ids[1]);

    let tail = store.list_events(Page { start: Some(2), max: None }).await.unwrap();
    assert_eq!(tail.iter().map(|e| e.id).collect::<Vec<_>>(), vec![ids[2]]);

    let empty = store.list_events(Page { start: None, max: Some(0) }).await.unwrap();
    assert!(empty.is_empty());
}

#[sqlx::test(migrations = "./src/migrations")]
async fn stale_update_leaves_row_untouched(pool: PgPool) {
    let store = PgStore::new(pool);
    let created = store.create_event(input("Opera night")).await.unwrap();

    let mut fresh = input("Opera gala");
    fresh.expected_version = Some(0);
    let updated = match store.update_event(created.id, fresh).await.unwrap() {
        UpdateOutcome::Updated(event) => event,
        other => panic!("unexpected outcome: {other:?}"),
    };
    assert_eq!(updated.version, 1);

    let mut stale = input("Opera flop");
    stale.expected_version = Some(0);
    match store.update_event(created.id, stale).await.unwrap_err() {
        StoreError::Conflict { current } => assert_eq!(*current, updated),
        other => panic!("unexpected error: {other:?}"),
    }

    let stored = store.find_event(created.id).await.unwrap().unwrap();
    assert_eq!(stored, updated);
}

#[sqlx::test(migrations = "./src/migrations")]
async fn stale_update_over_http_is_a_conflict(pool: PgPool) {
    let store = Arc::new(PgStore::new(pool));
    let config = Config::from_lookup(|key: &str| (key == "STORE_BACKEND").then(|| "memory".to_string()))
        .expect("config");
    let app = ticketmonster::app(AppState::with_stores(config, store.clone(), store.clone()));
    let created = store.create_event(input("Opera night")).await.unwrap();
    let uri = format!("/forge/events/{}", created.id);

    let put = |body: Value| {
        Request::builder()
            .method(Method::PUT)
            .uri(&uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    };
    let payload = |name: &str| {
        json!({
            "name": name,
            "description": "A long and very dramatic evening",
            "category": { "description": "Concert" },
            "version": 0
        })
    };

    let response = app.clone().oneshot(put(payload("Opera gala"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.clone().oneshot(put(payload("Opera flop"))).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["name"], "Opera gala");
    assert_eq!(body["version"], 1);

    let stored = store.find_event(created.id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Opera gala");
    assert_eq!(stored.version, 1);
}

#[sqlx::test(migrations = "./src/migrations")]
async fn metrics_count_tickets_of_future_performances(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let now = Utc::now();
    let event = store.create_event(input("Opera night")).await.unwrap();

    let hall = insert_venue(&pool, "Roy Thomson Hall", 1800).await;
    let upcoming = insert_show(&pool, event.id, hall).await;
    let p1 = insert_performance(&pool, upcoming, now + Duration::days(1)).await;
    let p2 = insert_performance(&pool, upcoming, now + Duration::days(2)).await;
    insert_booking(&pool, p2, 2).await;
    insert_booking(&pool, p2, 1).await;
    insert_booking(&pool, p2, 0).await;

    let opera = insert_venue(&pool, "Sydney Opera House", 900).await;
    let finished = insert_show(&pool, event.id, opera).await;
    let old = insert_performance(&pool, finished, now - Duration::days(1)).await;
    insert_booking(&pool, old, 4).await;

    let snapshot = store.metrics_snapshot(now).await.unwrap();
    assert_eq!(snapshot.shows.len(), 1);
    let show = &snapshot.shows[0];
    assert_eq!(show.id, upcoming);
    assert_eq!(show.event_name, "Opera night");
    assert_eq!(show.venue_name, "Roy Thomson Hall");
    assert_eq!(show.capacity, 1800);
    assert_eq!(show.performances.iter().map(|p| p.id).collect::<Vec<_>>(), vec![p1, p2]);

    assert_eq!(snapshot.occupied_counts.get(&p1), None);
    assert_eq!(snapshot.occupied_counts.get(&p2), Some(&3));
    assert_eq!(snapshot.occupied_counts.get(&old), None);

    let metrics = build_metrics(&snapshot.shows, &snapshot.occupied_counts);
    let occupied: Vec<i64> = metrics[0].performances.iter().map(|p| p.occupied_count).collect();
    assert_eq!(occupied, vec![0, 3]);
}

#[sqlx::test(migrations = "./src/migrations")]
async fn metrics_empty_without_future_performances(pool: PgPool) {
    let store = PgStore::new(pool.clone());
    let now = Utc::now();
    assert!(store.metrics_snapshot(now).await.unwrap().shows.is_empty());

    let event = store.create_event(input("Opera night")).await.unwrap();
    let hall = insert_venue(&pool, "Old hall", 100).await;
    let show = insert_show(&pool, event.id, hall).await;
    let past = insert_performance(&pool, show, now - Duration::days(3)).await;
    insert_booking(&pool, past, 5).await;

    let snapshot = store.metrics_snapshot(now).await.unwrap();
    assert!(snapshot.shows.is_empty());
    assert!(snapshot.occupied_counts.is_empty());
}

#[sqlx::test(migrations = "./src/migrations")]
async fn media_item_matched_by_url_is_left_unchanged(pool: PgPool) {
    let store = PgStore::new(pool);
    let shared = |media_type: &str| {
        Some(NestedRef::New(NewMediaItem {
            media_type: media_type.to_string(),
            url: "https://img.example.org/shared.png".to_string(),
        }))
    };

    let mut poster = input("Opera night");
    poster.media_item = shared("IMAGE");
    let first = store.create_event(poster).await.unwrap();

    let mut trailer = input("Ballet night");
    trailer.media_item = shared("VIDEO");
    let second = store.create_event(trailer).await.unwrap();

    assert_eq!(second.media_item, first.media_item);
    let stored = store.find_event(first.id).await.unwrap().unwrap();
    assert_eq!(stored.media_item.unwrap().media_type, "IMAGE");
}

#[sqlx::test(migrations = "./src/migrations")]
async fn delete_reports_missing_rows(pool: PgPool) {
    let store = PgStore::new(pool);
    assert!(!store.delete_event(999).await.unwrap());

    let created = store.create_event(input("Opera night")).await.unwrap();
    assert!(store.delete_event(created.id).await.unwrap());
    assert!(store.find_event(created.id).await.unwrap().is_none());
}

#[sqlx::test(migrations = "./src/migrations")]
async fn unknown_category_is_rejected(pool: PgPool) {
    let store = PgStore::new(pool);
    let mut bad = input("Opera night");
    bad.category = Some(NestedRef::Existing(12345));

    assert!(matches!(
        store.create_event(bad).await,
        Err(StoreError::UnknownCategory(12345))
    ));
    assert!(store.list_events(Page::default()).await.unwrap().is_empty());
}
