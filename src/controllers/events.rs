//! events.rs
//!
//! CRUD для событий:
//! - POST   /forge/events        - создать, 201 + Location
//! - GET    /forge/events/{id}   - одно событие, 404 если нет
//! - GET    /forge/events        - список по возрастанию id, ?start=&max=
//! - PUT    /forge/events/{id}   - обновить, 409 с текущим состоянием при конфликте версий
//! - DELETE /forge/events/{id}   - удалить, 404 если нет

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use crate::error::{ApiError, ApiJson, ApiResult};
use crate::models::EventDto;
use crate::store::{Page, UpdateOutcome};
use crate::AppState;

pub const EVENTS_PATH: &str = "/forge/events";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(EVENTS_PATH, get(list_all).post(create))
        .route(
            "/forge/events/{id}",
            get(find_by_id).put(update).delete(delete_by_id),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub start: Option<i64>,
    pub max: Option<i64>,
}

impl ListQuery {
    fn into_page(self) -> ApiResult<Page> {
        if self.start.is_some_and(|s| s < 0) {
            return Err(ApiError::BadRequest("start must be >= 0".to_string()));
        }
        if self.max.is_some_and(|m| m < 0) {
            return Err(ApiError::BadRequest("max must be >= 0".to_string()));
        }
        Ok(Page { start: self.start, max: self.max })
    }
}

fn event_location(id: i64) -> String {
    format!("{EVENTS_PATH}/{id}")
}

// POST /forge/events
pub async fn create(
    State(state): State<Arc<AppState>>,
    ApiJson(dto): ApiJson<EventDto>,
) -> ApiResult<impl IntoResponse> {
    dto.validate()?;

    let event = state.events.create_event(dto.into_input()).await?;
    info!("Event {} created: {}", event.id, event.name);

    Ok((StatusCode::CREATED, [(header::LOCATION, event_location(event.id))]))
}

// DELETE /forge/events/{id}
pub async fn delete_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !state.events.delete_event(id).await? {
        return Err(ApiError::NotFound);
    }
    info!("Event {} deleted", id);
    Ok(StatusCode::NO_CONTENT)
}

// GET /forge/events/{id}
pub async fn find_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<EventDto>> {
    let event = state.events.find_event(id).await?.ok_or(ApiError::NotFound)?;
    Ok(Json(EventDto::from(&event)))
}

// GET /forge/events?start=&max=
pub async fn list_all(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListQuery>,
) -> ApiResult<Json<Vec<EventDto>>> {
    let page = params.into_page()?;
    let events = state.events.list_events(page).await?;

    Ok(Json(events.iter().map(EventDto::from).collect()))
}

// PUT /forge/events/{id}
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ApiJson(dto): ApiJson<EventDto>,
) -> ApiResult<StatusCode> {
    dto.validate()?;

    match state.events.update_event(id, dto.into_input()).await {
        Ok(UpdateOutcome::Updated(event)) => {
            info!("Event {} updated to version {}", event.id, event.version);
        }
        Ok(UpdateOutcome::Created(event)) => {
            // PUT на несуществующий id создаёт новую строку
            info!("Event {} did not exist, created {} instead", id, event.id);
        }
        Err(e) => {
            if let crate::store::StoreError::Conflict { current } = &e {
                tracing::warn!("Stale update of event {} (current version {})", id, current.version);
            }
            return Err(e.into());
        }
    }

    Ok(StatusCode::NO_CONTENT)
}
