//! metrics.rs
//!
//! Только чтение: метрики по шоу, у которых есть будущие выступления.
//! Каждый вызов пересчитывается по текущему состоянию базы, кеша нет.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use std::sync::Arc;

use crate::error::ApiResult;
use crate::models::ShowMetric;
use crate::services::metrics::build_metrics;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/metrics", get(get_metrics))
}

/// GET /metrics
///
/// Для каждого шоу: id, название события, площадка, вместимость и по каждому
/// выступлению дата и число занятых мест.
pub async fn get_metrics(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<ShowMetric>>> {
    // один "сейчас" на оба запроса
    let now = Utc::now();

    let snapshot = state.metrics.metrics_snapshot(now).await?;
    let metrics = build_metrics(&snapshot.shows, &snapshot.occupied_counts);

    tracing::debug!("Metrics computed for {} shows", metrics.len());
    Ok(Json(metrics))
}
