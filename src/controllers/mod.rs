pub mod events;
pub mod metrics;

use axum::{routing::get, Router};
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .route("/", get(|| async { "TicketMonster API v1.0" }))
        .route("/health", get(|| async { "OK" }))
        .merge(events::routes())
        .merge(metrics::routes())
}
