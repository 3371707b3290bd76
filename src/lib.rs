pub mod config;
pub mod controllers;
pub mod database;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

use axum::Router;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

use config::{Config, StoreBackend};
use store::{EventStore, MemoryStore, MetricsStore, PgStore};

// Shared state для всего приложения
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub events: Arc<dyn EventStore>,
    pub metrics: Arc<dyn MetricsStore>,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("DATABASE_URL must be set for the postgres backend")]
    MissingDatabaseUrl,
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl AppState {
    /// Состояние с явно переданными хранилищами.
    pub fn with_stores(
        config: Config,
        events: Arc<dyn EventStore>,
        metrics: Arc<dyn MetricsStore>,
    ) -> Arc<Self> {
        Arc::new(Self { config, events, metrics })
    }

    /// Одно хранилище в памяти на оба ресурса.
    pub fn in_memory(config: Config, store: Arc<MemoryStore>) -> Arc<Self> {
        Self::with_stores(config, store.clone(), store)
    }

    pub async fn new(config: Config) -> Result<Arc<Self>, StartupError> {
        match config.database.backend {
            StoreBackend::Memory => {
                info!("Using in-memory store");
                Ok(Self::in_memory(config, Arc::new(MemoryStore::new())))
            }
            StoreBackend::Postgres => {
                let url = config
                    .database
                    .url
                    .clone()
                    .ok_or(StartupError::MissingDatabaseUrl)?;
                let db = database::Database::from_config(&config.database, &url).await?;
                info!("Database connected");

                if config.database.run_migrations {
                    db.run_migrations().await?;
                }

                let store = Arc::new(PgStore::new(db.pool.clone()));
                Ok(Self::with_stores(config, store.clone(), store))
            }
        }
    }
}

/// Главный роутер со всеми маршрутами и слоями.
pub fn app(state: Arc<AppState>) -> Router {
    let router = controllers::routes()
        .with_state(state.clone())
        .layer(TraceLayer::new_for_http());

    if state.config.features.enable_cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}
