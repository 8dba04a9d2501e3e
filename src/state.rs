use crate::{config::AppConfig, db::DbPool, services::lifecycle::TripLifecycle};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db: DbPool,
    pub lifecycle: TripLifecycle,
}

impl AppState {
    pub fn new(config: AppConfig, db: DbPool, lifecycle: TripLifecycle) -> Self {
        Self {
            config,
            db,
            lifecycle,
        }
    }
}
