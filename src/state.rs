use std::sync::Arc;

use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    notifications::NotificationDispatcher,
    storage::ImageStorage,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub notifier: NotificationDispatcher,
    pub images: Arc<dyn ImageStorage>,
}
