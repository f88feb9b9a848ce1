//! Shared application state threaded through every handler.

use std::sync::Arc;

use crate::auth::service::AuthService;
use crate::cache::Cache;
use crate::database::Db;
use crate::services::notify::NotifyQueue;
use crate::services::scheduler_pool::SchedulerPool;

pub struct AppState {
    pub db: Db,
    pub cache: Arc<dyn Cache>,
    pub schedulers: Arc<SchedulerPool>,
    pub auth: AuthService,
    /// Absent when upload callbacks are disabled in config.
    pub notify: Option<NotifyQueue>,
}
