use std::sync::Arc;

use redis::Client as RedisClient;
use sqlx::PgPool;

use crate::dify::ReportBackend;
use crate::dingtalk::DingTalkClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Redis client backing the single-draft store.
    pub redis: RedisClient,
    /// Pluggable report generator. Default: DifyClient.
    pub backend: Arc<dyn ReportBackend>,
    pub dingtalk: Arc<DingTalkClient>,
}
