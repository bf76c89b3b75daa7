use std::sync::Arc;
use tokio::sync::Mutex;

use crate::access::AccessGranter;
use crate::cache::PreviewCache;
use crate::config::{AccessConfig, AppConfig, PreviewConfig};
use crate::fetcher::PreviewFetcher;
use crate::locator::ObjectLocator;
use crate::session::PreviewSession;

/// Shared application state / 应用共享状态
pub struct AppState {
    /// One interactive session; the lock serializes loads / 单会话，锁保证同一时间只有一次读取
    pub session: Mutex<PreviewSession>,
    pub cache: Arc<PreviewCache>,
    pub granter: AccessGranter,
    pub preview: PreviewConfig,
    pub access: AccessConfig,
}

impl AppState {
    pub fn new(config: &AppConfig, locator: ObjectLocator) -> Self {
        let cache = Arc::new(PreviewCache::with_capacity(
            config.preview.cache_ttl(),
            config.preview.cache_max_entries,
        ));
        let fetcher = PreviewFetcher::new(config.preview.fetch_options());
        let session = PreviewSession::new(Arc::new(locator), fetcher, cache.clone());

        Self {
            session: Mutex::new(session),
            cache,
            granter: AccessGranter::new(),
            preview: config.preview.clone(),
            access: config.access.clone(),
        }
    }
}
