//! Interactive preview session / 预览会话
//!
//! Holds the last successfully loaded preview. A failed load leaves it
//! untouched. / 加载失败时保留上一次成功的预览

use std::sync::Arc;

use crate::cache::PreviewCache;
use crate::dataset::PreviewDataset;
use crate::error::{PreviewError, Result};
use crate::fetcher::PreviewFetcher;
use crate::locator::ObjectLocator;

pub struct PreviewSession {
    locator: Arc<ObjectLocator>,
    fetcher: PreviewFetcher,
    cache: Arc<PreviewCache>,
    current: Option<Arc<PreviewDataset>>,
}

impl PreviewSession {
    pub fn new(locator: Arc<ObjectLocator>, fetcher: PreviewFetcher, cache: Arc<PreviewCache>) -> Self {
        Self {
            locator,
            fetcher,
            cache,
            current: None,
        }
    }

    pub fn locator(&self) -> &Arc<ObjectLocator> {
        &self.locator
    }

    /// Last good preview / 最近一次成功加载的预览
    pub fn current(&self) -> Result<Arc<PreviewDataset>> {
        self.current.clone().ok_or(PreviewError::NoPreview)
    }

    /// Load a preview (served from cache when possible) / 加载预览（优先走缓存）
    pub async fn load(&mut self, row_limit: Option<usize>) -> Result<Arc<PreviewDataset>> {
        let dataset = self
            .cache
            .get_or_fetch(&self.fetcher, &self.locator, row_limit)
            .await?;
        self.current = Some(dataset.clone());
        Ok(dataset)
    }

    /// Drop cached previews of this object and fetch again / 清除缓存后重新读取
    pub async fn reload(&mut self, row_limit: Option<usize>) -> Result<Arc<PreviewDataset>> {
        self.cache.invalidate(self.locator.identity());
        self.load(row_limit).await
    }

    /// Point the session at another object / 切换到另一个对象
    /// Cached previews of the previous object are invalidated.
    pub fn set_locator(&mut self, locator: Arc<ObjectLocator>) {
        if locator.identity() != self.locator.identity() {
            self.cache.invalidate(self.locator.identity());
            self.current = None;
            tracing::info!("Session object changed: {} -> {}", self.locator.identity(), locator.identity());
        }
        self.locator = locator;
    }
}
