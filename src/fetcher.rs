//! Bounded preview fetcher / 有界预览读取
//!
//! One GET per attempt. The body stream stays on the async side and feeds
//! the parser through a bounded channel. The stream is dropped as soon as
//! `row_limit` rows are read, or when the attempt times out, so nothing is
//! pulled after the call returns. / 读满行数或超时即丢弃流，不在后台继续下载

use bytes::Bytes;
use futures::StreamExt;
use std::io::{self, Read};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::dataset::PreviewDataset;
use crate::error::{PreviewError, Result};
use crate::locator::ObjectLocator;
use crate::storage::{ObjectIdentity, ObjectStore};

/// Chunks buffered between the stream and the parser / 流与解析器之间的缓冲块数
const CHANNEL_CAPACITY: usize = 4;

/// Blocking `Read` over chunks sent from the async side / 从通道读取分块的同步读取器
/// The sender going away reads as end of data. / 发送端关闭即视为读到结尾
struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    current: Bytes,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<io::Result<Bytes>>) -> Self {
        Self {
            rx,
            current: Bytes::new(),
        }
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        while self.current.is_empty() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current.split_to(n));
        Ok(n)
    }
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Timeout per attempt, expiry counts as transient / 单次超时
    pub timeout: Duration,
    /// Retries after the first attempt, transient errors only / 重试次数
    pub max_retries: u32,
    /// Linear backoff step / 线性退避步长
    pub retry_backoff: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct PreviewFetcher {
    options: FetchOptions,
}

impl PreviewFetcher {
    pub fn new(options: FetchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FetchOptions {
        &self.options
    }

    /// Fetch at most `row_limit` rows of the located object / 读取最多 row_limit 行
    pub async fn fetch_preview(
        &self,
        locator: &ObjectLocator,
        row_limit: Option<usize>,
    ) -> Result<PreviewDataset> {
        match row_limit {
            Some(0) => {
                return Err(PreviewError::InvalidArgument(
                    "row limit must be positive".to_string(),
                ))
            }
            None => tracing::warn!(
                "Unbounded preview requested for {}, this may read the entire object",
                locator.identity()
            ),
            Some(_) => {}
        }

        let store = locator.client()?;
        let identity = locator.identity();

        let mut attempt: u32 = 0;
        loop {
            match self.fetch_once(store.as_ref(), identity, row_limit).await {
                Ok(dataset) => {
                    tracing::info!(
                        "Preview fetched: {}, rows={}, limit={:?}",
                        identity,
                        dataset.row_count(),
                        row_limit
                    );
                    return Ok(dataset);
                }
                Err(e) if e.is_retryable() && attempt < self.options.max_retries => {
                    attempt += 1;
                    let delay = self.options.retry_backoff * attempt;
                    tracing::warn!(
                        "Preview fetch failed, retrying in {}ms (attempt {}/{}): {}",
                        delay.as_millis(),
                        attempt,
                        self.options.max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!("Preview fetch failed for {}: {}", identity, e);
                    return Err(e);
                }
            }
        }
    }

    async fn fetch_once(
        &self,
        store: &dyn ObjectStore,
        identity: &ObjectIdentity,
        row_limit: Option<usize>,
    ) -> Result<PreviewDataset> {
        let read = async {
            let body = store.get_object(identity).await?;
            tracing::debug!(
                "Reading {} from {}, content_length={:?}",
                identity,
                store.name(),
                body.content_length
            );

            // csv 是同步解析器，放到阻塞线程里；流留在异步侧，超时即随 future 一起丢弃
            let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
            let parser = tokio::task::spawn_blocking(move || {
                PreviewDataset::read_csv(ChannelReader::new(rx), row_limit)
            });

            let mut stream = body.stream;
            let pump = async move {
                while let Some(chunk) = stream.next().await {
                    let failed = chunk.is_err();
                    // 解析器已读满行数并关闭了接收端
                    if tx.send(chunk).await.is_err() || failed {
                        break;
                    }
                }
            };

            // 解析器先结束（读满行数）时丢弃 pump，连同流一起
            let mut parser = parser;
            let finished_first = tokio::select! {
                parsed = &mut parser => Some(parsed),
                () = pump => None,
            };
            let parsed = match finished_first {
                Some(parsed) => parsed,
                None => parser.await,
            };
            parsed.map_err(|e| PreviewError::TransientIo(format!("parser task failed: {}", e)))?
        };

        match tokio::time::timeout(self.options.timeout, read).await {
            Ok(result) => result,
            Err(_) => Err(PreviewError::TransientIo(format!(
                "read of {} timed out after {}s",
                identity,
                self.options.timeout.as_secs_f64()
            ))),
        }
    }
}
