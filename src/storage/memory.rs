//! In-memory object store / 内存对象存储
//!
//! Serves objects in fixed-size chunks and records how it was used, so
//! callers can verify how much of an object was actually pulled.

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::{ObjectBody, ObjectIdentity, ObjectStore};
use crate::error::{PreviewError, Result};

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

type ObjectKey = (String, String);

pub struct MemoryStore {
    objects: RwLock<HashMap<ObjectKey, Bytes>>,
    denied: RwLock<HashSet<ObjectKey>>,
    signing_error: RwLock<Option<String>>,
    read_delay: RwLock<Option<Duration>>,
    chunk_delay: RwLock<Option<Duration>>,
    /// Next read breaks after this many chunks / 下一次读取在若干块后中断
    break_after: RwLock<Option<usize>>,
    /// Remaining reads that fail with a transient error / 剩余的瞬时失败次数
    transient_failures: AtomicUsize,
    chunk_size: usize,
    reads: AtomicUsize,
    presigns: AtomicUsize,
    chunks_pulled: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            denied: RwLock::new(HashSet::new()),
            signing_error: RwLock::new(None),
            read_delay: RwLock::new(None),
            chunk_delay: RwLock::new(None),
            break_after: RwLock::new(None),
            transient_failures: AtomicUsize::new(0),
            chunk_size: chunk_size.max(1),
            reads: AtomicUsize::new(0),
            presigns: AtomicUsize::new(0),
            chunks_pulled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Store (or replace) an object / 写入对象
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Bytes>) {
        self.objects
            .write()
            .insert((bucket.to_string(), key.to_string()), data.into());
    }

    pub fn remove_object(&self, bucket: &str, key: &str) {
        self.objects
            .write()
            .remove(&(bucket.to_string(), key.to_string()));
    }

    /// Reads of this object fail with access denied / 读取该对象时返回拒绝访问
    pub fn deny(&self, bucket: &str, key: &str) {
        self.denied.write().insert((bucket.to_string(), key.to_string()));
    }

    /// Next `count` reads fail with a transient error / 接下来的若干次读取失败
    pub fn fail_next_reads(&self, count: usize) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Every presign call fails with this message / 签名始终失败
    pub fn fail_signing(&self, message: &str) {
        *self.signing_error.write() = Some(message.to_string());
    }

    /// Delay before every read responds / 每次读取前的延迟
    pub fn delay_reads(&self, delay: Duration) {
        *self.read_delay.write() = Some(delay);
    }

    /// Delay before every chunk is yielded / 每个分块之前的延迟
    pub fn delay_chunks(&self, delay: Duration) {
        *self.chunk_delay.write() = Some(delay);
    }

    /// Next read yields `chunks` chunks, then a connection reset / 下一次读取在若干块后连接重置
    pub fn fail_after_chunks(&self, chunks: usize) {
        *self.break_after.write() = Some(chunks);
    }

    /// Number of get_object calls / get_object 调用次数
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of presign calls / 签名调用次数
    pub fn presigns(&self) -> usize {
        self.presigns.load(Ordering::SeqCst)
    }

    /// Chunks consumers actually pulled from body streams / 实际被读取的分块数
    pub fn chunks_pulled(&self) -> usize {
        self.chunks_pulled.load(Ordering::SeqCst)
    }

    /// Total chunks an object splits into / 对象总分块数
    pub fn chunk_count(&self, bucket: &str, key: &str) -> usize {
        self.objects
            .read()
            .get(&(bucket.to_string(), key.to_string()))
            .map(|data| data.len().div_ceil(self.chunk_size))
            .unwrap_or(0)
    }

    fn take_transient_failure(&self) -> bool {
        self.transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_object(&self, identity: &ObjectIdentity) -> Result<ObjectBody> {
        self.reads.fetch_add(1, Ordering::SeqCst);

        let delay = *self.read_delay.read();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.take_transient_failure() {
            return Err(PreviewError::TransientIo("connection reset by peer".to_string()));
        }

        let object_key = (identity.bucket.clone(), identity.key.clone());
        if self.denied.read().contains(&object_key) {
            return Err(PreviewError::denied(&identity.bucket, &identity.key));
        }
        let data = self
            .objects
            .read()
            .get(&object_key)
            .cloned()
            .ok_or_else(|| PreviewError::not_found(&identity.bucket, &identity.key))?;

        let content_length = data.len() as u64;
        let mut items: Vec<std::io::Result<Bytes>> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| Ok(data.slice(start..(start + self.chunk_size).min(data.len()))))
            .collect();
        if let Some(keep) = self.break_after.write().take() {
            items.truncate(keep);
            items.push(Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            )));
        }

        let pulled = self.chunks_pulled.clone();
        let chunk_delay = *self.chunk_delay.read();
        let stream = futures::stream::iter(items).then(move |item| {
            let pulled = pulled.clone();
            async move {
                if let Some(delay) = chunk_delay {
                    tokio::time::sleep(delay).await;
                }
                pulled.fetch_add(1, Ordering::SeqCst);
                item
            }
        });

        Ok(ObjectBody {
            stream: Box::pin(stream),
            content_length: Some(content_length),
        })
    }

    async fn presign_get(&self, identity: &ObjectIdentity, ttl_secs: u32) -> Result<String> {
        self.presigns.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.signing_error.read().clone() {
            return Err(PreviewError::Signing(message));
        }
        Ok(format!(
            "https://{}.memory.local/{}?X-Amz-Expires={}",
            identity.bucket,
            urlencoding::encode(&identity.key),
            ttl_secs
        ))
    }
}
