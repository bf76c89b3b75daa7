#[cfg(any(test, feature = "memory-store"))]
pub mod memory;

#[cfg(any(test, feature = "memory-store"))]
pub use memory::MemoryStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

use crate::error::Result;

/// Streamed object body / 对象内容字节流
/// Dropping the stream abandons the rest of the object / 丢弃即停止读取剩余内容
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Remote object identity (bucket + key + region) / 远程对象标识
/// Does not imply the object exists / 不代表对象一定存在
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectIdentity {
    pub bucket: String,
    pub key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl ObjectIdentity {
    pub fn new(bucket: &str, key: &str, region: Option<&str>) -> Self {
        Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
            region: region.map(|r| r.to_string()),
        }
    }

    /// File name part of the key / 键中的文件名部分
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

impl std::fmt::Display for ObjectIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

/// Response of a get-object read / 读取对象的响应
pub struct ObjectBody {
    pub stream: ByteStream,
    /// Content length if the backend reports it / 内容长度（如已知）
    pub content_length: Option<u64>,
}

/// Object storage interface (only the two primitives the preview needs)
/// 对象存储接口，仅提供预览所需的两个原语
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Backend name / 后端名称
    fn name(&self) -> &str;

    /// Open a streamed read of the whole object / 流式读取对象
    async fn get_object(&self, identity: &ObjectIdentity) -> Result<ObjectBody>;

    /// Sign a time-limited GET URL locally, no network round trip
    /// 本地生成限时下载链接，不发起网络请求
    async fn presign_get(&self, identity: &ObjectIdentity, ttl_secs: u32) -> Result<String>;
}
