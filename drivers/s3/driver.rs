//! S3驱动核心实现
//!
//! 设计原则：
//! - 只提供两个原语：流式读取对象、本地预签名URL
//! - 读取不做预先计算的Range，调用方读够即丢弃流
//! - 预签名是本地计算，不发起网络请求

use async_trait::async_trait;
use futures::StreamExt;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::error::S3Error;
use s3::Region;

use super::config::S3Config;
use crate::error::{PreviewError, Result};
use crate::storage::{ObjectBody, ObjectIdentity, ObjectStore};

/// S3驱动
pub struct S3Driver {
    config: S3Config,
    bucket: Box<Bucket>,
}

impl S3Driver {
    /// 创建新的S3驱动实例
    pub fn new(config: S3Config) -> Result<Self> {
        let bucket = Self::create_bucket(&config)?;
        tracing::debug!("S3 client created: {:?}", config);
        Ok(Self { config, bucket })
    }

    /// 创建S3 Bucket客户端
    fn create_bucket(config: &S3Config) -> Result<Box<Bucket>> {
        let credentials = Credentials::new(
            Some(&config.access_key_id),
            Some(&config.secret_access_key),
            if config.session_token.is_empty() { None } else { Some(&config.session_token) },
            None,
            None,
        )
        .map_err(|e| PreviewError::Configuration(format!("invalid S3 credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: config.resolved_endpoint(),
        };

        let bucket = Bucket::new(&config.bucket, region, credentials)
            .map_err(|e| PreviewError::Configuration(format!("invalid S3 bucket: {}", e)))?;

        let bucket = if config.force_path_style {
            bucket.with_path_style()
        } else {
            bucket
        };

        Ok(bucket)
    }

    /// 获取对象键（去掉开头的斜杠）
    fn object_key<'a>(&self, identity: &'a ObjectIdentity) -> Result<&'a str> {
        if identity.bucket != self.config.bucket {
            return Err(PreviewError::Configuration(format!(
                "client is scoped to bucket {}, not {}",
                self.config.bucket, identity.bucket
            )));
        }
        Ok(identity.key.trim_start_matches('/'))
    }
}

/// Map a non-success HTTP status to the error taxonomy / 将HTTP状态映射为错误
pub fn status_error(status: u16, identity: &ObjectIdentity) -> PreviewError {
    match status {
        404 => PreviewError::not_found(&identity.bucket, &identity.key),
        401 | 403 => PreviewError::denied(&identity.bucket, &identity.key),
        408 | 429 | 500..=599 => {
            PreviewError::TransientIo(format!("S3 returned HTTP {} for {}", status, identity))
        }
        // 301/400 等：区域或端点配置错误
        300..=499 => PreviewError::Configuration(format!(
            "S3 rejected request for {} with HTTP {}, check region and endpoint",
            identity, status
        )),
        _ => PreviewError::TransientIo(format!("unexpected HTTP {} for {}", status, identity)),
    }
}

fn request_error(err: S3Error, identity: &ObjectIdentity) -> PreviewError {
    match err {
        S3Error::HttpFailWithBody(status, _) => status_error(status, identity),
        other => PreviewError::TransientIo(format!("S3 request failed: {}", other)),
    }
}

#[async_trait]
impl ObjectStore for S3Driver {
    fn name(&self) -> &str {
        "S3"
    }

    async fn get_object(&self, identity: &ObjectIdentity) -> Result<ObjectBody> {
        let key = self.object_key(identity)?;

        // 流式获取对象，不读取到内存
        let response = self
            .bucket
            .get_object_stream(key)
            .await
            .map_err(|e| request_error(e, identity))?;

        if !(200..300).contains(&response.status_code) {
            return Err(status_error(response.status_code, identity));
        }

        tracing::debug!("S3 GetObject opened: {}, status={}", identity, response.status_code);

        let stream = response.bytes.map(|chunk| {
            chunk.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
        });

        Ok(ObjectBody {
            stream: Box::pin(stream),
            content_length: None,
        })
    }

    async fn presign_get(&self, identity: &ObjectIdentity, ttl_secs: u32) -> Result<String> {
        let key = self.object_key(identity)?;

        // 生成预签名URL
        self.bucket
            .presign_get(key, ttl_secs, None)
            .await
            .map_err(|e| PreviewError::Signing(format!("failed to presign {}: {}", identity, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> S3Config {
        S3Config {
            bucket: "data".to_string(),
            endpoint: String::new(),
            region: "us-east-2".to_string(),
            access_key_id: "AKIAEXAMPLE".to_string(),
            secret_access_key: "wJalrXUtnFEMI/K7MDENG/bPxRfiCYEXAMPLEKEY".to_string(),
            session_token: String::new(),
            force_path_style: false,
        }
    }

    #[test]
    fn test_status_error() {
        let id = ObjectIdentity::new("data", "big.csv", None);
        assert!(matches!(status_error(404, &id), PreviewError::ObjectNotFound { .. }));
        assert!(matches!(status_error(403, &id), PreviewError::AccessDenied { .. }));
        assert!(matches!(status_error(503, &id), PreviewError::TransientIo(_)));
        assert!(matches!(status_error(429, &id), PreviewError::TransientIo(_)));
        assert!(matches!(status_error(301, &id), PreviewError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_presign_is_local() {
        // 无网络环境下也能签名
        let driver = S3Driver::new(test_config()).unwrap();
        let id = ObjectIdentity::new("data", "exports/big.csv", Some("us-east-2"));
        let url = driver.presign_get(&id, 3600).await.unwrap();
        assert!(url.starts_with("https://"));
        assert!(url.contains("exports/big.csv"));
        assert!(url.contains("X-Amz-Expires=3600"));
        assert!(url.contains("X-Amz-Signature="));
    }

    #[tokio::test]
    async fn test_wrong_bucket_is_configuration_error() {
        let driver = S3Driver::new(test_config()).unwrap();
        let id = ObjectIdentity::new("other", "big.csv", None);
        assert!(matches!(
            driver.presign_get(&id, 60).await,
            Err(PreviewError::Configuration(_))
        ));
    }
}
