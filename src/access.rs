//! Time-limited access granter / 限时访问授权
//!
//! Signs a GET URL for the whole object so the client downloads it straight
//! from the storage provider. Signing is local; the object is never read.
//! Validity is enforced by the provider only; a URL cannot be revoked.
//! With SigV4 a wrong secret is not detectable at signing time, the URL
//! simply fails when it is resolved. / 密钥错误只会在访问链接时由存储服务拒绝

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::error::{PreviewError, Result};
use crate::locator::ObjectLocator;

/// Longest validity SigV4 accepts (7 days) / SigV4 最长有效期
pub const MAX_TTL_SECS: u32 = 604_800;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessGrant {
    pub url: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessGrant {
    /// Seconds left relative to `now` (0 once expired) / 剩余有效秒数
    pub fn expires_in_secs(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds().max(0)
    }

    /// Message for a download link / 下载链接提示文字
    pub fn validity_message(&self, now: DateTime<Utc>) -> String {
        let secs = self.expires_in_secs(now);
        if secs == 0 {
            return "Link expired, request a new one".to_string();
        }
        let (h, m) = (secs / 3600, (secs % 3600) / 60);
        if h > 0 {
            format!("Link valid for {}h {}m (until {})", h, m, self.expires_at.format("%Y-%m-%d %H:%M:%S UTC"))
        } else {
            format!("Link valid for {}m {}s (until {})", m, secs % 60, self.expires_at.format("%Y-%m-%d %H:%M:%S UTC"))
        }
    }
}

/// Stateless, safe to share / 无状态
#[derive(Debug, Clone, Copy, Default)]
pub struct AccessGranter;

impl AccessGranter {
    pub fn new() -> Self {
        Self
    }

    /// Reject ttl outside 1..=MAX_TTL_SECS, no clamping / 超出范围直接拒绝，不截断
    pub fn validate_ttl(ttl_secs: u64) -> Result<u32> {
        if ttl_secs == 0 || ttl_secs > MAX_TTL_SECS as u64 {
            return Err(PreviewError::InvalidArgument(format!(
                "ttl must be between 1 and {} seconds, got {}",
                MAX_TTL_SECS, ttl_secs
            )));
        }
        Ok(ttl_secs as u32)
    }

    pub async fn grant_access(&self, locator: &ObjectLocator, ttl_secs: u64) -> Result<AccessGrant> {
        let ttl = Self::validate_ttl(ttl_secs)?;
        let store = locator.client().map_err(|e| match e {
            PreviewError::Configuration(msg) => PreviewError::Signing(msg),
            other => other,
        })?;

        let issued_at = Utc::now();
        let url = store.presign_get(locator.identity(), ttl).await?;
        let expires_at = issued_at + Duration::seconds(ttl as i64);

        tracing::info!(
            "Access granted: {}, ttl={}s, expires_at={}",
            locator.identity(),
            ttl,
            expires_at.to_rfc3339()
        );

        Ok(AccessGrant {
            url,
            issued_at,
            expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::StorageSettings;
    use crate::storage::{MemoryStore, ObjectIdentity};
    use std::sync::Arc;

    fn locator(store: &Arc<MemoryStore>) -> ObjectLocator {
        ObjectLocator::with_store(ObjectIdentity::new("data", "exports/big file.csv", None), store.clone())
    }

    #[tokio::test]
    async fn test_grant_never_reads_object() {
        let store = Arc::new(MemoryStore::new());
        store.put_object("data", "exports/big file.csv", "a\n1\n");

        let before = Utc::now();
        let grant = AccessGranter::new().grant_access(&locator(&store), 3600).await.unwrap();
        let after = Utc::now();

        assert_eq!(store.reads(), 0);
        assert_eq!(store.presigns(), 1);
        assert!(grant.url.starts_with("https://"));
        assert!(grant.url.contains("exports%2Fbig%20file.csv"));
        assert_eq!(grant.expires_at - grant.issued_at, Duration::seconds(3600));
        assert!(grant.expires_at >= before + Duration::seconds(3600));
        assert!(grant.expires_at <= after + Duration::seconds(3600));
    }

    #[tokio::test]
    async fn test_grant_does_not_require_existing_object() {
        let store = Arc::new(MemoryStore::new());
        let grant = AccessGranter::new().grant_access(&locator(&store), 60).await.unwrap();
        assert!(grant.expires_at > Utc::now());
        assert_eq!(store.reads(), 0);
    }

    #[tokio::test]
    async fn test_ttl_bounds_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        for ttl in [0u64, MAX_TTL_SECS as u64 + 1] {
            assert!(matches!(
                AccessGranter::new().grant_access(&locator(&store), ttl).await,
                Err(PreviewError::InvalidArgument(_))
            ));
        }
        assert!(AccessGranter::new()
            .grant_access(&locator(&store), MAX_TTL_SECS as u64)
            .await
            .is_ok());
        assert_eq!(store.presigns(), 1);
    }

    #[tokio::test]
    async fn test_signing_failure() {
        let store = Arc::new(MemoryStore::new());
        store.fail_signing("invalid key material");
        assert!(matches!(
            AccessGranter::new().grant_access(&locator(&store), 60).await,
            Err(PreviewError::Signing(msg)) if msg.contains("invalid key material")
        ));
    }

    #[tokio::test]
    async fn test_grant_with_s3_driver_is_offline() {
        let settings = StorageSettings {
            access_key_id: Some("AKIAEXAMPLE".to_string()),
            secret_access_key: Some("secret".to_string()),
            bucket: Some("data".to_string()),
            key: Some("big.csv".to_string()),
            ..Default::default()
        };
        let locator = ObjectLocator::new(&settings).unwrap();
        let grant = AccessGranter::new().grant_access(&locator, 900).await.unwrap();
        assert!(grant.url.contains("X-Amz-Expires=900"));
    }

    #[test]
    fn test_validity_message() {
        let issued_at = Utc::now();
        let grant = AccessGrant {
            url: "https://example".to_string(),
            issued_at,
            expires_at: issued_at + Duration::seconds(3600),
        };
        assert_eq!(grant.expires_in_secs(issued_at), 3600);
        assert!(grant.validity_message(issued_at).starts_with("Link valid for 1h 0m"));
        assert!(grant
            .validity_message(issued_at + Duration::seconds(3000))
            .starts_with("Link valid for 10m 0s"));
        assert_eq!(grant.expires_in_secs(issued_at + Duration::seconds(4000)), 0);
        assert!(grant.validity_message(issued_at + Duration::seconds(4000)).contains("expired"));
    }
}
