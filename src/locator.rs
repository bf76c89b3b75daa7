//! Object locator / 对象定位器
//!
//! Holds the identity of the previewed object and a lazily created storage
//! client scoped to its region. Credential failures are not transient, so
//! nothing here retries. / 凭证错误不是瞬时错误，这里不做重试

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::drivers::s3::config::default_region;
use crate::drivers::s3::{S3Config, S3Driver};
use crate::error::{PreviewError, Result};
use crate::storage::{ObjectIdentity, ObjectStore};

/// Injected credential / identity values / 注入的凭证与对象设置
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub bucket: Option<String>,
    pub key: Option<String>,
    /// Defaults to us-east-2 / 默认 us-east-2
    pub region: Option<String>,
    /// S3-compatible endpoint (MinIO, OSS, ...) / 兼容S3的自定义端点
    pub endpoint: Option<String>,
    pub session_token: Option<String>,
    pub force_path_style: bool,
}

impl std::fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageSettings")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "***"))
            .field("bucket", &self.bucket)
            .field("key", &self.key)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}

fn required<'a>(name: &str, value: &'a Option<String>) -> Result<&'a str> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(PreviewError::Configuration(format!("missing required value: {}", name))),
    }
}

fn optional(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

pub struct ObjectLocator {
    identity: ObjectIdentity,
    s3: Option<S3Config>,
    client: OnceCell<Arc<dyn ObjectStore>>,
}

impl ObjectLocator {
    /// Validate settings; fails fast on a missing required value / 校验设置，缺失必填项立即失败
    pub fn new(settings: &StorageSettings) -> Result<Self> {
        let access_key_id = required("access_key_id", &settings.access_key_id)?;
        let secret_access_key = required("secret_access_key", &settings.secret_access_key)?;
        let bucket = required("bucket", &settings.bucket)?;
        let key = required("key", &settings.key)?;
        let region = optional(&settings.region)
            .map(str::to_string)
            .unwrap_or_else(default_region);

        let s3 = S3Config {
            bucket: bucket.to_string(),
            endpoint: optional(&settings.endpoint).unwrap_or_default().to_string(),
            region: region.clone(),
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            session_token: optional(&settings.session_token).unwrap_or_default().to_string(),
            force_path_style: settings.force_path_style,
        };

        Ok(Self {
            identity: ObjectIdentity::new(bucket, key, Some(&region)),
            s3: Some(s3),
            client: OnceCell::new(),
        })
    }

    /// Use an existing client (adapters, tests) / 使用已有客户端
    pub fn with_store(identity: ObjectIdentity, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            identity,
            s3: None,
            client: OnceCell::with_value(store),
        }
    }

    pub fn identity(&self) -> &ObjectIdentity {
        &self.identity
    }

    /// Get (or lazily create) the storage client / 获取或延迟创建存储客户端
    pub fn client(&self) -> Result<Arc<dyn ObjectStore>> {
        self.client
            .get_or_try_init(|| {
                let config = self.s3.clone().ok_or_else(|| {
                    PreviewError::Configuration("no storage client configured".to_string())
                })?;
                let driver = S3Driver::new(config)?;
                tracing::info!("Storage client created for {}", self.identity);
                Ok(Arc::new(driver) as Arc<dyn ObjectStore>)
            })
            .cloned()
    }
}

impl std::fmt::Debug for ObjectLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectLocator")
            .field("identity", &self.identity)
            .field("connected", &self.client.get().is_some())
            .finish()
    }
}
