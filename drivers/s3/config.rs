//! S3驱动配置

use serde::{Deserialize, Serialize};

/// S3配置
#[derive(Clone, Serialize, Deserialize)]
pub struct S3Config {
    /// 存储桶名称
    pub bucket: String,
    /// S3端点地址，留空则使用 AWS: https://s3.{region}.amazonaws.com
    /// 阿里云OSS: https://oss-{region}.aliyuncs.com
    /// MinIO: http://localhost:9000
    #[serde(default)]
    pub endpoint: String,
    /// 区域
    #[serde(default = "default_region")]
    pub region: String,
    /// Access Key ID
    pub access_key_id: String,
    /// Secret Access Key
    pub secret_access_key: String,
    /// Session Token（用于临时凭证）
    #[serde(default)]
    pub session_token: String,
    /// 强制使用路径风格（而非虚拟主机风格）
    /// MinIO等需要设置为true
    #[serde(default)]
    pub force_path_style: bool,
}

pub fn default_region() -> String {
    "us-east-2".to_string()
}

impl S3Config {
    /// Endpoint actually used for requests / 实际使用的端点
    pub fn resolved_endpoint(&self) -> String {
        if self.endpoint.is_empty() {
            format!("https://s3.{}.amazonaws.com", self.region)
        } else {
            self.endpoint.trim_end_matches('/').to_string()
        }
    }
}

// 不输出密钥
impl std::fmt::Debug for S3Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Config")
            .field("bucket", &self.bucket)
            .field("endpoint", &self.resolved_endpoint())
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"***")
            .field("force_path_style", &self.force_path_style)
            .finish()
    }
}
