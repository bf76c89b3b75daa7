//! Application configuration module / 应用配置模块
//!
//! Manages application configuration loaded from config.json
//! Creates default config file on first run / 首次运行时创建默认配置文件
//!
//! This is the credential provider for the binary only. The library core
//! takes `StorageSettings` as an explicit value. / 核心库只接受显式传入的设置

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::fetcher::FetchOptions;
use crate::locator::StorageSettings;

/// Environment variable overriding the config file path / 配置文件路径环境变量
pub const CONFIG_PATH_ENV: &str = "CSV_PREVIEW_CONFIG";

/// Application configuration / 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration / 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// Object location and credentials / 对象位置与凭证
    #[serde(default)]
    pub storage: StorageSettings,
    /// Preview fetch configuration / 预览配置
    #[serde(default)]
    pub preview: PreviewConfig,
    /// Presigned URL configuration / 预签名链接配置
    #[serde(default)]
    pub access: AccessConfig,
}

/// Server configuration / 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server host address / 服务器监听地址
    pub host: String,
    /// Server port / 服务器端口
    pub port: u16,
}

/// Preview configuration / 预览配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Rows fetched when the caller gives no limit / 默认预览行数
    pub default_row_limit: usize,
    /// Largest row limit a caller may request / 允许的最大行数
    pub max_row_limit: usize,
    /// Allow unbounded fetches (may read the whole object) / 是否允许不限行数
    pub allow_unbounded: bool,
    /// Per-attempt fetch timeout (seconds) / 单次读取超时
    pub fetch_timeout_secs: u64,
    /// Retries for transient I/O errors / 瞬时错误重试次数
    pub max_retries: u32,
    /// Backoff step between retries (milliseconds) / 重试退避步长
    pub retry_backoff_ms: u64,
    /// Cache expiration (seconds, 0 = never) / 缓存过期时间
    pub cache_ttl_secs: u64,
    /// Previews kept in the cache / 缓存的预览数上限
    pub cache_max_entries: usize,
}

/// Presigned URL configuration / 预签名链接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    /// Default URL validity (seconds) / 默认有效期（秒）
    pub default_ttl_secs: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8501,
        }
    }
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            default_row_limit: 50,
            max_row_limit: 100_000,
            allow_unbounded: false,
            fetch_timeout_secs: 60,
            max_retries: 2,
            retry_backoff_ms: 500,
            cache_ttl_secs: 0,
            cache_max_entries: crate::cache::DEFAULT_MAX_ENTRIES,
        }
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            default_ttl_secs: 3600,
        }
    }
}

impl PreviewConfig {
    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            timeout: Duration::from_secs(self.fetch_timeout_secs.max(1)),
            max_retries: self.max_retries,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        if self.cache_ttl_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.cache_ttl_secs))
        }
    }
}

impl AppConfig {
    /// Get the server bind address / 获取服务器绑定地址
    pub fn get_bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Get the config file path / 获取配置文件路径
pub fn get_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("config.json")
}

/// Load configuration from file, or create default if not exists / 加载配置文件，不存在则创建默认配置
pub fn load_config(config_path: &Path) -> Result<AppConfig, String> {
    if config_path.exists() {
        // Load existing config / 加载现有配置
        let content = std::fs::read_to_string(config_path)
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let config: AppConfig = serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse config file: {}", e))?;

        tracing::info!("Loaded configuration from {:?}", config_path);
        Ok(config)
    } else {
        // Create default config / 创建默认配置
        let config = AppConfig::default();
        save_config(config_path, &config)?;
        tracing::info!("Created default configuration at {:?}", config_path);
        Ok(config)
    }
}

/// Save configuration to file / 保存配置到文件
pub fn save_config(config_path: &Path, config: &AppConfig) -> Result<(), String> {
    let content = serde_json::to_string_pretty(config)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;

    std::fs::write(config_path, content)
        .map_err(|e| format!("Failed to write config file: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_creates_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = load_config(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.preview.default_row_limit, 50);
        assert_eq!(config.access.default_ttl_secs, 3600);
        assert_eq!(config.get_bind_address(), "0.0.0.0:8501");
        assert!(config.storage.bucket.is_none());
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                "storage": {
                    "access_key_id": "AKIA",
                    "secret_access_key": "secret",
                    "bucket": "data",
                    "key": "exports/big.csv"
                },
                "preview": { "default_row_limit": 500, "cache_ttl_secs": 30 }
            }"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.storage.bucket.as_deref(), Some("data"));
        assert_eq!(config.preview.default_row_limit, 500);
        assert_eq!(config.preview.max_retries, 2);
        assert_eq!(config.preview.cache_ttl(), Some(Duration::from_secs(30)));
        assert_eq!(config.preview.cache_max_entries, 8);
        assert_eq!(config.server.port, 8501);
    }

    #[test]
    fn test_load_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_config(&path).unwrap_err().starts_with("Failed to parse"));
    }
}
