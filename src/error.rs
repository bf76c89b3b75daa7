//! Error taxonomy for preview / access operations / 预览与访问错误分类
//!
//! Every failure is scoped to the single operation that raised it.
//! Only `TransientIo` is eligible for retry.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PreviewError>;

#[derive(Debug, Clone, Error)]
pub enum PreviewError {
    /// Missing or invalid credentials / identity / 配置缺失或无效
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("object not found: s3://{bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("access denied: s3://{bucket}/{key}")]
    AccessDenied { bucket: String, key: String },

    /// Byte stream is not parseable as CSV / 数据无法解析为表格
    #[error("malformed data{}: {message}", location(.row, .byte))]
    MalformedData {
        row: Option<u64>,
        byte: Option<u64>,
        message: String,
    },

    /// Network level failure or timeout / 网络错误或超时
    #[error("transient I/O error: {0}")]
    TransientIo(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("unknown column: {0}")]
    UnknownColumn(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Nothing has been loaded into the session yet / 会话中尚无预览数据
    #[error("no preview loaded")]
    NoPreview,
}

impl PreviewError {
    /// Whether a bounded retry may succeed / 是否可重试
    pub fn is_retryable(&self) -> bool {
        matches!(self, PreviewError::TransientIo(_))
    }

    pub(crate) fn not_found(bucket: &str, key: &str) -> Self {
        PreviewError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn denied(bucket: &str, key: &str) -> Self {
        PreviewError::AccessDenied {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }
}

impl From<csv::Error> for PreviewError {
    fn from(err: csv::Error) -> Self {
        if err.is_io_error() {
            return PreviewError::TransientIo(err.to_string());
        }
        let (row, byte) = match err.position() {
            Some(pos) => (Some(pos.line()), Some(pos.byte())),
            None => (None, None),
        };
        PreviewError::MalformedData {
            row,
            byte,
            message: err.to_string(),
        }
    }
}

fn location(row: &Option<u64>, byte: &Option<u64>) -> String {
    match (*row, *byte) {
        (Some(row), Some(byte)) => format!(" at line {} (byte {})", row, byte),
        (Some(row), None) => format!(" at line {}", row),
        (None, Some(byte)) => format!(" at byte {}", byte),
        (None, None) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transient_is_retryable() {
        assert!(PreviewError::TransientIo("reset".into()).is_retryable());
        assert!(!PreviewError::not_found("b", "k").is_retryable());
        assert!(!PreviewError::denied("b", "k").is_retryable());
        assert!(!PreviewError::Signing("x".into()).is_retryable());
        assert!(!PreviewError::Configuration("bucket".into()).is_retryable());
    }

    #[test]
    fn test_display_includes_identity_and_location() {
        assert_eq!(
            PreviewError::not_found("data", "big.csv").to_string(),
            "object not found: s3://data/big.csv"
        );
        let err = PreviewError::MalformedData {
            row: Some(3),
            byte: Some(42),
            message: "found record with 2 fields".into(),
        };
        assert_eq!(
            err.to_string(),
            "malformed data at line 3 (byte 42): found record with 2 fields"
        );
    }
}
