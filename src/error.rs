//! 错误类型
//!
//! 只有 404 (NotFound) 不是错误：它是 `Response` 的正常状态，
//! 表示 "这台服务器上没有这个 MBean/属性"。

use std::io;
use thiserror::Error;

/// 使用 [`JmxError`] 的 Result 别名
pub type Result<T> = std::result::Result<T, JmxError>;

/// JMX 客户端核心错误
#[derive(Error, Debug)]
pub enum JmxError {
    /// 别名不在目录中
    #[error("Unknown alias: {0}")]
    UnknownAlias(String),

    /// 远端返回了非 404 的失败状态
    #[error("Request {target} failed with status {status}: {message}")]
    Transport {
        status: u16,
        target: String,
        message: String,
    },

    /// 传输层本身失败（连接中断、超时等）
    #[error("Connection error: {0}")]
    Connection(String),

    /// Resolution 违反契约 —— 处理器编写错误
    #[error("Handler '{handler}' alias {alias}: {reason}")]
    InternalConsistency {
        handler: String,
        alias: String,
        reason: String,
    },

    /// 产品定义文件无效
    #[error("Invalid product definition {source_name}: {reason}")]
    Definition { source_name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl JmxError {
    pub fn inconsistent(handler: &str, alias: &str, reason: impl Into<String>) -> Self {
        JmxError::InternalConsistency {
            handler: handler.to_string(),
            alias: alias.to_string(),
            reason: reason.into(),
        }
    }
}
