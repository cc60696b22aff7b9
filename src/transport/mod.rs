//! 属性传输接口
//!
//! 核心只通过这个窄接口访问远端代理：给定 MBean、属性/操作名和可选路径，
//! 返回一个带状态码的响应。HTTP/JSON 的具体实现不在本 crate 内。

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;

pub mod replay;

/// 成功
pub const STATUS_OK: u16 = 200;
/// 远端没有这个 MBean/属性
pub const STATUS_NOT_FOUND: u16 = 404;

/// 一次读取请求
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Request {
    pub mbean: String,
    /// 属性名或操作名
    pub target: String,
    pub path: Option<String>,
}

impl Request {
    pub fn new(mbean: &str, target: &str, path: Option<&str>) -> Self {
        Self {
            mbean: mbean.to_string(),
            target: target.to_string(),
            path: path.map(str::to_string),
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.path {
            Some(path) => write!(f, "{}/{}/{}", self.mbean, self.target, path),
            None => write!(f, "{}/{}", self.mbean, self.target),
        }
    }
}

/// 远端响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    #[serde(default)]
    pub value: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl Response {
    pub fn ok(value: Value) -> Self {
        Self { status: STATUS_OK, value, error: None }
    }

    pub fn not_found(request: &Request) -> Self {
        Self {
            status: STATUS_NOT_FOUND,
            value: Value::Null,
            error: Some(format!("No such attribute: {}", request)),
        }
    }

    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self { status, value: Value::Null, error: Some(message.into()) }
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_found(&self) -> bool {
        self.status == STATUS_NOT_FOUND
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn error_text(&self) -> &str {
        self.error.as_deref().unwrap_or("")
    }
}

/// 属性传输 Trait
///
/// `Err` 只用于传输本身失败；远端的 404/500 等都以 `Response` 返回。
pub trait AttributeTransport {
    fn read(&self, request: &Request) -> Result<Response>;
}

/// 一个会话内共享的传输句柄（单线程）
pub type SharedTransport = Rc<dyn AttributeTransport>;
