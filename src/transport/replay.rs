//! Replay 传输 - 回放录制好的响应
//!
//! 录制文件格式：
//!
//! ```json
//! { "responses": [
//!     { "mbean": "java.lang:type=Memory", "attribute": "HeapMemoryUsage",
//!       "path": "used", "value": 10485760 },
//!     { "mbean": "acme:type=Server", "attribute": "Version",
//!       "status": 500, "error": "boom" }
//! ] }
//! ```
//!
//! 未录制的坐标一律回答 404。

use serde::Deserialize;
use serde_json::Value;
use std::cell::Cell;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

use super::{AttributeTransport, Request, Response, STATUS_OK};
use crate::error::{JmxError, Result};

#[derive(Debug, Deserialize)]
struct Recording {
    responses: Vec<RecordedResponse>,
}

#[derive(Debug, Deserialize)]
struct RecordedResponse {
    mbean: String,
    attribute: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default = "default_status")]
    status: u16,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    error: Option<String>,
    /// 模拟传输层故障（连接断开等）
    #[serde(default)]
    connection_error: Option<String>,
}

fn default_status() -> u16 {
    STATUS_OK
}

enum Outcome {
    Answer(Response),
    Fail(String),
}

/// 回放传输
#[derive(Default)]
pub struct ReplayTransport {
    responses: HashMap<Request, Outcome>,
    reads: Cell<usize>,
}

impl ReplayTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let recording: Recording = serde_json::from_str(text)?;
        let mut transport = Self::new();
        for entry in recording.responses {
            let request = Request {
                mbean: entry.mbean,
                target: entry.attribute,
                path: entry.path,
            };
            let outcome = match entry.connection_error {
                Some(message) => Outcome::Fail(message),
                None => Outcome::Answer(Response {
                    status: entry.status,
                    value: entry.value,
                    error: entry.error,
                }),
            };
            transport.responses.insert(request, outcome);
        }
        Ok(transport)
    }

    /// 录制一个成功响应
    pub fn with_value(mut self, mbean: &str, attribute: &str, path: Option<&str>, value: Value) -> Self {
        self.responses
            .insert(Request::new(mbean, attribute, path), Outcome::Answer(Response::ok(value)));
        self
    }

    /// 录制一个失败响应
    pub fn with_status(mut self, mbean: &str, attribute: &str, path: Option<&str>, status: u16, message: &str) -> Self {
        self.responses.insert(
            Request::new(mbean, attribute, path),
            Outcome::Answer(Response::error(status, message)),
        );
        self
    }

    /// 录制一个传输层故障
    pub fn with_connection_error(mut self, mbean: &str, attribute: &str, path: Option<&str>, message: &str) -> Self {
        self.responses
            .insert(Request::new(mbean, attribute, path), Outcome::Fail(message.to_string()));
        self
    }

    /// 已处理的读取次数
    pub fn reads(&self) -> usize {
        self.reads.get()
    }
}

impl AttributeTransport for ReplayTransport {
    fn read(&self, request: &Request) -> Result<Response> {
        self.reads.set(self.reads.get() + 1);
        match self.responses.get(request) {
            Some(Outcome::Answer(response)) => {
                debug!("replay {} -> {}", request, response.status);
                Ok(response.clone())
            }
            Some(Outcome::Fail(message)) => Err(JmxError::Connection(message.clone())),
            None => {
                debug!("replay {} -> not recorded", request);
                Ok(Response::not_found(request))
            }
        }
    }
}
