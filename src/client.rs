//! 监控会话 - 一个连接 + 探测出的处理器
//!
//! 每个被监控的服务器一个会话；处理器的缓存不跨会话共享。

use serde_json::Value;

use crate::alias::AliasRef;
use crate::error::Result;
use crate::product::{HandlerRegistry, ProductHandler, Resolved};
use crate::transport::{Request, SharedTransport};

pub struct JmxClient {
    handler: Box<dyn ProductHandler>,
}

impl JmxClient {
    /// 建立会话并自动探测产品
    pub fn connect(transport: SharedTransport, registry: &HandlerRegistry) -> Self {
        Self { handler: registry.autodetect(&transport) }
    }

    /// 跳过探测，直接指定处理器
    pub fn with_handler(handler: Box<dyn ProductHandler>) -> Self {
        Self { handler }
    }

    pub fn handler(&self) -> &dyn ProductHandler {
        self.handler.as_ref()
    }

    pub fn resolve_alias<'a>(&self, alias: impl Into<AliasRef<'a>>) -> Result<Option<Resolved>> {
        self.handler().resolve_alias(alias)
    }

    pub fn get_attribute<'a>(&self, alias: impl Into<AliasRef<'a>>) -> Result<Option<Value>> {
        self.handler().get_attribute(alias)
    }

    /// 不经别名，直接读取坐标；404 为 None
    pub fn read(&self, mbean: &str, attribute: &str, path: Option<&str>) -> Result<Option<Value>> {
        self.handler.core().read_value(&Request::new(mbean, attribute, path))
    }

    pub fn info(&self, verbose: bool) -> Result<String> {
        self.handler().info(verbose)
    }
}
