//! 兜底处理器 - 没有任何产品匹配时使用

use super::{Detection, HandlerCore, Order, ProductHandler};
use crate::error::Result;
use crate::transport::SharedTransport;

/// 兜底处理器的顺序，保证排在所有产品之后
pub const FALLBACK_ORDER: i64 = 10_000;

pub struct UnknownHandler {
    core: HandlerCore,
}

impl UnknownHandler {
    pub fn new(transport: SharedTransport) -> Self {
        Self { core: HandlerCore::new(transport) }
    }
}

impl ProductHandler for UnknownHandler {
    fn id(&self) -> &str {
        "unknown"
    }

    fn name(&self) -> &str {
        "Unknown"
    }

    fn order(&self) -> Order {
        Order::Ordered(FALLBACK_ORDER)
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn try_detect_version(&self) -> Result<Option<String>> {
        Ok(None)
    }

    /// 总是匹配
    fn autodetect(&self) -> Detection {
        Detection::Match
    }

    fn server_info(&self, _verbose: bool) -> Result<String> {
        Ok(format!("{:<10} {}\n", "Name:", "Unknown application server"))
    }
}
