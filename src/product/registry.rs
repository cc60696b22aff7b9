// ============================================================================
// 处理器注册表 - 自动探测链
// ============================================================================
//
// 注册表只保存构造器（启动时构建，之后只读，可跨会话共享）。
// 每个会话用自己的传输实例化一组处理器，按顺序探测：
//
//   负数 order  ->  未排序（注册顺序）  ->  非负 order  ->  兜底处理器
//
// 第一个匹配者胜出；探测报错只记日志并继续。
//
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::definition::{self, DefinedHandler};
use super::unknown::UnknownHandler;
use super::{Detection, Order, ProductHandler};
use crate::error::Result;
use crate::transport::SharedTransport;

/// 处理器构造器
pub type HandlerFactory = Arc<dyn Fn(SharedTransport) -> Box<dyn ProductHandler> + Send + Sync>;

pub struct HandlerRegistry {
    factories: Vec<HandlerFactory>,
    fallback: HandlerFactory,
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new(|transport| Box::new(UnknownHandler::new(transport)))
    }
}

impl HandlerRegistry {
    pub fn new<F>(fallback: F) -> Self
    where
        F: Fn(SharedTransport) -> Box<dyn ProductHandler> + Send + Sync + 'static,
    {
        Self {
            factories: Vec::new(),
            fallback: Arc::new(fallback),
        }
    }

    pub fn register<F>(&mut self, factory: F)
    where
        F: Fn(SharedTransport) -> Box<dyn ProductHandler> + Send + Sync + 'static,
    {
        self.factories.push(Arc::new(factory));
    }

    /// 加载目录下所有产品定义，返回加载数量
    pub fn load_definitions(&mut self, dir: &Path) -> Result<usize> {
        let products = definition::load_dir(dir)?;
        let count = products.len();
        for product in products {
            info!("Loaded product definition '{}'", product.id());
            self.register(move |transport| Box::new(DefinedHandler::new(product.clone(), transport)));
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// 为一个会话实例化所有处理器，按探测顺序排序（不含兜底）
    pub fn handlers(&self, transport: &SharedTransport) -> Vec<Box<dyn ProductHandler>> {
        let mut handlers: Vec<Box<dyn ProductHandler>> =
            self.factories.iter().map(|factory| factory(transport.clone())).collect();
        sort_handlers(&mut handlers);
        handlers
    }

    pub fn fallback(&self, transport: &SharedTransport) -> Box<dyn ProductHandler> {
        (self.fallback)(transport.clone())
    }

    /// 自动探测：第一个匹配的处理器，否则兜底
    pub fn autodetect(&self, transport: &SharedTransport) -> Box<dyn ProductHandler> {
        for handler in self.handlers(transport) {
            match handler.autodetect() {
                Detection::Match => {
                    info!("Detected product '{}'", handler.id());
                    return handler;
                }
                Detection::NoMatch => debug!("'{}' does not match", handler.id()),
                Detection::Unknown(e) => warn!("Detection of '{}' failed: {}", handler.id(), e),
            }
        }
        let fallback = self.fallback(transport);
        info!("No product matched, using '{}'", fallback.id());
        fallback
    }
}

/// 负数 < 未排序 < 非负数；同组内稳定
fn sort_key(order: Order) -> (u8, i64) {
    match order {
        Order::Ordered(n) if n < 0 => (0, n),
        Order::Unordered => (1, 0),
        Order::Ordered(n) => (2, n),
    }
}

pub fn sort_handlers(handlers: &mut [Box<dyn ProductHandler>]) {
    handlers.sort_by_key(|handler| sort_key(handler.order()));
}
