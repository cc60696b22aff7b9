//! jmx-probe - JMX 监控客户端核心
//!
//! 🔌 产品处理器框架：别名解析、自动探测、JVM 报告
//!
//! 传输层只是一个窄接口 ([`transport::AttributeTransport`])，
//! 真正的 HTTP/JSON 网关由外部提供。

pub mod alias;
pub mod client;
pub mod error;
pub mod product;
pub mod transport;

pub use alias::{catalog, Alias, AliasCatalog, AliasKind, AliasRef, Coordinates, Resolution};
pub use client::JmxClient;
pub use error::{JmxError, Result};
pub use product::{AliasTable, CacheKey, Detection, HandlerCore, HandlerRegistry, Order, ProductHandler, Resolved};
pub use transport::{AttributeTransport, Request, Response, SharedTransport};
