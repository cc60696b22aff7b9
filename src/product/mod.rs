// ============================================================================
// ProductHandler Trait - 产品处理器抽象
// ============================================================================
//
// 每种应用服务器一个处理器：
// 1. 把别名解析成该产品的 MBean 坐标
// 2. 探测远端服务器是否是该产品 (autodetect)
// 3. 生成服务器/JVM 诊断报告
//
// 可覆盖的钩子在 trait 上；共享逻辑（别名解析、取值、JVM 报告）
// 实现在 `dyn ProductHandler` 上，所有产品复用。
//
// ============================================================================

use once_cell::unsync::OnceCell;
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::alias::{self, catalog, AliasKind, AliasRef, Coordinates, FullResolver, Resolution};
use crate::error::{JmxError, Result};
use crate::transport::{AttributeTransport, Request, Response, SharedTransport};

pub mod definition;
pub mod registry;
pub mod report;
pub mod unknown;

pub use registry::HandlerRegistry;
pub use unknown::UnknownHandler;

/// 自动探测顺序
///
/// 负数最先，未排序的居中（按注册顺序），非负数最后。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Ordered(i64),
    Unordered,
}

/// 探测结果
#[derive(Debug)]
pub enum Detection {
    Match,
    NoMatch,
    /// 暂时性错误（连接故障等），不等于 "不是该产品"
    Unknown(JmxError),
}

impl Detection {
    pub fn is_match(&self) -> bool {
        matches!(self, Detection::Match)
    }
}

/// 属性缓存键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(key: impl Into<String>) -> Self {
        CacheKey(key.into())
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        CacheKey(key.to_string())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
enum CacheEntry {
    Missing,
    Present(Value),
}

/// 处理器自己的别名表
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    pub attributes: HashMap<String, Resolution>,
    pub operations: HashMap<String, Resolution>,
}

impl AliasTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attribute(mut self, name: &str, resolution: Resolution) -> Self {
        self.attributes.insert(name.to_string(), resolution);
        self
    }

    pub fn operation(mut self, name: &str, resolution: Resolution) -> Self {
        self.operations.insert(name.to_string(), resolution);
        self
    }

    pub fn insert(&mut self, kind: AliasKind, name: &str, resolution: Resolution) {
        match kind {
            AliasKind::Attribute => self.attributes.insert(name.to_string(), resolution),
            AliasKind::Operation => self.operations.insert(name.to_string(), resolution),
        };
    }

    pub fn get(&self, kind: AliasKind, name: &str) -> Option<&Resolution> {
        match kind {
            AliasKind::Attribute => self.attributes.get(name),
            AliasKind::Operation => self.operations.get(name),
        }
    }
}

/// 别名解析结果
#[derive(Clone)]
pub enum Resolved {
    Coordinates(Coordinates),
    /// 自定义解析器，调用方执行它取值
    Dynamic(FullResolver),
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolved::Coordinates(coords) => f.debug_tuple("Coordinates").field(coords).finish(),
            Resolved::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// 处理器共享状态：传输句柄、版本缓存、属性缓存、别名表
///
/// 单会话、单线程使用，不加锁。
pub struct HandlerCore {
    transport: SharedTransport,
    version: OnceCell<Option<String>>,
    cache: RefCell<HashMap<CacheKey, CacheEntry>>,
    aliases: OnceCell<AliasTable>,
}

impl HandlerCore {
    pub fn new(transport: SharedTransport) -> Self {
        Self {
            transport,
            version: OnceCell::new(),
            cache: RefCell::new(HashMap::new()),
            aliases: OnceCell::new(),
        }
    }

    pub fn transport(&self) -> &dyn AttributeTransport {
        self.transport.as_ref()
    }

    /// 发起一次读取
    pub fn read(&self, request: &Request) -> Result<Response> {
        debug!("read {}", request);
        self.transport.read(request)
    }

    /// 读取并区分三种结果：值 / 404 (None) / 致命错误
    pub fn read_value(&self, request: &Request) -> Result<Option<Value>> {
        let response = self.read(request)?;
        if response.is_not_found() {
            Ok(None)
        } else if response.is_ok() {
            Ok(Some(response.value))
        } else {
            Err(transport_error(request, &response))
        }
    }

    /// 版本只探测一次；探测出错不缓存
    pub fn version_with<F>(&self, probe: F) -> Result<Option<String>>
    where
        F: FnOnce() -> Result<Option<String>>,
    {
        self.version.get_or_try_init(probe).cloned()
    }

    /// 每个缓存键只读取一次属性
    ///
    /// 404 -> false，成功 -> true，其他状态 -> 错误（不缓存）。
    pub fn try_attribute(
        &self,
        key: impl Into<CacheKey>,
        mbean: &str,
        attribute: &str,
        path: Option<&str>,
    ) -> Result<bool> {
        let key = key.into();
        if let Some(entry) = self.cache.borrow().get(&key) {
            debug!("cache hit {}", key);
            return Ok(matches!(entry, CacheEntry::Present(_)));
        }

        let request = Request::new(mbean, attribute, path);
        let entry = match self.read_value(&request)? {
            Some(value) => CacheEntry::Present(value),
            None => CacheEntry::Missing,
        };
        let found = matches!(entry, CacheEntry::Present(_));
        self.cache.borrow_mut().insert(key, entry);
        Ok(found)
    }

    /// 取回 `try_attribute` 缓存的值；未缓存或 404 时为 None
    pub fn cached_attribute(&self, key: impl Into<CacheKey>) -> Option<Value> {
        let key: CacheKey = key.into();
        match self.cache.borrow().get(&key) {
            Some(CacheEntry::Present(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// 别名表只构建一次，缺 SERVER_VERSION 时补上默认解析器
    fn aliases<F>(&self, init: F) -> &AliasTable
    where
        F: FnOnce() -> AliasTable,
    {
        self.aliases.get_or_init(|| {
            let mut table = init();
            table
                .attributes
                .entry(alias::SERVER_VERSION.to_string())
                .or_insert_with(|| Resolution::full(|handler| Ok(handler.version()?.map(Value::String))));
            table
        })
    }
}

fn transport_error(request: &Request, response: &Response) -> JmxError {
    JmxError::Transport {
        status: response.status,
        target: request.to_string(),
        message: response.error_text().to_string(),
    }
}

/// 产品处理器 trait
pub trait ProductHandler {
    /// 唯一、稳定的小写标识
    fn id(&self) -> &str;

    fn name(&self) -> &str {
        self.id()
    }

    fn order(&self) -> Order {
        Order::Unordered
    }

    fn jsr77(&self) -> bool {
        false
    }

    fn core(&self) -> &HandlerCore;

    /// 产品特定的版本探测
    ///
    /// 签名属性 404 时返回 `Ok(None)`（不是该产品），其他失败必须返回错误。
    fn try_detect_version(&self) -> Result<Option<String>>;

    /// 处理器自己的别名表，默认为空
    fn init_aliases(&self) -> AliasTable {
        AliasTable::default()
    }

    /// 版本（缓存）。需在自动探测之后调用。
    fn version(&self) -> Result<Option<String>> {
        self.core().version_with(|| self.try_detect_version())
    }

    /// 默认：版本能解析出来就算匹配
    fn autodetect(&self) -> Detection {
        match self.version() {
            Ok(Some(_)) => Detection::Match,
            Ok(None) => Detection::NoMatch,
            Err(e) => Detection::Unknown(e),
        }
    }

    fn server_info(&self, _verbose: bool) -> Result<String> {
        let version = self.version()?.unwrap_or_default();
        Ok(format!(
            "{:<10} {}\n{:<10} {}\n",
            "Name:",
            self.name(),
            "Version:",
            version
        ))
    }
}

impl dyn ProductHandler + '_ {
    /// 别名 -> 坐标
    ///
    /// `Ok(None)` 表示本处理器不认识该别名且目录中没有默认值。
    pub fn resolve_alias<'a>(&self, alias: impl Into<AliasRef<'a>>) -> Result<Option<Resolved>> {
        let alias = alias.into().resolve(catalog())?;
        let table = self.core().aliases(|| self.init_aliases());

        let resolution = match table.get(alias.kind, &alias.name).or(alias.default.as_ref()) {
            Some(resolution) => resolution,
            None => return Ok(None),
        };

        let coords = match resolution {
            Resolution::Full(resolver) => return Ok(Some(Resolved::Dynamic(resolver.clone()))),
            Resolution::Lazy(provider) => provider(self)?.ok_or_else(|| {
                JmxError::inconsistent(self.id(), &alias.name, "lazy provider yielded no coordinates")
            })?,
            Resolution::Static(coords) => coords.clone(),
        };

        if coords.kind() != alias.kind {
            return Err(JmxError::inconsistent(
                self.id(),
                &alias.name,
                format!("{} alias resolved to {} coordinates {}", alias.kind, coords.kind(), coords),
            ));
        }
        Ok(Some(Resolved::Coordinates(coords)))
    }

    /// 通过别名取值；404 或未解析时为 None
    pub fn get_attribute<'a>(&self, alias: impl Into<AliasRef<'a>>) -> Result<Option<Value>> {
        match self.resolve_alias(alias)? {
            None => Ok(None),
            Some(Resolved::Dynamic(resolver)) => resolver(self),
            Some(Resolved::Coordinates(coords)) => self.core().read_value(&coords.to_request()),
        }
    }

    pub fn try_attribute(
        &self,
        key: impl Into<CacheKey>,
        mbean: &str,
        attribute: &str,
        path: Option<&str>,
    ) -> Result<bool> {
        self.core().try_attribute(key, mbean, attribute, path)
    }

    pub fn jvm_info(&self, verbose: bool) -> Result<String> {
        report::jvm_info(self, verbose)
    }

    /// 服务器信息 + 分隔线 + JVM 信息
    pub fn info(&self, verbose: bool) -> Result<String> {
        let mut out = self.server_info(verbose)?;
        out.push_str(report::RULE);
        out.push('\n');
        out.push_str(&self.jvm_info(verbose)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alias::{Alias, MEMORY_GC, MEMORY_HEAP_USED, SERVER_NAME, SERVER_VERSION};
    use crate::transport::replay::ReplayTransport;
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    const ACME_BEAN: &str = "acme:type=Server";

    /// 测试用处理器：版本来自 acme:type=Server/Version
    struct AcmeHandler {
        core: HandlerCore,
        aliases: AliasTable,
        probes: Cell<usize>,
    }

    impl AcmeHandler {
        fn new(transport: SharedTransport, aliases: AliasTable) -> Self {
            Self { core: HandlerCore::new(transport), aliases, probes: Cell::new(0) }
        }
    }

    impl ProductHandler for AcmeHandler {
        fn id(&self) -> &str {
            "acme"
        }

        fn core(&self) -> &HandlerCore {
            &self.core
        }

        fn try_detect_version(&self) -> Result<Option<String>> {
            self.probes.set(self.probes.get() + 1);
            let value = self.core.read_value(&Request::new(ACME_BEAN, "Version", None))?;
            Ok(value.and_then(|v| v.as_str().map(str::to_string)))
        }

        fn init_aliases(&self) -> AliasTable {
            self.aliases.clone()
        }
    }

    fn acme(transport: ReplayTransport, aliases: AliasTable) -> (Rc<ReplayTransport>, AcmeHandler) {
        let transport = Rc::new(transport);
        let handler = AcmeHandler::new(transport.clone(), aliases);
        (transport, handler)
    }

    fn coords(resolved: Option<Resolved>) -> Coordinates {
        match resolved {
            Some(Resolved::Coordinates(c)) => c,
            other => panic!("expected coordinates, got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let (_, handler) = acme(ReplayTransport::new(), AliasTable::new());
        assert_eq!(handler.name(), "acme");
        assert_eq!(handler.order(), Order::Unordered);
        assert!(!handler.jsr77());
    }

    #[test]
    fn test_static_resolution_arity() {
        let table = AliasTable::new()
            .attribute(SERVER_NAME, Resolution::attribute(ACME_BEAN, "Name", None))
            .operation(MEMORY_GC, Resolution::operation("acme:type=Memory", "collect"));
        let (_, handler) = acme(ReplayTransport::new(), table);
        let h: &dyn ProductHandler = &handler;

        let name = coords(h.resolve_alias(SERVER_NAME).unwrap());
        assert_eq!(name.arity(), 2);
        assert_eq!(name, Coordinates::attribute(ACME_BEAN, "Name", None));

        let gc = coords(h.resolve_alias(MEMORY_GC).unwrap());
        assert_eq!(gc, Coordinates::operation("acme:type=Memory", "collect"));
        assert_eq!(gc.arity(), 2);

        // 目录默认值
        let heap = coords(h.resolve_alias(MEMORY_HEAP_USED).unwrap());
        assert_eq!(heap.arity(), 3);
    }

    #[test]
    fn test_unresolved_and_unknown_alias() {
        let (_, handler) = acme(ReplayTransport::new(), AliasTable::new());
        let h: &dyn ProductHandler = &handler;
        assert!(h.resolve_alias(SERVER_NAME).unwrap().is_none());
        assert!(matches!(h.resolve_alias("NOPE"), Err(JmxError::UnknownAlias(_))));
    }

    #[test]
    fn test_resolve_by_alias_object() {
        let alias = Alias {
            name: SERVER_NAME.to_string(),
            kind: AliasKind::Attribute,
            description: String::new(),
            default: Some(Resolution::attribute("x:type=Y", "Z", None)),
        };
        let (_, handler) = acme(ReplayTransport::new(), AliasTable::new());
        let h: &dyn ProductHandler = &handler;
        let resolved = coords(h.resolve_alias(&alias).unwrap());
        assert_eq!(resolved, Coordinates::attribute("x:type=Y", "Z", None));
    }

    #[test]
    fn test_lazy_provider_uses_handler_state() {
        let table = AliasTable::new().attribute(
            SERVER_NAME,
            Resolution::lazy(|h| {
                let version = h.version()?.unwrap_or_default();
                Ok(Some(Coordinates::attribute(&format!("acme:type=Server,v={}", version), "Name", Some("short"))))
            }),
        );
        let transport = ReplayTransport::new().with_value(ACME_BEAN, "Version", None, json!("7.1"));
        let (_, handler) = acme(transport, table);
        let h: &dyn ProductHandler = &handler;
        let resolved = coords(h.resolve_alias(SERVER_NAME).unwrap());
        assert_eq!(resolved, Coordinates::attribute("acme:type=Server,v=7.1", "Name", Some("short")));
        assert_eq!(resolved.arity(), 3);
    }

    #[test]
    fn test_lazy_provider_without_coordinates_is_fatal() {
        let table = AliasTable::new().attribute(SERVER_NAME, Resolution::lazy(|_| Ok(None)));
        let (_, handler) = acme(ReplayTransport::new(), table);
        let h: &dyn ProductHandler = &handler;
        let err = h.resolve_alias(SERVER_NAME).unwrap_err();
        assert!(matches!(err, JmxError::InternalConsistency { .. }));
    }

    #[test]
    fn test_kind_mismatch_is_fatal() {
        let table = AliasTable::new()
            .attribute(SERVER_NAME, Resolution::lazy(|_| Ok(Some(Coordinates::operation(ACME_BEAN, "stop")))))
            .operation(MEMORY_GC, Resolution::attribute(ACME_BEAN, "Name", None));
        let (_, handler) = acme(ReplayTransport::new(), table);
        let h: &dyn ProductHandler = &handler;
        assert!(matches!(h.resolve_alias(SERVER_NAME), Err(JmxError::InternalConsistency { .. })));
        assert!(matches!(h.resolve_alias(MEMORY_GC), Err(JmxError::InternalConsistency { .. })));
    }

    #[test]
    fn test_full_resolver_is_returned_as_dynamic() {
        let table = AliasTable::new().attribute(SERVER_NAME, Resolution::full(|h| Ok(Some(json!(format!("{}-node", h.id()))))));
        let (transport, handler) = acme(ReplayTransport::new(), table);
        let h: &dyn ProductHandler = &handler;
        assert!(matches!(h.resolve_alias(SERVER_NAME).unwrap(), Some(Resolved::Dynamic(_))));
        assert_eq!(h.get_attribute(SERVER_NAME).unwrap(), Some(json!("acme-node")));
        assert_eq!(transport.reads(), 0);
    }

    #[test]
    fn test_server_version_is_synthesized() {
        let transport = ReplayTransport::new().with_value(ACME_BEAN, "Version", None, json!("3.0"));
        let (_, handler) = acme(transport, AliasTable::new());
        let h: &dyn ProductHandler = &handler;
        assert!(matches!(h.resolve_alias(SERVER_VERSION).unwrap(), Some(Resolved::Dynamic(_))));
        assert_eq!(h.get_attribute(SERVER_VERSION).unwrap(), Some(json!("3.0")));
    }

    #[test]
    fn test_own_server_version_wins() {
        let table = AliasTable::new().attribute(SERVER_VERSION, Resolution::attribute(ACME_BEAN, "Release", None));
        let (_, handler) = acme(ReplayTransport::new(), table);
        let h: &dyn ProductHandler = &handler;
        let resolved = coords(h.resolve_alias(SERVER_VERSION).unwrap());
        assert_eq!(resolved, Coordinates::attribute(ACME_BEAN, "Release", None));
    }

    #[test]
    fn test_version_is_memoized() {
        let transport = ReplayTransport::new().with_value(ACME_BEAN, "Version", None, json!("1.2"));
        let (transport, handler) = acme(transport, AliasTable::new());
        assert_eq!(handler.version().unwrap().as_deref(), Some("1.2"));
        assert_eq!(handler.version().unwrap().as_deref(), Some("1.2"));
        assert_eq!(handler.probes.get(), 1);
        assert_eq!(transport.reads(), 1);
    }

    #[test]
    fn test_autodetect_not_found_is_no_match() {
        let (_, handler) = acme(ReplayTransport::new(), AliasTable::new());
        assert!(matches!(handler.autodetect(), Detection::NoMatch));
    }

    #[test]
    fn test_autodetect_transport_error_is_unknown() {
        let transport = ReplayTransport::new().with_status(ACME_BEAN, "Version", None, 500, "boom");
        let (_, handler) = acme(transport, AliasTable::new());
        match handler.autodetect() {
            Detection::Unknown(JmxError::Transport { status, .. }) => assert_eq!(status, 500),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_try_attribute_fetches_once_per_key() {
        let transport = ReplayTransport::new().with_value(ACME_BEAN, "Name", None, json!("node-1"));
        let (transport, handler) = acme(transport, AliasTable::new());
        let h: &dyn ProductHandler = &handler;

        for _ in 0..5 {
            assert!(h.try_attribute("is_acme", ACME_BEAN, "Name", None).unwrap());
        }
        assert_eq!(transport.reads(), 1);
        assert_eq!(handler.core().cached_attribute("is_acme"), Some(json!("node-1")));

        for _ in 0..3 {
            assert!(!h.try_attribute("has_cluster", "acme:type=Cluster", "Size", None).unwrap());
        }
        assert_eq!(transport.reads(), 2);
        assert_eq!(handler.core().cached_attribute("has_cluster"), None);
    }

    #[test]
    fn test_try_attribute_error_propagates() {
        let transport = ReplayTransport::new().with_status(ACME_BEAN, "Name", None, 403, "forbidden");
        let (transport, handler) = acme(transport, AliasTable::new());
        let core = handler.core();
        assert!(matches!(core.try_attribute("k", ACME_BEAN, "Name", None), Err(JmxError::Transport { status: 403, .. })));
        // 错误不缓存
        assert!(core.try_attribute("k", ACME_BEAN, "Name", None).is_err());
        assert_eq!(transport.reads(), 2);
    }

    #[test]
    fn test_get_attribute_error_and_not_found() {
        let transport = ReplayTransport::new().with_status(
            "java.lang:type=Memory",
            "HeapMemoryUsage",
            Some("used"),
            500,
            "boom",
        );
        let (_, handler) = acme(transport, AliasTable::new());
        let h: &dyn ProductHandler = &handler;
        assert!(matches!(h.get_attribute(MEMORY_HEAP_USED), Err(JmxError::Transport { .. })));
        assert_eq!(h.get_attribute(crate::alias::CL_LOADED).unwrap(), None);
    }
}
