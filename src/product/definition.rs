//! 产品定义 - 用 YAML 声明的产品处理器
//!
//! ```yaml
//! id: acme
//! name: Acme Server
//! order: -5
//! version:
//!   mbean: "acme:type=Server"
//!   attribute: Version
//!   pattern: "(\\d+(\\.\\d+)*)"
//! detect:
//!   mbean: "acme:type=Server"
//!   attribute: Name
//! aliases:
//!   attributes:
//!     SERVER_NAME: { mbean: "acme:type=Server", attribute: Name }
//!     SERVER_ADDRESS: { mbean: "acme:type=Connector,v={version}", attribute: Address }
//!   operations:
//!     MEMORY_GC: { mbean: "acme:type=Memory", operation: collect }
//! ```
//!
//! 坐标里出现 `{version}` 时生成惰性解析，用处理器缓存的版本替换。

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use walkdir::WalkDir;

use super::report::display_value;
use super::{AliasTable, Detection, HandlerCore, Order, ProductHandler};
use crate::alias::{catalog, AliasKind, Coordinates, Resolution};
use crate::error::{JmxError, Result};
use crate::transport::{Request, SharedTransport};

const VERSION_PLACEHOLDER: &str = "{version}";

/// 合法的处理器 id
static ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z][a-z0-9_-]*$").unwrap());

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDefinition {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    order: Option<i64>,
    #[serde(default)]
    jsr77: bool,
    version: VersionProbe,
    #[serde(default)]
    detect: Option<AttributeSpec>,
    #[serde(default)]
    aliases: RawAliases,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct VersionProbe {
    mbean: String,
    attribute: String,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    pattern: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct AttributeSpec {
    mbean: String,
    attribute: String,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct OperationSpec {
    mbean: String,
    operation: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawAliases {
    #[serde(default)]
    attributes: BTreeMap<String, AttributeSpec>,
    #[serde(default)]
    operations: BTreeMap<String, OperationSpec>,
}

/// 编译后的产品定义（只读，可跨会话共享）
#[derive(Debug)]
pub struct DefinedProduct {
    id: String,
    name: String,
    order: Order,
    jsr77: bool,
    version_request: Request,
    version_pattern: Option<Regex>,
    detect: Option<AttributeSpec>,
    aliases: AliasTable,
}

impl DefinedProduct {
    pub fn from_yaml(text: &str, source_name: &str) -> Result<Self> {
        let raw: RawDefinition = serde_yaml::from_str(text)?;
        Self::compile(raw, source_name)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    fn compile(raw: RawDefinition, source_name: &str) -> Result<Self> {
        let invalid = |reason: String| JmxError::Definition {
            source_name: source_name.to_string(),
            reason,
        };

        if !ID_REGEX.is_match(&raw.id) {
            return Err(invalid(format!("id '{}' must be a lowercase token", raw.id)));
        }

        let version_pattern = raw.version.pattern.as_deref().map(Regex::new).transpose()?;

        let mut aliases = AliasTable::new();
        for (name, spec) in &raw.aliases.attributes {
            check_alias(name, AliasKind::Attribute).map_err(invalid)?;
            let coords = Coordinates::attribute(&spec.mbean, &spec.attribute, spec.path.as_deref());
            aliases.insert(AliasKind::Attribute, name, resolution_for(coords));
        }
        for (name, spec) in &raw.aliases.operations {
            check_alias(name, AliasKind::Operation).map_err(invalid)?;
            let coords = Coordinates::operation(&spec.mbean, &spec.operation);
            aliases.insert(AliasKind::Operation, name, resolution_for(coords));
        }

        Ok(Self {
            name: raw.name.unwrap_or_else(|| raw.id.clone()),
            id: raw.id,
            order: raw.order.map_or(Order::Unordered, Order::Ordered),
            jsr77: raw.jsr77,
            version_request: Request::new(
                &raw.version.mbean,
                &raw.version.attribute,
                raw.version.path.as_deref(),
            ),
            version_pattern,
            detect: raw.detect,
            aliases,
        })
    }

    /// 从签名属性的值中提取版本：第一个捕获组，否则整个匹配
    fn extract_version(&self, value: &Value) -> Option<String> {
        let text = display_value(value);
        match &self.version_pattern {
            None if text.is_empty() => None,
            None => Some(text),
            Some(re) => {
                let caps = re.captures(&text)?;
                caps.get(1).or_else(|| caps.get(0)).map(|m| m.as_str().to_string())
            }
        }
    }
}

fn check_alias(name: &str, kind: AliasKind) -> std::result::Result<(), String> {
    let alias = catalog()
        .lookup(name)
        .map_err(|_| format!("unknown alias {}", name))?;
    if alias.kind != kind {
        return Err(format!("alias {} is an {}, not an {}", name, alias.kind, kind));
    }
    Ok(())
}

/// 字面坐标 -> Static；含 {version} -> Lazy
fn resolution_for(coords: Coordinates) -> Resolution {
    let templated = match &coords {
        Coordinates::Attribute { mbean, attribute, path } => [Some(mbean), Some(attribute), path.as_ref()]
            .iter()
            .flatten()
            .any(|s| s.contains(VERSION_PLACEHOLDER)),
        Coordinates::Operation { mbean, operation } => {
            mbean.contains(VERSION_PLACEHOLDER) || operation.contains(VERSION_PLACEHOLDER)
        }
    };
    if !templated {
        return Resolution::Static(coords);
    }

    Resolution::lazy(move |handler| {
        let version = match handler.version()? {
            Some(version) => version,
            None => return Ok(None),
        };
        let fill = |s: &str| s.replace(VERSION_PLACEHOLDER, &version);
        Ok(Some(match &coords {
            Coordinates::Attribute { mbean, attribute, path } => Coordinates::Attribute {
                mbean: fill(mbean.as_str()),
                attribute: fill(attribute.as_str()),
                path: path.as_deref().map(fill),
            },
            Coordinates::Operation { mbean, operation } => Coordinates::Operation {
                mbean: fill(mbean.as_str()),
                operation: fill(operation.as_str()),
            },
        }))
    })
}

/// 递归加载目录下的 *.yaml / *.yml，按文件名排序
pub fn load_dir(dir: &Path) -> Result<Vec<Arc<DefinedProduct>>> {
    let mut products = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| JmxError::Io(e.into()))?;
        let path = entry.path();
        let is_yaml = path
            .extension()
            .map(|ext| ext == "yaml" || ext == "yml")
            .unwrap_or(false);
        if !entry.file_type().is_file() || !is_yaml {
            continue;
        }
        let text = std::fs::read_to_string(path)?;
        products.push(Arc::new(DefinedProduct::from_yaml(&text, &path.display().to_string())?));
    }
    Ok(products)
}

/// 由定义驱动的处理器
pub struct DefinedHandler {
    product: Arc<DefinedProduct>,
    core: HandlerCore,
}

impl DefinedHandler {
    pub fn new(product: Arc<DefinedProduct>, transport: SharedTransport) -> Self {
        Self { product, core: HandlerCore::new(transport) }
    }
}

impl ProductHandler for DefinedHandler {
    fn id(&self) -> &str {
        &self.product.id
    }

    fn name(&self) -> &str {
        &self.product.name
    }

    fn order(&self) -> Order {
        self.product.order
    }

    fn jsr77(&self) -> bool {
        self.product.jsr77
    }

    fn core(&self) -> &HandlerCore {
        &self.core
    }

    fn try_detect_version(&self) -> Result<Option<String>> {
        let value = self.core.read_value(&self.product.version_request)?;
        Ok(value.and_then(|v| self.product.extract_version(&v)))
    }

    fn init_aliases(&self) -> AliasTable {
        self.product.aliases.clone()
    }

    /// 有 detect 探针时只检查该属性是否存在
    fn autodetect(&self) -> Detection {
        let spec = match &self.product.detect {
            Some(spec) => spec,
            None => {
                return match self.version() {
                    Ok(Some(_)) => Detection::Match,
                    Ok(None) => Detection::NoMatch,
                    Err(e) => Detection::Unknown(e),
                }
            }
        };
        match self.core.try_attribute("detect", &spec.mbean, &spec.attribute, spec.path.as_deref()) {
            Ok(true) => Detection::Match,
            Ok(false) => Detection::NoMatch,
            Err(e) => Detection::Unknown(e),
        }
    }
}
