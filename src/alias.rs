// ============================================================================
// 别名目录 - 符号名 -> MBean 坐标
// ============================================================================
//
// 别名是与产品无关的符号名（如 MEMORY_HEAP_USED）。每个产品处理器
// 通过 Resolution 把别名翻译成具体的 MBean 坐标。
//
// Resolution 只有三种形态：
// 1. Static  - 字面坐标
// 2. Lazy    - 依赖处理器运行时状态计算坐标（如按版本变化的 MBean 名）
// 3. Full    - 完全自定义的取值逻辑，绕过坐标解析
//
// ============================================================================

use once_cell::sync::Lazy;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{JmxError, Result};
use crate::product::ProductHandler;
use crate::transport::Request;

/// 别名类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasKind {
    Attribute,
    Operation,
}

impl fmt::Display for AliasKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AliasKind::Attribute => f.write_str("attribute"),
            AliasKind::Operation => f.write_str("operation"),
        }
    }
}

/// MBean 坐标
///
/// 属性是 (mbean, attribute, path?) 三元组，操作是 (mbean, operation) 二元组。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Coordinates {
    Attribute {
        mbean: String,
        attribute: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },
    Operation {
        mbean: String,
        operation: String,
    },
}

impl Coordinates {
    pub fn attribute(mbean: &str, attribute: &str, path: Option<&str>) -> Self {
        Coordinates::Attribute {
            mbean: mbean.to_string(),
            attribute: attribute.to_string(),
            path: path.map(str::to_string),
        }
    }

    pub fn operation(mbean: &str, operation: &str) -> Self {
        Coordinates::Operation {
            mbean: mbean.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn kind(&self) -> AliasKind {
        match self {
            Coordinates::Attribute { .. } => AliasKind::Attribute,
            Coordinates::Operation { .. } => AliasKind::Operation,
        }
    }

    /// 元组长度：属性 2 或 3，操作 2
    pub fn arity(&self) -> usize {
        match self {
            Coordinates::Attribute { path: Some(_), .. } => 3,
            Coordinates::Attribute { path: None, .. } | Coordinates::Operation { .. } => 2,
        }
    }

    pub fn mbean(&self) -> &str {
        match self {
            Coordinates::Attribute { mbean, .. } | Coordinates::Operation { mbean, .. } => mbean,
        }
    }

    pub fn to_request(&self) -> Request {
        match self {
            Coordinates::Attribute { mbean, attribute, path } => Request {
                mbean: mbean.clone(),
                target: attribute.clone(),
                path: path.clone(),
            },
            Coordinates::Operation { mbean, operation } => Request {
                mbean: mbean.clone(),
                target: operation.clone(),
                path: None,
            },
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_request())
    }
}

/// 惰性坐标提供者：以处理器为唯一参数，每次查询调用一次
pub type LazyProvider = Arc<dyn Fn(&dyn ProductHandler) -> Result<Option<Coordinates>> + Send + Sync>;

/// 完全自定义解析器：自己完成取值，`Ok(None)` 表示没有值
pub type FullResolver = Arc<dyn Fn(&dyn ProductHandler) -> Result<Option<Value>> + Send + Sync>;

/// 别名在某个处理器下的解析规则
#[derive(Clone)]
pub enum Resolution {
    Static(Coordinates),
    Lazy(LazyProvider),
    Full(FullResolver),
}

impl Resolution {
    pub fn attribute(mbean: &str, attribute: &str, path: Option<&str>) -> Self {
        Resolution::Static(Coordinates::attribute(mbean, attribute, path))
    }

    pub fn operation(mbean: &str, operation: &str) -> Self {
        Resolution::Static(Coordinates::operation(mbean, operation))
    }

    pub fn lazy<F>(provider: F) -> Self
    where
        F: Fn(&dyn ProductHandler) -> Result<Option<Coordinates>> + Send + Sync + 'static,
    {
        Resolution::Lazy(Arc::new(provider))
    }

    pub fn full<F>(resolver: F) -> Self
    where
        F: Fn(&dyn ProductHandler) -> Result<Option<Value>> + Send + Sync + 'static,
    {
        Resolution::Full(Arc::new(resolver))
    }
}

impl fmt::Debug for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Static(coords) => f.debug_tuple("Static").field(coords).finish(),
            Resolution::Lazy(_) => f.write_str("Lazy(..)"),
            Resolution::Full(_) => f.write_str("Full(..)"),
        }
    }
}

/// 别名描述符，注册后不可变
#[derive(Debug, Clone)]
pub struct Alias {
    pub name: String,
    pub kind: AliasKind,
    pub description: String,
    pub default: Option<Resolution>,
}

/// `resolve_alias` 的参数：别名名字或已取得的别名
#[derive(Debug, Clone, Copy)]
pub enum AliasRef<'a> {
    Name(&'a str),
    Alias(&'a Alias),
}

impl<'a> From<&'a str> for AliasRef<'a> {
    fn from(name: &'a str) -> Self {
        AliasRef::Name(name)
    }
}

impl<'a> From<&'a Alias> for AliasRef<'a> {
    fn from(alias: &'a Alias) -> Self {
        AliasRef::Alias(alias)
    }
}

impl<'a> AliasRef<'a> {
    /// 转成别名对象；名字不在目录中时返回 UnknownAlias
    pub fn resolve(self, catalog: &'a AliasCatalog) -> Result<&'a Alias> {
        match self {
            AliasRef::Name(name) => catalog.lookup(name),
            AliasRef::Alias(alias) => Ok(alias),
        }
    }
}

/// 别名目录（只在初始化时追加，之后只读）
#[derive(Debug, Default)]
pub struct AliasCatalog {
    aliases: Vec<Alias>,
    index: HashMap<String, usize>,
}

impl AliasCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, alias: Alias) {
        match self.index.get(&alias.name) {
            Some(&idx) => self.aliases[idx] = alias,
            None => {
                self.index.insert(alias.name.clone(), self.aliases.len());
                self.aliases.push(alias);
            }
        }
    }

    pub fn lookup(&self, name: &str) -> Result<&Alias> {
        self.index
            .get(name)
            .map(|&idx| &self.aliases[idx])
            .ok_or_else(|| JmxError::UnknownAlias(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序遍历
    pub fn iter(&self) -> impl Iterator<Item = &Alias> {
        self.aliases.iter()
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }
}

// ============================================================================
// 标准别名
// ============================================================================

pub const MEMORY_HEAP: &str = "MEMORY_HEAP";
pub const MEMORY_HEAP_USED: &str = "MEMORY_HEAP_USED";
pub const MEMORY_HEAP_INIT: &str = "MEMORY_HEAP_INIT";
pub const MEMORY_HEAP_COMMITTED: &str = "MEMORY_HEAP_COMMITTED";
pub const MEMORY_HEAP_MAX: &str = "MEMORY_HEAP_MAX";
pub const MEMORY_NONHEAP: &str = "MEMORY_NONHEAP";
pub const MEMORY_NONHEAP_USED: &str = "MEMORY_NONHEAP_USED";
pub const MEMORY_NONHEAP_INIT: &str = "MEMORY_NONHEAP_INIT";
pub const MEMORY_NONHEAP_COMMITTED: &str = "MEMORY_NONHEAP_COMMITTED";
pub const MEMORY_NONHEAP_MAX: &str = "MEMORY_NONHEAP_MAX";
pub const MEMORY_VERBOSE: &str = "MEMORY_VERBOSE";
pub const MEMORY_GC: &str = "MEMORY_GC";
pub const CL_LOADED: &str = "CL_LOADED";
pub const CL_UNLOADED: &str = "CL_UNLOADED";
pub const CL_TOTAL: &str = "CL_TOTAL";
pub const THREAD_COUNT: &str = "THREAD_COUNT";
pub const THREAD_COUNT_PEAK: &str = "THREAD_COUNT_PEAK";
pub const THREAD_COUNT_STARTED: &str = "THREAD_COUNT_STARTED";
pub const THREAD_COUNT_DAEMON: &str = "THREAD_COUNT_DAEMON";
pub const THREAD_DEADLOCKED: &str = "THREAD_DEADLOCKED";
pub const THREAD_DUMP: &str = "THREAD_DUMP";
pub const OS_MEMORY_PHYSICAL_FREE: &str = "OS_MEMORY_PHYSICAL_FREE";
pub const OS_MEMORY_PHYSICAL_TOTAL: &str = "OS_MEMORY_PHYSICAL_TOTAL";
pub const OS_MEMORY_SWAP_FREE: &str = "OS_MEMORY_SWAP_FREE";
pub const OS_MEMORY_SWAP_TOTAL: &str = "OS_MEMORY_SWAP_TOTAL";
pub const OS_MEMORY_VIRTUAL: &str = "OS_MEMORY_VIRTUAL";
pub const OS_FILE_DESC_OPEN: &str = "OS_FILE_DESC_OPEN";
pub const OS_FILE_DESC_MAX: &str = "OS_FILE_DESC_MAX";
pub const OS_CPU_TIME: &str = "OS_CPU_TIME";
pub const OS_CPU_LOAD: &str = "OS_CPU_LOAD";
pub const OS_INFO_PROCESSORS: &str = "OS_INFO_PROCESSORS";
pub const OS_INFO_ARCH: &str = "OS_INFO_ARCH";
pub const OS_INFO_NAME: &str = "OS_INFO_NAME";
pub const OS_INFO_VERSION: &str = "OS_INFO_VERSION";
pub const RUNTIME_SYSTEM_PROPERTIES: &str = "RUNTIME_SYSTEM_PROPERTIES";
pub const RUNTIME_VM_VERSION: &str = "RUNTIME_VM_VERSION";
pub const RUNTIME_VM_NAME: &str = "RUNTIME_VM_NAME";
pub const RUNTIME_VM_VENDOR: &str = "RUNTIME_VM_VENDOR";
pub const RUNTIME_ARGUMENTS: &str = "RUNTIME_ARGUMENTS";
pub const RUNTIME_UPTIME: &str = "RUNTIME_UPTIME";
pub const RUNTIME_STARTTIME: &str = "RUNTIME_STARTTIME";
pub const RUNTIME_NAME: &str = "RUNTIME_NAME";
pub const RUNTIME_CLASSPATH: &str = "RUNTIME_CLASSPATH";
pub const RUNTIME_BOOTCLASSPATH: &str = "RUNTIME_BOOTCLASSPATH";
pub const RUNTIME_LIBRARY_PATH: &str = "RUNTIME_LIBRARY_PATH";
pub const COMPILATION_TIME: &str = "COMPILATION_TIME";
pub const SERVER_VERSION: &str = "SERVER_VERSION";
pub const SERVER_NAME: &str = "SERVER_NAME";
pub const SERVER_ADDRESS: &str = "SERVER_ADDRESS";
pub const SERVER_HOSTNAME: &str = "SERVER_HOSTNAME";

const MEMORY: &str = "java.lang:type=Memory";
const CLASS_LOADING: &str = "java.lang:type=ClassLoading";
const THREADING: &str = "java.lang:type=Threading";
const OS: &str = "java.lang:type=OperatingSystem";
const RUNTIME: &str = "java.lang:type=Runtime";
const COMPILATION: &str = "java.lang:type=Compilation";

type Entry = (&'static str, AliasKind, Option<(&'static str, &'static str, Option<&'static str>)>, &'static str);

use AliasKind::{Attribute as A, Operation as O};

/// (名字, 类型, 默认坐标, 描述)
const STANDARD_ALIASES: &[Entry] = &[
    (MEMORY_HEAP, A, Some((MEMORY, "HeapMemoryUsage", None)), "Heap memory usage"),
    (MEMORY_HEAP_USED, A, Some((MEMORY, "HeapMemoryUsage", Some("used"))), "Used heap memory"),
    (MEMORY_HEAP_INIT, A, Some((MEMORY, "HeapMemoryUsage", Some("init"))), "Initially requested heap memory"),
    (MEMORY_HEAP_COMMITTED, A, Some((MEMORY, "HeapMemoryUsage", Some("committed"))), "Committed heap memory"),
    (MEMORY_HEAP_MAX, A, Some((MEMORY, "HeapMemoryUsage", Some("max"))), "Maximum heap memory"),
    (MEMORY_NONHEAP, A, Some((MEMORY, "NonHeapMemoryUsage", None)), "Non-heap memory usage"),
    (MEMORY_NONHEAP_USED, A, Some((MEMORY, "NonHeapMemoryUsage", Some("used"))), "Used non-heap memory"),
    (MEMORY_NONHEAP_INIT, A, Some((MEMORY, "NonHeapMemoryUsage", Some("init"))), "Initially requested non-heap memory"),
    (MEMORY_NONHEAP_COMMITTED, A, Some((MEMORY, "NonHeapMemoryUsage", Some("committed"))), "Committed non-heap memory"),
    (MEMORY_NONHEAP_MAX, A, Some((MEMORY, "NonHeapMemoryUsage", Some("max"))), "Maximum non-heap memory"),
    (MEMORY_VERBOSE, A, Some((MEMORY, "Verbose", None)), "Switch on/off verbose GC output"),
    (MEMORY_GC, O, Some((MEMORY, "gc", None)), "Run a garbage collection"),
    (CL_LOADED, A, Some((CLASS_LOADING, "LoadedClassCount", None)), "Number of currently loaded classes"),
    (CL_UNLOADED, A, Some((CLASS_LOADING, "UnloadedClassCount", None)), "Number of unloaded classes"),
    (CL_TOTAL, A, Some((CLASS_LOADING, "TotalLoadedClassCount", None)), "Number of classes loaded in total"),
    (THREAD_COUNT, A, Some((THREADING, "ThreadCount", None)), "Active threads in the system"),
    (THREAD_COUNT_PEAK, A, Some((THREADING, "PeakThreadCount", None)), "Peak thread count"),
    (THREAD_COUNT_STARTED, A, Some((THREADING, "TotalStartedThreadCount", None)), "Threads started since JVM start"),
    (THREAD_COUNT_DAEMON, A, Some((THREADING, "DaemonThreadCount", None)), "Number of daemon threads"),
    (THREAD_DEADLOCKED, O, Some((THREADING, "findDeadlockedThreads", None)), "Find deadlocked threads"),
    (THREAD_DUMP, O, Some((THREADING, "dumpAllThreads", None)), "Create a thread dump"),
    (OS_MEMORY_PHYSICAL_FREE, A, Some((OS, "FreePhysicalMemorySize", None)), "Free physical memory"),
    (OS_MEMORY_PHYSICAL_TOTAL, A, Some((OS, "TotalPhysicalMemorySize", None)), "Total physical memory"),
    (OS_MEMORY_SWAP_FREE, A, Some((OS, "FreeSwapSpaceSize", None)), "Free swap space"),
    (OS_MEMORY_SWAP_TOTAL, A, Some((OS, "TotalSwapSpaceSize", None)), "Total swap space"),
    (OS_MEMORY_VIRTUAL, A, Some((OS, "CommittedVirtualMemorySize", None)), "Committed virtual memory"),
    (OS_FILE_DESC_OPEN, A, Some((OS, "OpenFileDescriptorCount", None)), "Open file descriptors"),
    (OS_FILE_DESC_MAX, A, Some((OS, "MaxFileDescriptorCount", None)), "Maximum number of open file descriptors"),
    (OS_CPU_TIME, A, Some((OS, "ProcessCpuTime", None)), "CPU time used by the JVM (ns)"),
    (OS_CPU_LOAD, A, Some((OS, "SystemLoadAverage", None)), "System load average"),
    (OS_INFO_PROCESSORS, A, Some((OS, "AvailableProcessors", None)), "Number of available processors"),
    (OS_INFO_ARCH, A, Some((OS, "Arch", None)), "CPU architecture"),
    (OS_INFO_NAME, A, Some((OS, "Name", None)), "Operating system name"),
    (OS_INFO_VERSION, A, Some((OS, "Version", None)), "Operating system version"),
    (RUNTIME_SYSTEM_PROPERTIES, A, Some((RUNTIME, "SystemProperties", None)), "System properties"),
    (RUNTIME_VM_VERSION, A, Some((RUNTIME, "VmVersion", None)), "Version of the JVM"),
    (RUNTIME_VM_NAME, A, Some((RUNTIME, "VmName", None)), "Name of the JVM"),
    (RUNTIME_VM_VENDOR, A, Some((RUNTIME, "VmVendor", None)), "JVM vendor"),
    (RUNTIME_ARGUMENTS, A, Some((RUNTIME, "InputArguments", None)), "Arguments passed to the JVM"),
    (RUNTIME_UPTIME, A, Some((RUNTIME, "Uptime", None)), "JVM uptime (ms)"),
    (RUNTIME_STARTTIME, A, Some((RUNTIME, "StartTime", None)), "JVM start time (epoch ms)"),
    (RUNTIME_NAME, A, Some((RUNTIME, "Name", None)), "Name of the running JVM"),
    (RUNTIME_CLASSPATH, A, Some((RUNTIME, "ClassPath", None)), "Class path"),
    (RUNTIME_BOOTCLASSPATH, A, Some((RUNTIME, "BootClassPath", None)), "Boot class path"),
    (RUNTIME_LIBRARY_PATH, A, Some((RUNTIME, "LibraryPath", None)), "Library path"),
    (COMPILATION_TIME, A, Some((COMPILATION, "TotalCompilationTime", None)), "Time spent in JIT compilation (ms)"),
    (SERVER_VERSION, A, None, "Version of the application server"),
    (SERVER_NAME, A, None, "Name of the application server"),
    (SERVER_ADDRESS, A, None, "IP address of the server"),
    (SERVER_HOSTNAME, A, None, "Host name of the server"),
];

fn standard_catalog() -> AliasCatalog {
    let mut catalog = AliasCatalog::new();
    for &(name, kind, coords, description) in STANDARD_ALIASES {
        let default = coords.map(|(mbean, target, path)| match kind {
            AliasKind::Attribute => Resolution::attribute(mbean, target, path),
            AliasKind::Operation => Resolution::operation(mbean, target),
        });
        catalog.register(Alias {
            name: name.to_string(),
            kind,
            description: description.to_string(),
            default,
        });
    }
    catalog
}

/// 全局别名目录（首次使用时构建，之后只读）
static CATALOG: Lazy<AliasCatalog> = Lazy::new(standard_catalog);

pub fn catalog() -> &'static AliasCatalog {
    &CATALOG
}
