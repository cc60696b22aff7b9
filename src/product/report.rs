//! JVM 报告生成
//!
//! 遍历一张声明式的 JVM 属性表，按渲染类型格式化。所有产品共享。

use chrono::{Local, TimeZone};
use serde_json::Value;

use super::ProductHandler;
use crate::alias::*;
use crate::error::Result;

/// 服务器信息与 JVM 信息之间的分隔线
pub const RULE: &str = "------------------------------------------------------------------------";

/// 参数列表的换行宽度
const WRAP_WIDTH: usize = 60;

const BYTES_PER_MB: f64 = 1_048_576.0;

/// 渲染类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Renderer {
    /// 字节 -> 整数 MB
    Mem,
    /// 原样输出，多个别名用空格拼接
    Str,
    /// 数字原样输出
    Nr,
    /// 毫秒 -> "d, h, m, s"
    Duration,
    /// 纪元毫秒 -> 本地时间
    Time,
}

struct ReportLine {
    renderer: Renderer,
    label: &'static str,
    aliases: &'static [&'static str],
}

struct ReportSection {
    title: &'static str,
    lines: &'static [ReportLine],
}

const fn line(renderer: Renderer, label: &'static str, aliases: &'static [&'static str]) -> ReportLine {
    ReportLine { renderer, label, aliases }
}

use Renderer::{Duration, Mem, Nr, Str, Time};

const JVM_SECTIONS: &[ReportSection] = &[
    ReportSection {
        title: "Memory",
        lines: &[
            line(Mem, "Heap-Memory used", &[MEMORY_HEAP_USED]),
            line(Mem, "Heap-Memory alloc", &[MEMORY_HEAP_COMMITTED]),
            line(Mem, "Heap-Memory max", &[MEMORY_HEAP_MAX]),
            line(Mem, "NonHeap-Memory used", &[MEMORY_NONHEAP_USED]),
            line(Mem, "NonHeap-Memory max", &[MEMORY_NONHEAP_MAX]),
        ],
    },
    ReportSection {
        title: "Classes",
        lines: &[
            line(Nr, "Classes loaded", &[CL_LOADED]),
            line(Nr, "Classes total", &[CL_TOTAL]),
        ],
    },
    ReportSection {
        title: "Threads",
        lines: &[
            line(Nr, "Threads current", &[THREAD_COUNT]),
            line(Nr, "Threads peak", &[THREAD_COUNT_PEAK]),
            line(Nr, "Threads daemon", &[THREAD_COUNT_DAEMON]),
        ],
    },
    ReportSection {
        title: "OS",
        lines: &[
            line(Str, "CPU Arch", &[OS_INFO_ARCH]),
            line(Str, "CPU OS", &[OS_INFO_NAME, OS_INFO_VERSION, OS_INFO_PROCESSORS]),
            line(Mem, "Memory total", &[OS_MEMORY_PHYSICAL_TOTAL]),
            line(Mem, "Memory free", &[OS_MEMORY_PHYSICAL_FREE]),
            line(Mem, "Swap total", &[OS_MEMORY_SWAP_TOTAL]),
            line(Mem, "Swap free", &[OS_MEMORY_SWAP_FREE]),
            line(Nr, "FileDesc Open", &[OS_FILE_DESC_OPEN]),
            line(Nr, "FileDesc Max", &[OS_FILE_DESC_MAX]),
        ],
    },
    ReportSection {
        title: "Runtime",
        lines: &[
            line(Str, "Name", &[RUNTIME_NAME]),
            line(Str, "JVM", &[RUNTIME_VM_VERSION, RUNTIME_VM_NAME, RUNTIME_VM_VENDOR]),
            line(Duration, "Uptime", &[RUNTIME_UPTIME]),
            line(Time, "Starttime", &[RUNTIME_STARTTIME]),
        ],
    },
];

/// 生成 JVM 报告；值通过当前处理器的别名解析获取
pub(crate) fn jvm_info(handler: &dyn ProductHandler, verbose: bool) -> Result<String> {
    let mut out = String::new();

    for section in JVM_SECTIONS {
        let mut body = String::new();
        for entry in section.lines {
            if let Some(text) = render_line(handler, entry)? {
                body.push_str(&labeled(entry.label, &text));
            }
        }
        // 整节都取不到就不输出标题
        if !body.is_empty() {
            out.push_str(section.title);
            out.push_str(":\n");
            out.push_str(&body);
        }
    }

    if verbose {
        if let Some(args) = handler.get_attribute(RUNTIME_ARGUMENTS)? {
            out.push_str(&render_arguments(&args));
        }
        if let Some(props) = handler.get_attribute(RUNTIME_SYSTEM_PROPERTIES)? {
            let lines = render_properties(&props);
            if !lines.is_empty() {
                out.push_str("System Properties:\n");
                out.push_str(&lines);
            }
        }
    }

    Ok(out)
}

fn labeled(label: &str, text: &str) -> String {
    format!("    {:<20}: {}\n", label, text)
}

fn render_line(handler: &dyn ProductHandler, entry: &ReportLine) -> Result<Option<String>> {
    let (primary, rest) = match entry.aliases.split_first() {
        Some(split) => split,
        None => return Ok(None),
    };
    let value = match handler.get_attribute(*primary)? {
        Some(value) => value,
        None => return Ok(None),
    };

    let text = match entry.renderer {
        Renderer::Mem => format_mem(&value),
        Renderer::Nr => display_value(&value),
        Renderer::Duration => match as_millis(&value) {
            Some(ms) => format_duration(ms.max(0) as u64),
            None => display_value(&value),
        },
        Renderer::Time => match as_millis(&value) {
            Some(ms) => format_timestamp(ms),
            None => display_value(&value),
        },
        Renderer::Str => {
            let mut text = display_value(&value);
            for alias in rest {
                if let Some(extra) = handler.get_attribute(*alias)? {
                    text.push(' ');
                    text.push_str(&display_value(&extra));
                }
            }
            text
        }
    };
    Ok(Some(text))
}

/// 标量按原样输出，字符串不带引号
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_millis(value: &Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
}

/// 字节 -> "N MB"（向下取整）
pub fn format_mem(value: &Value) -> String {
    let bytes = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()));
    match bytes {
        Some(bytes) => format!("{} MB", (bytes / BYTES_PER_MB).floor() as i64),
        None => display_value(value),
    }
}

/// 毫秒 -> "1 d, 1 h, 1 m, 1 s"，为零的部分省略
pub fn format_duration(millis: u64) -> String {
    let secs = millis / 1000;
    let parts = [
        (secs / 86_400, "d"),
        (secs % 86_400 / 3_600, "h"),
        (secs % 3_600 / 60, "m"),
        (secs % 60, "s"),
    ];
    parts
        .iter()
        .filter(|(n, _)| *n > 0)
        .map(|(n, unit)| format!("{} {}", n, unit))
        .collect::<Vec<_>>()
        .join(", ")
}

/// 纪元毫秒 -> 本地时间
pub fn format_timestamp(millis: i64) -> String {
    match Local.timestamp_millis_opt(millis).single() {
        Some(time) => time.format("%a %b %e %H:%M:%S %Y").to_string(),
        None => millis.to_string(),
    }
}

/// JVM 启动参数，约 60 字符换行
fn render_arguments(args: &Value) -> String {
    let words: Vec<String> = match args {
        Value::Array(items) => items.iter().map(display_value).collect(),
        other => display_value(other).split_whitespace().map(str::to_string).collect(),
    };

    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in words.into_iter().filter(|w| !w.is_empty()) {
        if !current.is_empty() && current.len() + 1 + word.len() > WRAP_WIDTH {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
        .iter()
        .enumerate()
        .map(|(i, text)| labeled(if i == 0 { "Arguments" } else { "" }, text))
        .collect()
}

/// 系统属性 -> 排序后的 "key = value" 行
///
/// 兼容两种形态：普通对象，以及 TabularData 转出来的 {key: {key, value}}。
fn render_properties(props: &Value) -> String {
    let mut pairs: Vec<(String, String)> = match props {
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| (key.clone(), tabular_value(value)))
            .collect(),
        Value::Array(rows) => rows
            .iter()
            .filter_map(|row| {
                let key = row.get("key")?.as_str()?.to_string();
                Some((key, tabular_value(row)))
            })
            .collect(),
        _ => Vec::new(),
    };
    pairs.sort();
    pairs
        .iter()
        .map(|(key, value)| format!("    {} = {}\n", key, value))
        .collect()
}

fn tabular_value(value: &Value) -> String {
    match value.get("value") {
        Some(inner) => display_value(inner),
        None => display_value(value),
    }
}
