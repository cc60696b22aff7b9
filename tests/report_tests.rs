// ============================================================================
// 集成测试 - 产品定义 + 录制响应 -> 探测与报告
// ============================================================================

use serde_json::{json, Value};
use std::path::Path;
use std::rc::Rc;

use jmx_probe::alias::*;
use jmx_probe::transport::replay::ReplayTransport;
use jmx_probe::{Coordinates, HandlerRegistry, JmxClient, Resolved, SharedTransport};

const ACME: &str = r#"
id: acme
name: Acme Server
order: -5
version:
  mbean: "acme:type=Server"
  attribute: Info
  pattern: "Acme/(\\d+(\\.\\d+)*)"
aliases:
  attributes:
    SERVER_NAME: { mbean: "acme:type=Server", attribute: Name }
    MEMORY_HEAP_USED: { mbean: "acme:type=Heap", attribute: Used }
"#;

const BOLT: &str = r#"
id: bolt
name: Bolt AS
version:
  mbean: "bolt:type=Version"
  attribute: Release
detect:
  mbean: "bolt:type=Server"
  attribute: Uptime
"#;

fn record(dir: &Path, name: &str, responses: Value) -> SharedTransport {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string(&json!({ "responses": responses })).unwrap()).unwrap();
    Rc::new(ReplayTransport::from_file(&path).unwrap())
}

fn registry(dir: &Path) -> HandlerRegistry {
    let products = dir.join("products");
    std::fs::create_dir_all(&products).unwrap();
    std::fs::write(products.join("acme.yaml"), ACME).unwrap();
    std::fs::write(products.join("bolt.yaml"), BOLT).unwrap();

    let mut registry = HandlerRegistry::default();
    assert_eq!(registry.load_definitions(&products).unwrap(), 2);
    registry
}

fn acme_jvm() -> Value {
    json!([
        {"mbean": "acme:type=Server", "attribute": "Info", "value": "Acme/4.2.1"},
        {"mbean": "acme:type=Server", "attribute": "Name", "value": "node-7"},
        {"mbean": "acme:type=Heap", "attribute": "Used", "value": 52428800},
        {"mbean": "java.lang:type=Memory", "attribute": "HeapMemoryUsage", "path": "committed", "value": 134217728},
        {"mbean": "java.lang:type=Memory", "attribute": "HeapMemoryUsage", "path": "max", "value": 536870912},
        {"mbean": "java.lang:type=Memory", "attribute": "NonHeapMemoryUsage", "path": "used", "value": 31457280},
        {"mbean": "java.lang:type=ClassLoading", "attribute": "LoadedClassCount", "value": 8123},
        {"mbean": "java.lang:type=ClassLoading", "attribute": "TotalLoadedClassCount", "value": 8200},
        {"mbean": "java.lang:type=Threading", "attribute": "ThreadCount", "value": 42},
        {"mbean": "java.lang:type=Threading", "attribute": "PeakThreadCount", "value": 57},
        {"mbean": "java.lang:type=Threading", "attribute": "DaemonThreadCount", "value": 30},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "Arch", "value": "amd64"},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "Name", "value": "Linux"},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "Version", "value": "6.1.0"},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "AvailableProcessors", "value": 8},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "TotalPhysicalMemorySize", "value": 17179869184u64},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "FreePhysicalMemorySize", "value": 4294967296u64},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "OpenFileDescriptorCount", "value": 120},
        {"mbean": "java.lang:type=OperatingSystem", "attribute": "MaxFileDescriptorCount", "value": 65536},
        {"mbean": "java.lang:type=Runtime", "attribute": "Name", "value": "4242@app01"},
        {"mbean": "java.lang:type=Runtime", "attribute": "VmVersion", "value": "17.0.2+8"},
        {"mbean": "java.lang:type=Runtime", "attribute": "VmName", "value": "OpenJDK 64-Bit Server VM"},
        {"mbean": "java.lang:type=Runtime", "attribute": "VmVendor", "value": "Eclipse Adoptium"},
        {"mbean": "java.lang:type=Runtime", "attribute": "Uptime", "value": 90061000},
        {"mbean": "java.lang:type=Runtime", "attribute": "InputArguments", "value": ["-Xmx512m", "-Dacme.home=/opt/acme"]},
        {"mbean": "java.lang:type=Runtime", "attribute": "SystemProperties", "value": {
            "user.dir": {"key": "user.dir", "value": "/opt/acme"},
            "java.version": {"key": "java.version", "value": "17.0.2"}
        }}
    ])
}

#[test]
fn test_acme_report_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let client = JmxClient::connect(record(dir.path(), "acme.json", acme_jvm()), &registry);

    assert_eq!(client.handler().id(), "acme");
    let report = client.info(false).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    insta::assert_json_snapshot!("acme_report", lines);
}

#[test]
fn test_verbose_report_adds_arguments_and_properties() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let client = JmxClient::connect(record(dir.path(), "acme.json", acme_jvm()), &registry);

    let report = client.info(true).unwrap();
    assert!(report.contains("    Arguments           : -Xmx512m -Dacme.home=/opt/acme\n"));
    assert!(report.ends_with("System Properties:\n    java.version = 17.0.2\n    user.dir = /opt/acme\n"));
}

#[test]
fn test_handler_alias_overrides_catalog_default() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let client = JmxClient::connect(record(dir.path(), "acme.json", acme_jvm()), &registry);

    match client.resolve_alias(MEMORY_HEAP_USED).unwrap() {
        Some(Resolved::Coordinates(coords)) => {
            assert_eq!(coords, Coordinates::attribute("acme:type=Heap", "Used", None))
        }
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(client.get_attribute(SERVER_NAME).unwrap(), Some(json!("node-7")));
    assert_eq!(client.get_attribute(SERVER_VERSION).unwrap(), Some(json!("4.2.1")));
    assert!(client.resolve_alias(SERVER_HOSTNAME).unwrap().is_none());
}

#[test]
fn test_detect_probe_product() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let transport = record(
        dir.path(),
        "bolt.json",
        json!([
            {"mbean": "bolt:type=Server", "attribute": "Uptime", "value": 1000},
            {"mbean": "bolt:type=Version", "attribute": "Release", "value": "9"}
        ]),
    );
    let client = JmxClient::connect(transport, &registry);
    assert_eq!(client.handler().id(), "bolt");
    assert_eq!(client.handler().version().unwrap().as_deref(), Some("9"));
    assert!(client.info(false).unwrap().starts_with("Name:      Bolt AS\nVersion:   9\n"));
}

#[test]
fn test_transient_failure_moves_on() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let transport = record(
        dir.path(),
        "flaky.json",
        json!([
            {"mbean": "acme:type=Server", "attribute": "Info", "connection_error": "connection reset"},
            {"mbean": "bolt:type=Server", "attribute": "Uptime", "value": 1}
        ]),
    );
    let client = JmxClient::connect(transport, &registry);
    assert_eq!(client.handler().id(), "bolt");
}

#[test]
fn test_nothing_matches_uses_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(dir.path());
    let transport = record(
        dir.path(),
        "plain.json",
        json!([{"mbean": "java.lang:type=Threading", "attribute": "ThreadCount", "value": 3}]),
    );
    let client = JmxClient::connect(transport, &registry);
    assert_eq!(client.handler().id(), "unknown");
    assert_eq!(
        client.info(false).unwrap(),
        format!(
            "Name:      Unknown application server\n{}\nThreads:\n    Threads current     : 3\n",
            "-".repeat(72)
        )
    );
}

#[test]
fn test_server_error_in_report_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let transport = record(
        dir.path(),
        "broken.json",
        json!([{"mbean": "java.lang:type=ClassLoading", "attribute": "LoadedClassCount", "status": 500, "error": "boom"}]),
    );
    let client = JmxClient::connect(transport, &HandlerRegistry::default());
    let err = client.info(false).unwrap_err();
    assert!(err.to_string().contains("500"));
}
