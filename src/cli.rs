//! CLI 命令处理

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use jmx_probe::alias::catalog;
use jmx_probe::product::report::display_value;
use jmx_probe::transport::replay::ReplayTransport;
use jmx_probe::{HandlerRegistry, JmxClient, Resolution, Resolved, SharedTransport};

use crate::Command;

/// 探测结果摘要
#[derive(Debug, Serialize)]
struct DetectSummary {
    file: String,
    id: String,
    name: String,
    version: Option<String>,
    jsr77: bool,
}

pub fn handle_command(command: Command, json_output: bool, products: Option<&Path>) -> Result<()> {
    let registry = build_registry(products)?;

    match command {
        Command::Aliases => print_aliases(json_output),
        Command::Detect { replay } => detect_all(&registry, &replay, json_output),
        Command::Resolve { replay, alias } => {
            let client = connect(&registry, &replay)?;
            let resolved = client
                .resolve_alias(alias.as_str())
                .with_context(|| format!("Failed to resolve {}", alias))?;
            if json_output {
                let value = match &resolved {
                    Some(Resolved::Coordinates(coords)) => serde_json::to_value(coords)?,
                    Some(Resolved::Dynamic(_)) => json!({ "kind": "dynamic" }),
                    None => Value::Null,
                };
                println!("{}", serde_json::to_string_pretty(&json!({ "alias": alias, "resolution": value }))?);
            } else {
                match resolved {
                    Some(Resolved::Coordinates(coords)) => println!("{}: {}", alias, coords),
                    Some(Resolved::Dynamic(_)) => println!("{}: computed by handler", alias),
                    None => println!("{}: unresolved", alias),
                }
            }
            Ok(())
        }
        Command::Get { replay, alias } => {
            let client = connect(&registry, &replay)?;
            let value = client
                .get_attribute(alias.as_str())
                .with_context(|| format!("Failed to read {}", alias))?;
            if json_output {
                println!("{}", serde_json::to_string_pretty(&json!({ "alias": alias, "value": value }))?);
            } else {
                match value {
                    Some(value) => println!("{}", display_value(&value)),
                    None => println!("{}: no value", alias),
                }
            }
            Ok(())
        }
        Command::Info { replay, verbose } => {
            let client = connect(&registry, &replay)?;
            let handler = client.handler();
            let report = client.info(verbose).context("Failed to build report")?;
            if json_output {
                let out = json!({
                    "product": handler.id(),
                    "name": handler.name(),
                    "version": handler.version()?,
                    "report": report,
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                print!("{}", report);
            }
            Ok(())
        }
    }
}

fn build_registry(products: Option<&Path>) -> Result<HandlerRegistry> {
    let mut registry = HandlerRegistry::default();
    if let Some(dir) = products {
        registry
            .load_definitions(dir)
            .with_context(|| format!("Failed to load product definitions from {}", dir.display()))?;
    }
    Ok(registry)
}

fn open_transport(path: &Path) -> Result<SharedTransport> {
    let transport = ReplayTransport::from_file(path)
        .with_context(|| format!("Failed to load recording {}", path.display()))?;
    Ok(Rc::new(transport))
}

fn connect(registry: &HandlerRegistry, path: &Path) -> Result<JmxClient> {
    Ok(JmxClient::connect(open_transport(path)?, registry))
}

/// 每个文件一个独立会话，并行探测
fn detect_all(registry: &HandlerRegistry, files: &[PathBuf], json_output: bool) -> Result<()> {
    let results: Vec<Result<DetectSummary>> = files
        .par_iter()
        .map(|path| -> Result<DetectSummary> {
            let client = connect(registry, path)?;
            let handler = client.handler();
            Ok(DetectSummary {
                file: path.display().to_string(),
                id: handler.id().to_string(),
                name: handler.name().to_string(),
                version: handler.version()?,
                jsr77: handler.jsr77(),
            })
        })
        .collect();
    let summaries = results.into_iter().collect::<Result<Vec<_>>>()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        for s in &summaries {
            println!(
                "{}: {} ({}) {}",
                s.file,
                s.name,
                s.id,
                s.version.as_deref().unwrap_or("-")
            );
        }
    }
    Ok(())
}

fn print_aliases(json_output: bool) -> Result<()> {
    if json_output {
        let list: Vec<Value> = catalog()
            .iter()
            .map(|alias| {
                let default = match &alias.default {
                    Some(Resolution::Static(coords)) => serde_json::to_value(coords).unwrap_or(Value::Null),
                    _ => Value::Null,
                };
                json!({
                    "name": alias.name,
                    "kind": alias.kind,
                    "description": alias.description,
                    "default": default,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    for alias in catalog().iter() {
        let default = match &alias.default {
            Some(Resolution::Static(coords)) => coords.to_string(),
            Some(_) => "(computed)".to_string(),
            None => "-".to_string(),
        };
        println!("{:<28} {:<10} {:<50} {}", alias.name, alias.kind.to_string(), default, alias.description);
    }
    Ok(())
}
