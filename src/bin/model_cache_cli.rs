//! model-cache CLI: 查询缓存键、标签与配置的诊断工具
//!
//! Usage:
//!   model-cache-cli key <query-file> [--config <path>]        Print the cache key and tags
//!   model-cache-cli canonical <query-file> [--config <path>]  Print the canonical query string
//!   model-cache-cli tags <entity>... [--config <path>]        Print write-side tags
//!   model-cache-cli config [--config <path>]                  Print the effective configuration

use std::io::Read;
use std::path::PathBuf;

use anyhow::{bail, Context};
use model_cache::{CachingConfig, KeyDeriver, QueryDescription};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    match args[1].as_str() {
        "key" => cmd_key(&args[2..]),
        "canonical" => cmd_canonical(&args[2..]),
        "tags" => cmd_tags(&args[2..]),
        "config" => cmd_config(&args[2..]),
        "version" | "--version" | "-V" => {
            println!("model-cache-cli {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!(
        r#"model-cache-cli: 查询缓存诊断工具

USAGE:
    model-cache-cli <COMMAND> [OPTIONS]

COMMANDS:
    key <query-file>            Print the cache key and tags of a query description
    canonical <query-file>      Print the canonical string the key is digested from
    tags <entity>...            Print the tags a write to these entities invalidates
    config                      Print the effective configuration as YAML
    version                     Show version information
    help                        Show this help message

OPTIONS:
    --config <path>             YAML configuration file (defaults otherwise)

Query files are JSON or YAML query descriptions; use '-' to read stdin.

ENVIRONMENT:
    MODEL_CACHE_DISABLED, MODEL_CACHE_STORE, MODEL_CACHE_NAMESPACE,
    MODEL_CACHE_ENV, MODEL_CACHE_TTL_SECS   Override configuration values
    RUST_LOG                                Log filter"#
    );
}

/// Split `--config <path>` out of the positional arguments.
fn split_args(args: &[String]) -> anyhow::Result<(Option<PathBuf>, Vec<&str>)> {
    let mut config = None;
    let mut positional = Vec::new();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().context("--config requires a path")?;
            config = Some(PathBuf::from(path));
        } else {
            positional.push(arg.as_str());
        }
    }
    Ok((config, positional))
}

fn load_config(path: Option<PathBuf>) -> anyhow::Result<CachingConfig> {
    let config = match path {
        Some(path) => CachingConfig::from_yaml_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CachingConfig::default(),
    };
    Ok(config.with_env_overrides()?)
}

fn load_query(source: &str) -> anyhow::Result<QueryDescription> {
    let text = if source == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(source).with_context(|| format!("reading {source}"))?
    };
    // YAML is a superset of JSON, so one parser covers both.
    serde_yaml::from_str(&text).with_context(|| format!("parsing query description {source}"))
}

fn query_args(args: &[String]) -> anyhow::Result<(CachingConfig, QueryDescription)> {
    let (config, positional) = split_args(args)?;
    let [source] = positional.as_slice() else {
        bail!("expected exactly one query file");
    };
    Ok((load_config(config)?, load_query(source)?))
}

fn cmd_key(args: &[String]) -> anyhow::Result<()> {
    let (config, query) = query_args(args)?;
    let (key, tags) = KeyDeriver::new(&config).derive(&query)?;
    println!("key:  {key}");
    for tag in tags.iter() {
        println!("tag:  {tag}");
    }
    Ok(())
}

fn cmd_canonical(args: &[String]) -> anyhow::Result<()> {
    let (config, query) = query_args(args)?;
    println!("{}", KeyDeriver::new(&config).canonical(&query)?);
    Ok(())
}

fn cmd_tags(args: &[String]) -> anyhow::Result<()> {
    let (config, entities) = split_args(args)?;
    if entities.is_empty() {
        bail!("expected at least one entity name");
    }
    let config = load_config(config)?;
    for tag in KeyDeriver::new(&config).entity_tags(entities)?.iter() {
        println!("{tag}");
    }
    Ok(())
}

fn cmd_config(args: &[String]) -> anyhow::Result<()> {
    let (config, positional) = split_args(args)?;
    if !positional.is_empty() {
        bail!("unexpected arguments: {}", positional.join(" "));
    }
    print!("{}", serde_yaml::to_string(&load_config(config)?)?);
    Ok(())
}
