//! oracle-ctl — command-line tools for oracle payloads and configuration.

mod cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use oracle_core::config::OracleConfig;

fn print_usage() {
    println!("Usage: oracle-ctl [--config <path>] [--limit <bytes>] <command>");
    println!();
    println!("Commands:");
    println!("  encode <text>                Text → contract bytes (inline only, oracle-ctl cannot upload)");
    println!("  decode <0xhex>               Contract bytes → text, resolving storage keys");
    println!("  tag encode <name/version>    Protocol tag → bytes32 hex");
    println!("  tag decode <0xhex>           bytes32 hex → protocol tag");
    println!("  fetch <id>                   Print a payload stored on the Arweave gateway");
    println!("  config                       Show resolved configuration");
    println!("  config toml                  Print resolved configuration as TOML");
    println!("  config init                  Write the default config file if missing");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: $ORACLE_CONFIG or ~/.config/oracle/config.toml)");
    println!("  --limit <bytes>   Override storage.bytes_limit");
    println!();
    println!("Backends: none, arweave (read-only). memory is for library use only.");
}

fn load_config(path: Option<PathBuf>) -> Result<OracleConfig> {
    match path {
        Some(path) => {
            let mut config = OracleConfig::from_file(&path)?;
            config.apply_overrides(|key| std::env::var(key).ok());
            Ok(config)
        }
        None => Ok(OracleConfig::load()?),
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path = None;
    let mut limit: Option<usize> = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(PathBuf::from(
                    args.get(i).context("--config requires a value")?,
                ));
            }
            "--limit" => {
                i += 1;
                limit = Some(
                    args.get(i)
                        .context("--limit requires a value")?
                        .parse()
                        .context("--limit must be a number")?,
                );
            }
            _ => remaining.push(&args[i]),
        }
        i += 1;
    }

    if matches!(remaining.as_slice(), [] | ["help"] | ["--help"] | ["-h"]) {
        print_usage();
        return Ok(());
    }

    let mut config = load_config(config_path)?;
    if let Some(limit) = limit {
        config.storage.bytes_limit = limit;
    }

    match remaining.as_slice() {
        ["encode", text] => cmd::codec::cmd_encode(&config, text).await,
        ["decode", hex] => cmd::codec::cmd_decode(&config, hex).await,
        ["tag", "encode", protocol] => cmd::codec::cmd_tag_encode(protocol),
        ["tag", "decode", hex] => cmd::codec::cmd_tag_decode(hex),
        ["fetch", id] => cmd::storage::cmd_fetch(&config, id).await,
        ["config"] => cmd::config::cmd_config(&config),
        ["config", "toml"] => cmd::config::cmd_config_toml(&config),
        ["config", "init"] => cmd::config::cmd_config_init(),
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}
