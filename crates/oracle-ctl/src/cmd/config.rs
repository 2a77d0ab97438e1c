//! config command.

use anyhow::{Context, Result};
use oracle_core::config::OracleConfig;

pub fn cmd_config(config: &OracleConfig) -> Result<()> {
    println!("═══════════════════════════════════════");
    println!("  Oracle Configuration");
    println!("═══════════════════════════════════════");
    println!("  File        : {}", OracleConfig::file_path().display());
    println!("  RPC         : {}", config.chain.rpc_url);
    println!("  Coordinator : {}", config.chain.coordinator_address);
    println!("  Protocol    : {}", config.task.protocol);
    println!("  ┌─ storage");
    println!("  │  backend     : {:?}", config.storage.backend);
    println!("  │  bytes limit : {}", config.storage.bytes_limit);
    println!("  │  gateway     : {}", config.storage.gateway_url);
    println!("  └─ uploads     : not available, oracle-ctl is read-only");
    let p = config.task.parameters;
    println!(
        "  Parameters  : difficulty={} generations={} validations={}",
        p.difficulty, p.num_generations, p.num_validations
    );
    Ok(())
}

pub fn cmd_config_init() -> Result<()> {
    let path = OracleConfig::write_default_if_missing().context("failed to write default config")?;
    println!("Config at {}", path.display());
    Ok(())
}

pub fn cmd_config_toml(config: &OracleConfig) -> Result<()> {
    print!("{}", config.to_toml()?);
    Ok(())
}
