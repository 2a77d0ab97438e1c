//! encode, decode and tag commands.

use anyhow::{Context, Result};
use oracle_core::codec::{decode_tag, encode_protocol, tag_from_hex, tag_to_hex};
use oracle_core::config::OracleConfig;
use oracle_core::ContractBytes;

use super::storage;

pub async fn cmd_encode(config: &OracleConfig, text: &str) -> Result<()> {
    let bytes = storage::encode(config, text).await?;
    println!("{bytes}");
    Ok(())
}

pub async fn cmd_decode(config: &OracleConfig, hex: &str) -> Result<()> {
    let bytes = ContractBytes::new(hex);
    match storage::decode(config, &bytes).await? {
        Some(text) => println!("{text}"),
        None => println!("(storage key with no stored value)"),
    }
    Ok(())
}

pub fn cmd_tag_encode(protocol: &str) -> Result<()> {
    let tag = encode_protocol(protocol).with_context(|| format!("invalid protocol {protocol:?}"))?;
    println!("{}", tag_to_hex(&tag));
    Ok(())
}

pub fn cmd_tag_decode(hex: &str) -> Result<()> {
    let tag = tag_from_hex(hex).context("expected 32 bytes of 0x hex")?;
    println!("{}", decode_tag(&tag)?);
    Ok(())
}
