//! `hybrid-search tenant add-key` / `tenant salt`.

use crate::app::TenantAction;
use anyhow::{Context, Result};
use hybrid_search_core::config::AppConfig;
use hybrid_search_core::model::TenantKeyFile;
use hybrid_search_server::context::AppContext;
use std::fs;

pub async fn run(action: TenantAction) -> Result<()> {
    match action {
        TenantAction::AddKey { tenant_id, key, path } => add_key(tenant_id, key, path),
        TenantAction::Salt { tenant_id } => salt(tenant_id).await,
    }
}

fn add_key(tenant_id: String, key: String, path: Option<String>) -> Result<()> {
    let config = AppConfig::from_env();
    let path = path
        .or(config.api_keys_path)
        .context("no tenant key file path given and API_KEYS_PATH is unset")?;

    let mut keys: TenantKeyFile = match fs::read_to_string(&path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
        Err(_) => TenantKeyFile::default(),
    };

    let tenant_keys = keys.entry(tenant_id.clone()).or_default();
    if !tenant_keys.contains(&key) {
        tenant_keys.push(key);
    }

    let serialized = serde_json::to_string_pretty(&keys)?;
    fs::write(&path, serialized).with_context(|| format!("writing tenant key file at {path}"))?;

    println!("added key for tenant {tenant_id} in {path}");
    Ok(())
}

async fn salt(tenant_id: String) -> Result<()> {
    let config = AppConfig::from_env();
    let context = AppContext::build(config)?;
    let (salt_ver, salt) = context.salts.current(&tenant_id).await?;
    println!("{}", serde_json::json!({ "tenant_id": tenant_id, "salt_ver": salt_ver, "salt": salt }));
    Ok(())
}
