//! `hybrid-search stats`: fetch `/v1/metrics` from a running instance.

use anyhow::{Context, Result};
use serde_json::Value;

pub async fn run(server_url: &str) -> Result<()> {
    let url = format!("{}/v1/metrics", server_url.trim_end_matches('/'));
    let client = reqwest::Client::new();
    let response = client
        .get(&url)
        .send()
        .await
        .with_context(|| format!("requesting {url}"))?
        .error_for_status()
        .with_context(|| format!("{url} returned an error status"))?;
    let snapshot: Value = response.json().await?;
    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}
