//! Per-tenant salt rotation lookup, used both to answer `GET /tenant/salt`
//! and to tokenize path segments consistently on the `commit_tus` path.

use crate::error::{AppError, Result};
use crate::model::Salt;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

/// Narrow seam over wherever tenant salts actually live (Vault KV in
/// production). Kept minimal so the provider can be backed by Vault, a
/// static fallback file, or a test double.
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Fetch every rotation salt on record for `tenant_id`, in any order.
    async fn fetch_salts(&self, tenant_id: &str) -> Result<Vec<Salt>>;
}

/// Reads `FALLBACK_SALTS_JSON`-shaped `{tenant_id: [{ver, value}, ...]}`
/// from a static in-memory map. Used when no Vault is configured, or as
/// the seed data for local development.
pub struct StaticSecretBackend {
    salts: HashMap<String, Vec<Salt>>,
}

impl StaticSecretBackend {
    pub fn new(salts: HashMap<String, Vec<Salt>>) -> Self {
        Self { salts }
    }

    pub fn empty() -> Self {
        Self::new(HashMap::new())
    }

    /// Parse the `FALLBACK_SALTS_JSON` environment value.
    pub fn from_json(raw: &str) -> Result<Self> {
        let salts: HashMap<String, Vec<Salt>> = serde_json::from_str(raw)?;
        Ok(Self::new(salts))
    }
}

#[async_trait]
impl SecretBackend for StaticSecretBackend {
    async fn fetch_salts(&self, tenant_id: &str) -> Result<Vec<Salt>> {
        Ok(self.salts.get(tenant_id).cloned().unwrap_or_default())
    }
}

/// HTTP client for a Vault-shaped KV secret store, reading a per-tenant
/// path rendered from `secret_template` (e.g. `secret/data/tenants/{tenant}`).
pub struct VaultSecretBackend {
    client: reqwest::Client,
    addr: String,
    token: String,
    secret_template: String,
}

#[derive(Deserialize)]
struct VaultKvResponse {
    data: VaultKvData,
}

#[derive(Deserialize)]
struct VaultKvData {
    data: VaultSaltPayload,
}

#[derive(Deserialize)]
struct VaultSaltPayload {
    #[serde(default)]
    salts: Vec<Salt>,
}

impl VaultSecretBackend {
    pub fn new(addr: String, token: String, secret_template: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            addr,
            token,
            secret_template,
        })
    }

    fn path_for(&self, tenant_id: &str) -> String {
        self.secret_template.replace("{tenant}", tenant_id)
    }
}

#[async_trait]
impl SecretBackend for VaultSecretBackend {
    async fn fetch_salts(&self, tenant_id: &str) -> Result<Vec<Salt>> {
        let url = format!("{}/v1/{}", self.addr, self.path_for(tenant_id));
        let resp = self
            .client
            .get(url)
            .header("X-Vault-Token", &self.token)
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("vault request failed: {e}")))?;
        if resp.status().as_u16() == 404 {
            return Ok(Vec::new());
        }
        if !resp.status().is_success() {
            return Err(AppError::Internal(format!(
                "vault returned status {}",
                resp.status()
            )));
        }
        let parsed: VaultKvResponse = resp
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("vault response decode failed: {e}")))?;
        Ok(parsed.data.data.salts)
    }
}

/// Caches per-tenant salt lists fetched from a [`SecretBackend`] and
/// resolves the current (highest-`ver`) one. Rotation is simply "return
/// the highest-ver entry on record"; there is no signed or verified expiry.
pub struct SaltProvider {
    backend: Box<dyn SecretBackend>,
    cache: RwLock<HashMap<String, Vec<Salt>>>,
}

/// The well-known empty value returned when a tenant has no salt on record;
/// clients fall back to a default tokenization scheme.
pub const EMPTY_SALT: &str = "";

impl SaltProvider {
    pub fn new(backend: Box<dyn SecretBackend>) -> Self {
        Self {
            backend,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// The current salt version and value for `tenant_id`, refreshing the
    /// cache from the backend on every call (salts rotate rarely enough
    /// that this is cheap and always correct).
    pub async fn current(&self, tenant_id: &str) -> Result<(u32, String)> {
        let salts = self.backend.fetch_salts(tenant_id).await?;
        let current = salts.iter().max_by_key(|s| s.ver).cloned();
        self.cache
            .write()
            .unwrap()
            .insert(tenant_id.to_string(), salts);
        Ok(match current {
            Some(salt) => (salt.ver, salt.value),
            None => (0, EMPTY_SALT.to_string()),
        })
    }
}
