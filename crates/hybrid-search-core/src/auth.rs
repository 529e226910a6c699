//! Per-tenant API key enforcement.

use crate::error::{AppError, Result};
use crate::model::TenantKeyFile;
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Validates `x-api-key` headers against a per-tenant allow-list. When
/// `require_api_key` is false the validator is a no-op, matching local/dev
/// deployments that haven't provisioned keys yet.
pub struct ApiKeyValidator {
    tenant_keys: RwLock<HashMap<String, HashSet<String>>>,
    require_api_key: bool,
}

impl ApiKeyValidator {
    pub fn new(tenant_keys: TenantKeyFile, require_api_key: bool) -> Self {
        let tenant_keys = tenant_keys
            .into_iter()
            .map(|(tenant, keys)| (tenant, keys.into_iter().collect()))
            .collect();
        Self {
            tenant_keys: RwLock::new(tenant_keys),
            require_api_key,
        }
    }

    pub fn empty(require_api_key: bool) -> Self {
        Self::new(TenantKeyFile::new(), require_api_key)
    }

    /// Register an additional key for `tenant_id`, e.g. via the CLI's
    /// `tenant add-key` command.
    pub fn add_key(&self, tenant_id: &str, key: String) {
        self.tenant_keys
            .write()
            .unwrap()
            .entry(tenant_id.to_string())
            .or_default()
            .insert(key);
    }

    pub fn enforce(&self, tenant_id: &str, api_key: Option<&str>) -> Result<()> {
        if !self.require_api_key {
            return Ok(());
        }
        let api_key = api_key.filter(|k| !k.is_empty());
        let Some(api_key) = api_key else {
            return Err(AppError::AuthMissing);
        };
        let allowed = self.tenant_keys.read().unwrap();
        let allowed = allowed.get(tenant_id);
        if allowed.is_some_and(|keys| keys.contains(api_key)) {
            Ok(())
        } else {
            Err(AppError::AuthInvalid)
        }
    }
}
