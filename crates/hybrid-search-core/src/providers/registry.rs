//! Generic keyed provider registry with alias and default-fallback resolution.

use std::collections::HashMap;

/// Outcome of resolving a provider key, carrying enough detail for the
/// caller to log a fallback without re-deriving it.
pub struct Resolved<P> {
    pub instance: P,
    pub resolved_key: String,
    pub fallback_from: Option<String>,
}

/// Registry of named factories for some provider trait object `P`, with
/// alias support and fallback to a configured default key when the
/// requested key is missing or unregistered.
pub struct ProviderRegistry<P> {
    default_key: String,
    factories: HashMap<String, Box<dyn Fn() -> P + Send + Sync>>,
    canonical_keys: HashMap<String, String>,
}

fn normalize(key: &str) -> Option<String> {
    let normalized = key.trim().to_lowercase();
    if normalized.is_empty() {
        None
    } else {
        Some(normalized)
    }
}

impl<P> ProviderRegistry<P> {
    /// Create a new registry; `default_key` must be non-empty.
    pub fn new(default_key: &str) -> Self {
        let default_key = normalize(default_key).expect("default_key must be non-empty");
        Self {
            default_key,
            factories: HashMap::new(),
            canonical_keys: HashMap::new(),
        }
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    /// Register a factory under `key`, plus any `aliases`, all resolving to
    /// the same canonical key.
    pub fn register<F>(&mut self, key: &str, aliases: &[&str], factory: F)
    where
        F: Fn() -> P + Send + Sync + 'static,
    {
        let canonical = normalize(key).expect("provider key must be non-empty");
        let mut keys = vec![canonical.clone()];
        keys.extend(aliases.iter().filter_map(|a| normalize(a)));

        let factory = std::sync::Arc::new(factory);
        for k in keys {
            let factory = factory.clone();
            self.canonical_keys.insert(k.clone(), canonical.clone());
            self.factories.insert(k, Box::new(move || factory()));
        }
    }

    /// Instantiate the provider for `key`, falling back to the default when
    /// `key` is `None`/empty or unregistered.
    pub fn create(&self, key: Option<&str>) -> Result<Resolved<P>, String> {
        let requested = key.and_then(normalize);
        let mut lookup_key = requested.clone().unwrap_or_else(|| self.default_key.clone());
        let mut fallback_from = None;

        if !self.factories.contains_key(&lookup_key) {
            fallback_from = Some(lookup_key.clone());
            lookup_key = self.default_key.clone();
        }

        let factory = self
            .factories
            .get(&lookup_key)
            .ok_or_else(|| format!("default provider '{}' is not registered", self.default_key))?;

        let instance = factory();
        let resolved_key = self
            .canonical_keys
            .get(&lookup_key)
            .cloned()
            .unwrap_or(lookup_key);

        if fallback_from.as_deref() == Some(self.default_key.as_str()) && requested.is_none() {
            fallback_from = None;
        }

        Ok(Resolved {
            instance,
            resolved_key,
            fallback_from,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_registered_key_directly() {
        let mut reg: ProviderRegistry<&'static str> = ProviderRegistry::new("default");
        reg.register("default", &[], || "default-impl");
        reg.register("fancy", &["fancy-alias"], || "fancy-impl");

        let resolved = reg.create(Some("fancy")).unwrap();
        assert_eq!(resolved.instance, "fancy-impl");
        assert_eq!(resolved.resolved_key, "fancy");
        assert!(resolved.fallback_from.is_none());
    }

    #[test]
    fn alias_resolves_to_canonical_key() {
        let mut reg: ProviderRegistry<&'static str> = ProviderRegistry::new("default");
        reg.register("default", &[], || "default-impl");
        reg.register("fancy", &["fancy-alias"], || "fancy-impl");

        let resolved = reg.create(Some("FANCY-ALIAS")).unwrap();
        assert_eq!(resolved.resolved_key, "fancy");
    }

    #[test]
    fn unregistered_key_falls_back_to_default_and_reports_it() {
        let mut reg: ProviderRegistry<&'static str> = ProviderRegistry::new("default");
        reg.register("default", &[], || "default-impl");

        let resolved = reg.create(Some("nonexistent")).unwrap();
        assert_eq!(resolved.instance, "default-impl");
        assert_eq!(resolved.fallback_from.as_deref(), Some("nonexistent"));
    }

    #[test]
    fn absent_key_uses_default_without_fallback_marker() {
        let mut reg: ProviderRegistry<&'static str> = ProviderRegistry::new("default");
        reg.register("default", &[], || "default-impl");

        let resolved = reg.create(None).unwrap();
        assert_eq!(resolved.instance, "default-impl");
        assert!(resolved.fallback_from.is_none());
    }
}
