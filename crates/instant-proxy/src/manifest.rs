use crate::config::ProxyConfig;

/// The fixed set of static assets cached for one version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheManifest {
    pub version: String,
    pub assets: Vec<String>,
    pub placeholder: String,
}

impl CacheManifest {
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self {
            version: config.version.clone(),
            assets: config.assets.clone(),
            placeholder: config.placeholder.clone(),
        }
    }

    /// Cache namespace holding this version's assets.
    pub fn namespace(&self) -> String {
        format!("{}assets", self.version)
    }

    /// Exact match on path plus query.
    pub fn contains(&self, path_and_query: &str) -> bool {
        self.assets.iter().any(|asset| asset == path_and_query)
    }

    pub fn is_current(&self, namespace: &str) -> bool {
        namespace.starts_with(&self.version)
    }
}

impl Default for CacheManifest {
    fn default() -> Self {
        Self::from_config(&ProxyConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_and_lookup() {
        let manifest = CacheManifest::default();
        assert_eq!(manifest.namespace(), "v2/assets");
        assert!(manifest.contains("/instant.min.js?9"));
        // Query strings are part of the key.
        assert!(!manifest.contains("/instant.min.js"));
        assert!(!manifest.contains("/instant.min.js?8"));
    }

    #[test]
    fn test_current_namespaces() {
        let manifest = CacheManifest::default();
        assert!(manifest.is_current("v2/assets"));
        assert!(!manifest.is_current("v1/assets"));
        assert!(!manifest.is_current("assets"));
    }
}
