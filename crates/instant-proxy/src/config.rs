use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin of the search frontend the proxy sits in front of.
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// redb file holding the asset cache. `~` is expanded.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Cache version prefix. Namespaces not starting with it are removed
    /// on activation.
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default = "default_assets")]
    pub assets: Vec<String>,

    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_upstream() -> String {
    "http://localhost:28080".to_string()
}

fn default_db_path() -> String {
    "~/.instant/cache.redb".to_string()
}

fn default_version() -> String {
    "v2/".to_string()
}

pub fn default_placeholder() -> String {
    "/placeholder.html?2".to_string()
}

pub fn default_assets() -> Vec<String> {
    [
        "/non-critical.min.css",
        "/Pics/openlogo-50.svg",
        "/Pics/rackspace.svg",
        "/jquery.min.js",
        "/url-search-params.min.js",
        "/loadCSS.min.js",
        "/cssrelpreload.min.js",
        "/instant.min.js?9",
        // Fonts are cached in woff2 only.
        "/Inconsolata.woff2",
        "/Roboto-Regular.woff2",
        "/Roboto-Bold.woff2",
        "/placeholder.html?2",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl ProxyConfig {
    pub fn expanded_db_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.db_path).into_owned())
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            upstream: default_upstream(),
            db_path: default_db_path(),
            version: default_version(),
            assets: default_assets(),
            placeholder: default_placeholder(),
        }
    }
}
