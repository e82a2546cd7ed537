use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Which stream mechanism to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Mechanism {
    /// Event source when available, websocket otherwise.
    #[default]
    Auto,
    EventSource,
    Websocket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub mechanism: Mechanism,

    #[serde(default = "default_reconnect_base_ms")]
    pub reconnect_base_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,

    /// Give up after this many consecutive failed reconnects (unset = never).
    #[serde(default)]
    pub max_reconnect_attempts: Option<u32>,
}

fn default_reconnect_base_ms() -> u64 {
    1000
}

fn default_reconnect_max_ms() -> u64 {
    30_000
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            mechanism: Mechanism::default(),
            reconnect_base_ms: default_reconnect_base_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            max_reconnect_attempts: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Delay before a flat page load shows its progress bar.
    #[serde(default = "default_page_loading_delay_ms")]
    pub page_loading_delay_ms: u64,

    #[serde(default = "default_package_page_loading_delay_ms")]
    pub package_page_loading_delay_ms: u64,

    /// Cap on package filter links rendered after completion.
    #[serde(default = "default_max_listed_packages")]
    pub max_listed_packages: usize,
}

fn default_page_loading_delay_ms() -> u64 {
    200
}

fn default_package_page_loading_delay_ms() -> u64 {
    20
}

fn default_max_listed_packages() -> usize {
    1000
}

impl SessionConfig {
    pub fn page_loading_delay(&self) -> Duration {
        Duration::from_millis(self.page_loading_delay_ms)
    }

    pub fn package_page_loading_delay(&self) -> Duration {
        Duration::from_millis(self.package_page_loading_delay_ms)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            page_loading_delay_ms: default_page_loading_delay_ms(),
            package_page_loading_delay_ms: default_package_page_loading_delay_ms(),
            max_listed_packages: default_max_listed_packages(),
        }
    }
}
