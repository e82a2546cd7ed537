use std::path::Path;

use anyhow::{Context, Result};

const DEFAULT_CONFIG: &str = r#"# instant configuration

[server]
# Code search frontend queried by `instant search` and `instant open`.
base_url = "http://localhost:28080"

[transport]
# "auto" (event source), "event-source" or "websocket".
mechanism = "auto"
reconnect_base_ms = 1000
reconnect_max_ms = 30000
# Give up after this many failed reconnects. Unset retries forever.
# max_reconnect_attempts = 10

[session]
# Delay before a page load shows its own progress.
page_loading_delay_ms = 200
package_page_loading_delay_ms = 20
max_listed_packages = 1000

[proxy]
host = "127.0.0.1"
port = 8080
upstream = "http://localhost:28080"
db_path = "~/.instant/cache.redb"
# Bump to discard every previously cached asset on the next activation.
version = "v2/"
placeholder = "/placeholder.html?2"
"#;

pub fn run_init(path: &Path) -> Result<()> {
    if path.exists() {
        anyhow::bail!("Config file already exists: {:?}", path);
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {:?}", parent))?;
        }
    }

    std::fs::write(path, DEFAULT_CONFIG)
        .context(format!("Failed to write config: {:?}", path))?;
    println!("Created config at {:?}", path);
    Ok(())
}
