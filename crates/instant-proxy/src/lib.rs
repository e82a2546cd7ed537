pub mod config;
pub mod escape;
pub mod manifest;
pub mod proxy;
pub mod server;
pub mod storage;
pub mod types;
pub mod upstream;

pub use config::ProxyConfig;
pub use manifest::CacheManifest;
pub use proxy::CacheProxy;
pub use server::{create_router, start_server, AppState};
pub use storage::{CacheStorage, MemoryCacheStorage, RedbCacheStorage};
pub use types::{FetchOutcome, ProxyResponse};
pub use upstream::{HttpUpstream, Upstream};
