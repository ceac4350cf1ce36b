// Application state module
// Per-process state shared by every connection

use std::sync::Arc;

use super::types::Config;
use crate::proxy::{HeaderPolicy, ObjectResolver, RewriteOptions, StorageClient};

/// Application state
///
/// Built once at startup; request handlers only read from it.
#[derive(Debug)]
pub struct AppState {
    pub config: Config,
    pub resolver: ObjectResolver,
    pub header_policy: HeaderPolicy,
    pub rewrite_options: RewriteOptions,
}

impl AppState {
    /// Create `AppState`, building the storage client from `config.upstream`
    pub fn new(config: Config) -> Result<Self, reqwest::Error> {
        let client = Arc::new(StorageClient::new(&config.upstream)?);
        Ok(Self::with_client(config, client))
    }

    /// Create `AppState` around an existing storage client
    pub fn with_client(config: Config, client: Arc<StorageClient>) -> Self {
        let resolver = ObjectResolver::new(client, &config.upstream);
        let header_policy = HeaderPolicy::from_config(&config.cache, &config.policy);
        let rewrite_options = RewriteOptions {
            disable_service_worker: config.policy.disable_service_worker,
        };

        Self {
            config,
            resolver,
            header_policy,
            rewrite_options,
        }
    }
}
