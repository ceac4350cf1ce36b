// Configuration types module
// Defines all configuration-related data structures

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub performance: PerformanceConfig,
    pub http: HttpConfig,
    pub proxy: ProxyConfig,
    pub upstream: UpstreamConfig,
    pub policy: PolicyConfig,
    pub cache: CacheConfig,
    pub health: HealthConfig,
}

/// Server configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            workers: None,
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    /// Minimum level: debug, info, warn, error
    pub level: String,
    pub access_log: bool,
    pub show_headers: bool,
    /// Access log format (combined, common, json, or custom pattern)
    pub access_log_format: String,
    /// Access log file path (optional, stdout if not set)
    pub access_log_file: Option<String>,
    /// Error log file path (optional, stderr if not set)
    pub error_log_file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            access_log: true,
            show_headers: false,
            access_log_format: "combined".to_string(),
            access_log_file: None,
            error_log_file: None,
        }
    }
}

/// Performance configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PerformanceConfig {
    pub keep_alive_timeout: u64,
    /// Per-connection limit in seconds (max of read/write); 0 disables it
    pub read_timeout: u64,
    pub write_timeout: u64,
    pub max_connections: Option<u64>,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            keep_alive_timeout: 75,
            read_timeout: 120,
            write_timeout: 120,
            max_connections: None,
        }
    }
}

/// HTTP configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub server_name: String,
    pub enable_cors: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            server_name: concat!("reader-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
            enable_cors: false,
        }
    }
}

/// Reader route configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProxyConfig {
    /// Path prefix the reader is mounted under, e.g. `/reader/`
    pub route_prefix: String,
    /// Externally visible prefix used for `<base href>` when a gateway in
    /// front of the server rewrites paths, e.g. `https://site.example/api/reader/`
    pub public_base_path: Option<String>,
    /// Object appended to keys requested with a trailing slash
    pub index_file: String,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            route_prefix: "/reader/".to_string(),
            public_base_path: None,
            index_file: "index.html".to_string(),
        }
    }
}

/// Object store configuration
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Storage origin, e.g. `https://project.supabase.co`
    pub origin: Option<String>,
    pub bucket: String,
    /// Enables signed access when the public read is refused
    pub service_key: Option<String>,
    /// Bucket used for signed access (defaults to `bucket`)
    pub signed_bucket: Option<String>,
    /// Signed URL lifetime in seconds
    pub signed_url_ttl: u64,
    /// Seconds allowed for establishing the upstream connection
    pub connect_timeout: u64,
    /// Honor `HTTP_PROXY`/`HTTPS_PROXY` for upstream requests
    pub system_proxy: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            origin: None,
            bucket: "books".to_string(),
            service_key: None,
            signed_bucket: None,
            signed_url_ttl: 3600,
            connect_timeout: 10,
            system_proxy: true,
        }
    }
}

/// Rewrite and header policy switches
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PolicyConfig {
    /// Send a permissive CSP instead of none
    pub relaxed_csp: bool,
    /// Stub out the bundle's service worker registration
    pub disable_service_worker: bool,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            relaxed_csp: false,
            disable_service_worker: true,
        }
    }
}

/// Cache-Control lifetimes in seconds
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// Rewritten HTML; 0 means `no-store`
    pub html_max_age: u32,
    /// Content-hashed files under `assets/`
    pub asset_max_age: u32,
    /// Other passthrough files
    pub revalidate_max_age: u32,
    pub stale_while_revalidate: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            html_max_age: 0,
            asset_max_age: 31_536_000,
            revalidate_max_age: 3600,
            stale_while_revalidate: 86400,
        }
    }
}

/// Health check configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HealthConfig {
    /// Enable health check endpoints
    #[serde(default = "default_health_enabled")]
    pub enabled: bool,
    /// Liveness probe path (default: /healthz)
    #[serde(default = "default_healthz_path")]
    pub liveness_path: String,
    /// Readiness probe path (default: /readyz)
    #[serde(default = "default_readyz_path")]
    pub readiness_path: String,
}

#[allow(clippy::missing_const_for_fn)]
fn default_health_enabled() -> bool {
    true
}

#[allow(clippy::missing_const_for_fn)]
fn default_healthz_path() -> String {
    "/healthz".to_string()
}

#[allow(clippy::missing_const_for_fn)]
fn default_readyz_path() -> String {
    "/readyz".to_string()
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            enabled: default_health_enabled(),
            liveness_path: default_healthz_path(),
            readiness_path: default_readyz_path(),
        }
    }
}
