// Configuration module entry point
// Loads layered configuration and holds the per-process application state

mod state;
mod types;

use std::net::SocketAddr;

// Re-export public types
pub use state::AppState;
pub use types::{
    CacheConfig, Config, HealthConfig, HttpConfig, LoggingConfig, PerformanceConfig, PolicyConfig,
    ProxyConfig, ServerConfig, UpstreamConfig,
};

/// Default config file (without extension)
pub const DEFAULT_CONFIG_PATH: &str = "config";

impl Config {
    /// Load configuration from specified file path (extension optional)
    ///
    /// Sources, lowest priority first: built-in defaults, the file (optional),
    /// `READER_*` environment variables with `__` between nested keys
    /// (`READER_UPSTREAM__ORIGIN`). `SUPABASE_URL` and
    /// `SUPABASE_SERVICE_ROLE_KEY` fill the upstream origin and service key
    /// when those are still unset.
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("READER")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut cfg: Self = settings.try_deserialize()?;
        cfg.apply_env_fallbacks(|name| std::env::var(name).ok());
        cfg.normalize();
        Ok(cfg)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    fn apply_env_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.upstream.origin.is_none() {
            self.upstream.origin = lookup("SUPABASE_URL");
        }
        if self.upstream.service_key.is_none() {
            self.upstream.service_key = lookup("SUPABASE_SERVICE_ROLE_KEY");
        }
    }

    /// Route prefix always starts and ends with `/`
    fn normalize(&mut self) {
        let trimmed = self.proxy.route_prefix.trim().trim_matches('/');
        self.proxy.route_prefix = if trimmed.is_empty() {
            "/".to_string()
        } else {
            format!("/{trimmed}/")
        };
        if self.proxy.index_file.trim().is_empty() {
            self.proxy.index_file = ProxyConfig::default().index_file;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = Config::default();
        assert_eq!(cfg.proxy.route_prefix, "/reader/");
        assert_eq!(cfg.upstream.bucket, "books");
        assert!(cfg.upstream.origin.is_none());
        assert!(cfg.policy.disable_service_worker);
        assert_eq!(cfg.get_socket_addr().unwrap().port(), 8080);
    }

    #[test]
    fn test_normalize_route_prefix() {
        let mut cfg = Config::default();
        cfg.proxy.route_prefix = "api/reader".to_string();
        cfg.normalize();
        assert_eq!(cfg.proxy.route_prefix, "/api/reader/");

        cfg.proxy.route_prefix = "//".to_string();
        cfg.normalize();
        assert_eq!(cfg.proxy.route_prefix, "/");
    }

    #[test]
    fn test_env_fallbacks_only_fill_gaps() {
        let lookup = |name: &str| match name {
            "SUPABASE_URL" => Some("https://p.example.co".to_string()),
            "SUPABASE_SERVICE_ROLE_KEY" => Some("secret".to_string()),
            _ => None,
        };

        let mut cfg = Config::default();
        cfg.apply_env_fallbacks(lookup);
        assert_eq!(cfg.upstream.origin.as_deref(), Some("https://p.example.co"));
        assert_eq!(cfg.upstream.service_key.as_deref(), Some("secret"));

        let mut cfg = Config::default();
        cfg.upstream.origin = Some("https://configured.example.co".to_string());
        cfg.apply_env_fallbacks(lookup);
        assert_eq!(
            cfg.upstream.origin.as_deref(),
            Some("https://configured.example.co")
        );
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = std::env::temp_dir().join(format!("reader-proxy-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("reader.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9090

[proxy]
route_prefix = "books"

[upstream]
origin = "https://file.example.co"
bucket = "manuals"

[cache]
html_max_age = 30
"#,
        )
        .unwrap();

        let cfg = Config::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(cfg.server.port, 9090);
        assert_eq!(cfg.proxy.route_prefix, "/books/");
        assert_eq!(cfg.upstream.bucket, "manuals");
        assert_eq!(cfg.cache.html_max_age, 30);
        // Untouched sections keep their defaults
        assert_eq!(cfg.cache.asset_max_age, 31_536_000);
        assert_eq!(cfg.logging.access_log_format, "combined");

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
