use crate::constants::*;
use std::env;

/// Deployment configuration, loaded from the environment (with `.env`
/// support). Protocol-level values (grid size, refetch threshold, bounds
/// tolerance) are constants, not configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the game REST API.
    pub api_base_url: String,
    /// Optional app header pair attached to every request.
    pub app_key: Option<String>,
    pub app_secret: Option<String>,
    /// Realtime transport. Absent means no live spawn events.
    pub redis_url: Option<String>,
    /// TTL (seconds) for the single-slot viewport spawn cache.
    pub viewport_cache_ttl: u64,
    /// Where the bearer token is persisted between runs.
    pub token_store_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        dotenv::dotenv().ok();

        Ok(Config {
            api_base_url: env::var("API_BASE_URL").map_err(|_| "API_BASE_URL must be set")?,
            app_key: env::var("APP_KEY").ok(),
            app_secret: env::var("APP_SECRET").ok(),
            redis_url: env::var("REDIS_URL").ok(),
            viewport_cache_ttl: env::var("VIEWPORT_CACHE_TTL")
                .unwrap_or_else(|_| DEFAULT_VIEWPORT_CACHE_TTL_SECONDS.to_string())
                .parse()
                .map_err(|_| "Invalid VIEWPORT_CACHE_TTL")?,
            token_store_path: env::var("TOKEN_STORE_PATH")
                .unwrap_or_else(|_| DEFAULT_TOKEN_STORE_PATH.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for key in [
            "API_BASE_URL",
            "APP_KEY",
            "APP_SECRET",
            "REDIS_URL",
            "VIEWPORT_CACHE_TTL",
            "TOKEN_STORE_PATH",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn requires_api_base_url() {
        clear_env();
        assert!(Config::from_env().is_err());
    }

    #[test]
    #[serial]
    fn defaults_apply() {
        clear_env();
        env::set_var("API_BASE_URL", "https://api.example.com/v1");

        let config = Config::from_env().unwrap();
        assert_eq!(config.api_base_url, "https://api.example.com/v1");
        assert!(config.app_key.is_none());
        assert!(config.redis_url.is_none());
        assert_eq!(config.viewport_cache_ttl, DEFAULT_VIEWPORT_CACHE_TTL_SECONDS);
        assert_eq!(config.token_store_path, DEFAULT_TOKEN_STORE_PATH);
    }

    #[test]
    #[serial]
    fn explicit_values_override_defaults() {
        clear_env();
        env::set_var("API_BASE_URL", "https://api.example.com/v1");
        env::set_var("APP_KEY", "key123");
        env::set_var("APP_SECRET", "secret456");
        env::set_var("REDIS_URL", "redis://localhost:6379");
        env::set_var("VIEWPORT_CACHE_TTL", "30");
        env::set_var("TOKEN_STORE_PATH", "/tmp/session.json");

        let config = Config::from_env().unwrap();
        assert_eq!(config.app_key.as_deref(), Some("key123"));
        assert_eq!(config.app_secret.as_deref(), Some("secret456"));
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.viewport_cache_ttl, 30);
        assert_eq!(config.token_store_path, "/tmp/session.json");

        clear_env();
    }

    #[test]
    #[serial]
    fn invalid_ttl_is_rejected() {
        clear_env();
        env::set_var("API_BASE_URL", "https://api.example.com/v1");
        env::set_var("VIEWPORT_CACHE_TTL", "not-a-number");

        assert!(Config::from_env().is_err());
        clear_env();
    }
}
