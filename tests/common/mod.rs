use gohunt::config::Config;

/// Check if we should skip tests that hit a real backend
#[allow(dead_code)]
pub fn should_skip_live_api_tests() -> bool {
    std::env::var("SKIP_REAL_API_TESTS").is_ok() || std::env::var("API_BASE_URL").is_err()
}

/// Get test configuration
#[allow(dead_code)]
pub fn get_test_config() -> Config {
    Config {
        api_base_url: std::env::var("API_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8000/api".to_string()),
        app_key: std::env::var("APP_KEY").ok(),
        app_secret: std::env::var("APP_SECRET").ok(),
        redis_url: std::env::var("REDIS_URL").ok(),
        viewport_cache_ttl: 120,
        token_store_path: std::env::temp_dir()
            .join(format!("gohunt-test-session-{}.json", std::process::id()))
            .to_string_lossy()
            .into_owned(),
    }
}
