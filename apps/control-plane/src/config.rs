//! [apps/control-plane/src/config.rs]
//! Environment-derived settings. Every default is chosen so an empty
//! `.env` still boots into a usable single-tenant deployment.

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub api_port: u16,
    pub db_path: String,
    pub max_sessions: usize,
    pub llm_max_concurrent: usize,
    pub llm_rate_per_min: u32,
    pub llm_timeout_s: u64,
    pub queue_max: usize,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("NYX_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: env_or("NYX_PORT", 8420),
            api_port: env_or("NYX_API_PORT", 8420),
            db_path: std::env::var("NYX_DB_PATH").unwrap_or_else(|_| "data/nyx_light.db".to_string()),
            max_sessions: env_or("NYX_MAX_SESSIONS", 15),
            llm_max_concurrent: env_or("NYX_LLM_MAX_CONCURRENT", 3),
            llm_rate_per_min: env_or("NYX_LLM_RATE_PER_MIN", 10),
            llm_timeout_s: env_or("NYX_LLM_TIMEOUT_S", 120),
            queue_max: env_or("NYX_QUEUE_MAX", 50),
        }
    }
}
