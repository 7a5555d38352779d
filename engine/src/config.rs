//! Engine configuration from environment variables

/// Runtime configuration, collected once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server binds to
    pub bind_addr: String,
    /// SQLite database path
    pub db_path: String,
    /// AI provider for ritual generation: "openai", "claude", or "offline"
    pub provider: String,
    pub openai_api_key: String,
    pub anthropic_api_key: String,
    /// Active goals allowed per user on the free plan
    pub free_goal_limit: u32,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("RITUAL_BIND").unwrap_or_else(|_| "0.0.0.0:8090".into()),
            db_path: std::env::var("RITUAL_DB")
                .unwrap_or_else(|_| "/var/lib/ritualos/engine.db".into()),
            provider: std::env::var("RITUAL_AI_PROVIDER").unwrap_or_else(|_| "openai".into()),
            openai_api_key: std::env::var("OPENAI_API_KEY").unwrap_or_default(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").unwrap_or_default(),
            free_goal_limit: std::env::var("RITUAL_FREE_GOAL_LIMIT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(1),
        }
    }
}
