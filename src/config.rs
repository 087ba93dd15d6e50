//! Application configuration, loaded from environment variables.

use crate::core_types::UserId;

/// Complete runtime configuration.
///
/// A flat `std::env::var(...).parse()` style rather than a nested
/// config-file loader: this system has no per-tenant or per-region
/// nesting that would warrant one.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub db_host: String,
    pub db_port: u16,
    pub db_user: String,
    pub db_password: String,
    pub db_name: String,

    pub redis_host: String,
    pub redis_port: u16,

    pub jwt_secret: String,

    /// Distinguished internal account that funds bot stakes, receives
    /// fees, and absorbs bot wins/losses. `None` if unconfigured, in
    /// which case matches fall back to PRACTICE mode.
    pub house_user_id: Option<UserId>,
    pub house_start_balance: i64,

    pub app_url: String,

    // Parsed but not consumed by the core engine; out of scope per spec.
    pub smtp_host: Option<String>,
    pub smtp_port: Option<u16>,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,

    pub bind_addr: String,

    pub log_dir: String,
    pub log_file: String,
    pub rotation: String,
    pub enable_tracing: bool,
    pub log_level: String,
    pub use_json: bool,
}

impl AppConfig {
    /// Load configuration from environment variables, applying the same
    /// defaults a local dev environment would use.
    pub fn from_env() -> Self {
        Self {
            db_host: env_or("DB_HOST", "localhost"),
            db_port: env_parse_or("DB_PORT", 5432),
            db_user: env_or("DB_USER", "clash_arena"),
            db_password: env_or("DB_PASSWORD", "clash_arena"),
            db_name: env_or("DB_NAME", "clash_arena"),

            redis_host: env_or("REDIS_HOST", "localhost"),
            redis_port: env_parse_or("REDIS_PORT", 6379),

            jwt_secret: env_or("JWT_SECRET", "dev-secret-change-me"),

            house_user_id: std::env::var("HOUSE_USER_ID")
                .ok()
                .and_then(|s| s.parse().ok()),
            house_start_balance: env_parse_or("HOUSE_START_BALANCE", 0),

            app_url: env_or("APP_URL", "http://localhost:8080"),

            smtp_host: std::env::var("SMTP_HOST").ok(),
            smtp_port: std::env::var("SMTP_PORT").ok().and_then(|s| s.parse().ok()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),

            bind_addr: env_or("BIND_ADDR", "0.0.0.0:8080"),

            log_dir: env_or("LOG_DIR", "logs"),
            log_file: env_or("LOG_FILE", "clash_arena.log"),
            rotation: env_or("LOG_ROTATION", "daily"),
            enable_tracing: env_parse_or("ENABLE_TRACING", true),
            log_level: env_or("LOG_LEVEL", "info"),
            use_json: env_parse_or("LOG_JSON", false),
        }
    }

    /// Postgres connection string built from the discrete DB_* fields.
    pub fn database_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
        )
    }

    /// Redis connection string built from REDIS_HOST/PORT.
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}", self.redis_host, self.redis_port)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_formats_from_parts() {
        let cfg = AppConfig {
            db_host: "db".into(),
            db_port: 5432,
            db_user: "u".into(),
            db_password: "p".into(),
            db_name: "n".into(),
            redis_host: "cache".into(),
            redis_port: 6379,
            jwt_secret: "s".into(),
            house_user_id: None,
            house_start_balance: 0,
            app_url: "http://x".into(),
            smtp_host: None,
            smtp_port: None,
            smtp_user: None,
            smtp_password: None,
            bind_addr: "0.0.0.0:8080".into(),
            log_dir: "logs".into(),
            log_file: "x.log".into(),
            rotation: "daily".into(),
            enable_tracing: true,
            log_level: "info".into(),
            use_json: false,
        };
        assert_eq!(cfg.database_url(), "postgres://u:p@db:5432/n");
        assert_eq!(cfg.redis_url(), "redis://cache:6379");
    }
}
