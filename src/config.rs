use anyhow::{Context, Result};

pub const DEFAULT_WAREHOUSE_CREDENTIALS_VAR: &str = "LISTEND_WAREHOUSE_CREDENTIALS";

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    /// Run against in-memory stores instead of Postgres. Useful for local
    /// development without a database.
    pub demo_mode: bool,
    pub enable_stats_jobs: bool,
    /// Minimum interval between successive stats recomputations for a user.
    pub stats_cooldown_days: i64,
    pub stats_poll_interval_seconds: u64,
    /// Name of the environment variable that points at the warehouse
    /// credentials file.
    pub warehouse_credentials_var: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let demo_mode = env_bool("LISTEND_DEMO_MODE", false);

        let database_url = std::env::var("LISTEND_DATABASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        let database_url = if demo_mode {
            database_url.unwrap_or_default()
        } else {
            database_url.context("LISTEND_DATABASE_URL must be set (or run with LISTEND_DEMO_MODE=1)")?
        };

        let enable_stats_jobs = env_bool("LISTEND_ENABLE_STATS_JOBS", true);
        let stats_cooldown_days = env_u64("LISTEND_STATS_COOLDOWN_DAYS", 7).clamp(1, 365) as i64;
        let stats_poll_interval_seconds =
            env_u64("LISTEND_STATS_POLL_INTERVAL_SECONDS", 3600).clamp(10, 7 * 24 * 3600);
        let warehouse_credentials_var = env_string(
            "LISTEND_WAREHOUSE_CREDENTIALS_VAR",
            DEFAULT_WAREHOUSE_CREDENTIALS_VAR,
        );

        Ok(Self {
            database_url,
            demo_mode,
            enable_stats_jobs,
            stats_cooldown_days,
            stats_poll_interval_seconds,
            warehouse_credentials_var,
        })
    }
}

fn env_string(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
        .unwrap_or(default)
}

fn env_bool(name: &str, default: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => {
            let value = value.trim();
            if value.is_empty() {
                default
            } else {
                value == "1"
                    || value.eq_ignore_ascii_case("true")
                    || value.eq_ignore_ascii_case("yes")
            }
        }
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_helpers_fall_back_to_defaults() {
        assert_eq!(env_string("LISTEND_TEST_UNSET_STRING", "fallback"), "fallback");
        assert_eq!(env_u64("LISTEND_TEST_UNSET_U64", 42), 42);
        assert!(env_bool("LISTEND_TEST_UNSET_BOOL", true));
        assert!(!env_bool("LISTEND_TEST_UNSET_BOOL", false));
    }

    #[test]
    fn env_bool_accepts_common_truthy_values() {
        std::env::set_var("LISTEND_TEST_BOOL_TRUTHY", "YES");
        assert!(env_bool("LISTEND_TEST_BOOL_TRUTHY", false));
        std::env::set_var("LISTEND_TEST_BOOL_TRUTHY", "0");
        assert!(!env_bool("LISTEND_TEST_BOOL_TRUTHY", true));
        std::env::remove_var("LISTEND_TEST_BOOL_TRUTHY");
    }
}
