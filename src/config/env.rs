use crate::constants;
use crate::utils::outbox::OutboxConfig;
use std::str::FromStr;
use std::time::Duration;

fn var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn var_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| {
        tracing::warn!("{} not set, using {}", key, default);
        default.to_string()
    })
}

fn parsed_or<T: FromStr + Copy + std::fmt::Debug>(key: &str, default: T) -> T {
    match var(key) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            tracing::warn!("{}={} is not valid, using {:?}", key, raw, default);
            default
        }),
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: String,
    /// No database means everything lives in memory.
    pub database_url: Option<String>,
    pub sql_dir: String,
    /// No Redis means an in-process cache.
    pub redis_url: Option<String>,
    pub cache_sliding: Duration,
    pub jwt_key: String,
    pub token_validity_secs: i64,
    /// No relay means emails are only logged.
    pub mail_relay_url: Option<String>,
    pub mail_relay_token: Option<String>,
    pub mail_from_name: String,
    pub mail_from_address: String,
    pub outbox: OutboxConfig,
}

impl Config {
    /// Reads `.env` (when present) and the process environment.
    pub fn load() -> Self {
        if let Err(e) = dotenv::dotenv() {
            tracing::debug!("no .env file: {}", e);
        }
        let defaults = OutboxConfig::default();
        let jwt_key = var("JWT_HS256_KEY").unwrap_or_else(|| {
            tracing::warn!("JWT_HS256_KEY not set, every bearer token will be rejected");
            String::new()
        });
        Self {
            addr: var_or("ADDR", "0.0.0.0:8080"),
            database_url: var("DATABASE_URL"),
            sql_dir: var_or("SQL_DIR", "sql"),
            redis_url: var("REDIS_URL"),
            cache_sliding: Duration::from_secs(parsed_or(
                "CACHE_SLIDING_SECS",
                constants::DEFAULT_SLIDING_WINDOW.as_secs(),
            )),
            jwt_key,
            token_validity_secs: parsed_or("TOKEN_VALIDITY_SECS", 7 * 24 * 3600),
            mail_relay_url: var("MAIL_RELAY_URL"),
            mail_relay_token: var("MAIL_RELAY_TOKEN"),
            mail_from_name: var_or("MAIL_FROM_NAME", "Campus Learn"),
            mail_from_address: var_or("MAIL_FROM_ADDRESS", "noreply@campuslearn.com"),
            outbox: OutboxConfig {
                send_timeout: Duration::from_millis(parsed_or(
                    "EMAIL_SEND_TIMEOUT_MS",
                    defaults.send_timeout.as_millis() as u64,
                )),
                batch_delay: Duration::from_millis(parsed_or(
                    "EMAIL_BATCH_DELAY_MS",
                    defaults.batch_delay.as_millis() as u64,
                )),
                max_inflight: parsed_or("EMAIL_MAX_INFLIGHT", defaults.max_inflight).max(1),
                shutdown_timeout: defaults.shutdown_timeout,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_numbers_fall_back() {
        std::env::set_var("CAMPUS_TEST_NUM", "12x");
        assert_eq!(parsed_or("CAMPUS_TEST_NUM", 7u64), 7);
        std::env::set_var("CAMPUS_TEST_NUM", " 12 ");
        assert_eq!(parsed_or("CAMPUS_TEST_NUM", 7u64), 12);
        std::env::set_var("CAMPUS_TEST_BLANK", "  ");
        assert_eq!(var("CAMPUS_TEST_BLANK"), None);
    }
}
