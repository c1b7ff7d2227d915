//! Runtime configuration
//!
//! All tunables live here, loaded from the environment with sane defaults.
//! Binaries call `dotenv::dotenv()` before `Settings::from_env`.

use std::env;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Settings {
    // API server
    pub api_host: String,
    pub api_port: u16,

    // Mistral API
    pub mistral_api_key: Option<String>,
    pub mistral_model: String,
    pub mistral_temperature: f32,
    pub mistral_max_tokens: u32,

    // Retrieval
    pub retrieval_top_k: usize,

    // Sessions
    pub session_timeout_minutes: i64,
    pub history_window: usize,

    // Authentication
    pub auth_token_expiry_minutes: i64,

    // Fraud detection
    pub fraud_velocity_limit: usize,
    pub fraud_velocity_window_secs: i64,
    pub fraud_amount_threshold: f64,

    // Validation limits
    pub transfer_daily_limit: f64,
    pub bill_payment_daily_limit: f64,

    // Ledger gateway
    pub ledger_timeout_secs: u64,

    // Audit persistence (optional)
    pub database_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8000,
            mistral_api_key: None,
            mistral_model: "mistral-large-latest".to_string(),
            mistral_temperature: 0.3,
            mistral_max_tokens: 1024,
            retrieval_top_k: 3,
            session_timeout_minutes: 30,
            history_window: 10,
            auth_token_expiry_minutes: 30,
            fraud_velocity_limit: 3,
            fraud_velocity_window_secs: 3600,
            fraud_amount_threshold: 10_000.0,
            transfer_daily_limit: 50_000.0,
            bill_payment_daily_limit: 20_000.0,
            ledger_timeout_secs: 10,
            database_url: None,
        }
    }
}

impl Settings {
    /// Load settings from the environment, falling back to defaults for
    /// anything unset or unparseable.
    pub fn from_env() -> Self {
        let defaults = Settings::default();

        Self {
            api_host: env::var("API_HOST").unwrap_or(defaults.api_host),
            api_port: env_parse("API_PORT", defaults.api_port),
            mistral_api_key: env::var("MISTRAL_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty() && key != "your_mistral_api_key_here"),
            mistral_model: env::var("MISTRAL_MODEL").unwrap_or(defaults.mistral_model),
            mistral_temperature: env_parse("MISTRAL_TEMPERATURE", defaults.mistral_temperature),
            mistral_max_tokens: env_parse("MISTRAL_MAX_TOKENS", defaults.mistral_max_tokens),
            retrieval_top_k: env_parse("RETRIEVAL_TOP_K", defaults.retrieval_top_k),
            session_timeout_minutes: env_parse(
                "SESSION_TIMEOUT_MINUTES",
                defaults.session_timeout_minutes,
            ),
            history_window: env_parse("HISTORY_WINDOW", defaults.history_window),
            auth_token_expiry_minutes: env_parse(
                "AUTH_TOKEN_EXPIRY_MINUTES",
                defaults.auth_token_expiry_minutes,
            ),
            fraud_velocity_limit: env_parse("FRAUD_VELOCITY_LIMIT", defaults.fraud_velocity_limit),
            fraud_velocity_window_secs: env_parse(
                "FRAUD_VELOCITY_WINDOW_SECS",
                defaults.fraud_velocity_window_secs,
            ),
            fraud_amount_threshold: env_parse(
                "FRAUD_AMOUNT_THRESHOLD",
                defaults.fraud_amount_threshold,
            ),
            transfer_daily_limit: env_parse("TRANSFER_DAILY_LIMIT", defaults.transfer_daily_limit),
            bill_payment_daily_limit: env_parse(
                "BILL_PAYMENT_DAILY_LIMIT",
                defaults.bill_payment_daily_limit,
            ),
            ledger_timeout_secs: env_parse("LEDGER_TIMEOUT_SECS", defaults.ledger_timeout_secs),
            database_url: env::var("DATABASE_URL")
                .or_else(|_| env::var("POSTGRES_URL"))
                .ok(),
        }
    }

    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_secs(self.ledger_timeout_secs)
    }
}

fn env_parse<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.fraud_velocity_limit, 3);
        assert_eq!(settings.fraud_velocity_window_secs, 3600);
        assert_eq!(settings.fraud_amount_threshold, 10_000.0);
        assert_eq!(settings.transfer_daily_limit, 50_000.0);
        assert_eq!(settings.bill_payment_daily_limit, 20_000.0);
        assert_eq!(settings.session_timeout_minutes, 30);
    }

    #[test]
    fn test_env_parse_fallback() {
        std::env::set_var("TEST_ENV_PARSE_GARBAGE", "not-a-number");
        assert_eq!(env_parse("TEST_ENV_PARSE_GARBAGE", 7u16), 7);
        std::env::remove_var("TEST_ENV_PARSE_GARBAGE");
    }
}
