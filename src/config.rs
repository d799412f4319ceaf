use std::{env, str::FromStr, time::Duration};

use crate::checkout::CheckoutPolicy;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub checkout: CheckoutPolicy,
    pub catalog_refresh: Duration,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT").unwrap_or(3000);

        let defaults = CheckoutPolicy::default();
        let checkout = CheckoutPolicy {
            max_attempts: parse_var("CHECKOUT_MAX_ATTEMPTS")
                .filter(|attempts: &u32| *attempts > 0)
                .unwrap_or(defaults.max_attempts),
            base_backoff: parse_var("CHECKOUT_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.base_backoff),
        };
        let catalog_refresh = Duration::from_secs(
            parse_var("CATALOG_REFRESH_SECS")
                .filter(|secs: &u64| *secs > 0)
                .unwrap_or(30),
        );

        Ok(Self {
            database_url,
            host,
            port,
            checkout,
            catalog_refresh,
        })
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|value| value.trim().parse().ok())
}
