//! Server Configuration
//!
//! Read once from the environment (and `.env` in development).

use anyhow::{Context, bail};
use std::time::Duration;

use edu_payments::provider::DEFAULT_API_BASE;
use edu_payments::webhook::{DEFAULT_TOLERANCE_SECS, MAX_TOLERANCE_SECS};

/// Deployment environment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }
}

/// Runtime configuration
#[derive(Clone)]
pub struct Config {
    pub bind_addr: String,
    pub env: AppEnv,
    pub public_base_url: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub payments_access_token: Option<String>,
    pub payments_api_base: String,
    pub payments_timeout: Duration,
    pub currency: String,
    pub webhook_secret: Option<String>,
    pub webhook_insecure: bool,
    pub webhook_tolerance_secs: u32,
    /// Seed demo courses, users and sessions into the in-memory store
    pub dev_seed: bool,
}

// Credentials stay out of logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_addr", &self.bind_addr)
            .field("env", &self.env)
            .field("public_base_url", &self.public_base_url)
            .field("database_url", &self.database_url.as_ref().map(|_| "***"))
            .field("payments_access_token", &self.payments_access_token.as_ref().map(|_| "***"))
            .field("payments_api_base", &self.payments_api_base)
            .field("currency", &self.currency)
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "***"))
            .field("webhook_insecure", &self.webhook_insecure)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let non_empty = |key: &str| {
            var(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let flag = |key: &str| {
            non_empty(key).is_some_and(|v| {
                matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes")
            })
        };

        let env = non_empty("APP_ENV").map_or(AppEnv::Development, |v| AppEnv::parse(&v));
        let webhook_secret = non_empty("PAYMENTS_WEBHOOK_SECRET");
        let webhook_insecure = flag("PAYMENTS_WEBHOOK_INSECURE");

        if env == AppEnv::Production && webhook_insecure {
            bail!("PAYMENTS_WEBHOOK_INSECURE cannot be enabled when APP_ENV=production");
        }

        let timeout_secs: u64 = non_empty("PAYMENTS_TIMEOUT_SECS")
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("PAYMENTS_TIMEOUT_SECS must be a whole number of seconds")?
            .unwrap_or(5);

        let webhook_tolerance_secs: u32 = non_empty("WEBHOOK_TOLERANCE_SECS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("WEBHOOK_TOLERANCE_SECS must be a whole number of seconds")?
            .unwrap_or(DEFAULT_TOLERANCE_SECS);
        if !(1..=MAX_TOLERANCE_SECS).contains(&webhook_tolerance_secs) {
            bail!("WEBHOOK_TOLERANCE_SECS must be between 1 and {MAX_TOLERANCE_SECS}");
        }

        let database_max_connections: u32 = non_empty("DATABASE_MAX_CONNECTIONS")
            .map(|v| v.parse::<u32>())
            .transpose()
            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?
            .unwrap_or(10);

        Ok(Self {
            bind_addr: non_empty("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into()),
            env,
            public_base_url: non_empty("PUBLIC_BASE_URL")
                .unwrap_or_else(|| "http://localhost:3000".into()),
            database_url: non_empty("DATABASE_URL"),
            database_max_connections,
            payments_access_token: non_empty("PAYMENTS_ACCESS_TOKEN"),
            payments_api_base: non_empty("PAYMENTS_API_BASE")
                .unwrap_or_else(|| DEFAULT_API_BASE.into()),
            payments_timeout: Duration::from_secs(timeout_secs),
            currency: non_empty("PAYMENTS_CURRENCY").unwrap_or_else(|| "BRL".into()),
            webhook_secret,
            webhook_insecure,
            webhook_tolerance_secs,
            dev_seed: env != AppEnv::Production && flag("DEV_SEED"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.env, AppEnv::Development);
        assert_eq!(config.currency, "BRL");
        assert_eq!(config.payments_api_base, DEFAULT_API_BASE);
        assert_eq!(config.payments_timeout, Duration::from_secs(5));
        assert_eq!(config.webhook_tolerance_secs, 300);
        assert!(config.payments_access_token.is_none());
        assert!(config.webhook_secret.is_none());
        assert!(!config.webhook_insecure);
        assert!(!config.dev_seed);
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = config(&[("PAYMENTS_ACCESS_TOKEN", "  "), ("DATABASE_URL", "")]).unwrap();
        assert!(config.payments_access_token.is_none());
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_insecure_webhooks_refused_in_production() {
        let production = [("APP_ENV", "production"), ("PAYMENTS_WEBHOOK_INSECURE", "true")];
        assert!(config(&production).is_err());
        assert!(config(&[("PAYMENTS_WEBHOOK_INSECURE", "true")]).unwrap().webhook_insecure);
    }

    #[test]
    fn test_dev_seed_ignored_in_production() {
        let config = config(&[("APP_ENV", "production"), ("DEV_SEED", "1")]).unwrap();
        assert!(!config.dev_seed);
    }

    #[test]
    fn test_invalid_numbers_are_errors() {
        assert!(config(&[("PAYMENTS_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config(&[("WEBHOOK_TOLERANCE_SECS", "-")]).is_err());
    }

    #[test]
    fn test_webhook_tolerance_bounds() {
        assert!(config(&[("WEBHOOK_TOLERANCE_SECS", "-1")]).is_err());
        assert!(config(&[("WEBHOOK_TOLERANCE_SECS", "0")]).is_err());
        assert!(config(&[("WEBHOOK_TOLERANCE_SECS", "9223372036854775807")]).is_err());
        assert!(config(&[("WEBHOOK_TOLERANCE_SECS", "86401")]).is_err());

        let config = config(&[("WEBHOOK_TOLERANCE_SECS", "600")]).unwrap();
        assert_eq!(config.webhook_tolerance_secs, 600);
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let config = config(&[
            ("PAYMENTS_ACCESS_TOKEN", "APP_USR-secret"),
            ("PAYMENTS_WEBHOOK_SECRET", "whsec"),
        ])
        .unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("APP_USR-secret"));
        assert!(!printed.contains("whsec"));
    }
}
