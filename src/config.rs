use anyhow::{Context, Result, anyhow};
use chrono::NaiveTime;
use dotenvy::dotenv;
use std::env;
use std::str::FromStr;

use crate::utils::time_format::parse_time_of_day;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    /// Arrivals strictly after this time of day are recorded as late.
    pub late_threshold: NaiveTime,

    pub log_dir: String,
    pub run_migrations: bool,
    pub agent_cache_warmup_days: u32,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        let late_threshold = match lookup("LATE_THRESHOLD") {
            Some(raw) => parse_time_of_day(&raw)
                .with_context(|| format!("LATE_THRESHOLD must be HH:MM, got {raw:?}"))?,
            None => default_late_threshold(),
        };

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: parse_or(&lookup, "ACCESS_TOKEN_TTL", 900)?, // 15 min

            rate_login_per_min: parse_or(&lookup, "RATE_LOGIN_PER_MIN", 60)?,
            rate_protected_per_min: parse_or(&lookup, "RATE_PROTECTED_PER_MIN", 1000)?,

            api_prefix: lookup("API_PREFIX").unwrap_or_else(|| "/api".to_string()),
            late_threshold,

            log_dir: lookup("LOG_DIR").unwrap_or_else(|| "logs".to_string()),
            run_migrations: parse_or(&lookup, "RUN_MIGRATIONS", true)?,
            agent_cache_warmup_days: parse_or(&lookup, "AGENT_CACHE_WARMUP_DAYS", 30)?,
        })
    }
}

pub fn default_late_threshold() -> NaiveTime {
    NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN)
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("SERVER_ADDR", "127.0.0.1:8080"),
        ("DATABASE_URL", "mysql://root@localhost/rh"),
        ("JWT_SECRET", "secret"),
    ];

    #[test]
    fn defaults_apply_when_optional_keys_are_missing() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.access_token_ttl, 900);
        assert_eq!(config.rate_login_per_min, 60);
        assert_eq!(config.rate_protected_per_min, 1000);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.late_threshold, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert!(config.run_migrations);
        assert_eq!(config.agent_cache_warmup_days, 30);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let err = Config::from_lookup(lookup_from(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn late_threshold_is_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LATE_THRESHOLD", "07:30"));
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();
        assert_eq!(config.late_threshold, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
    }

    #[test]
    fn malformed_numbers_are_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACCESS_TOKEN_TTL", "fifteen"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LATE_THRESHOLD", "8h"));
        assert!(Config::from_lookup(lookup_from(&pairs)).is_err());
    }
}
