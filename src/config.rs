use std::time::Duration;

use anyhow::Context;
use chrono_tz::Tz;
use tracing::warn;

/// What to do with a new log entry when the nutrition lookup fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupFailurePolicy {
    /// Persist the entry without a nutrient profile.
    Store,
    /// Refuse the request and write nothing.
    Reject,
}

impl std::str::FromStr for LookupFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "store" => Ok(Self::Store),
            "reject" => Ok(Self::Reject),
            other => anyhow::bail!("unknown lookup failure policy: {other}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FdcConfig {
    pub api_key: String,
    pub base_url: String,
    /// Per HTTP attempt.
    pub timeout: Duration,
    pub max_retries: u32,
    /// Whole lookup: both requests and every retry.
    pub total_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub fdc: FdcConfig,
    pub ollama: OllamaConfig,
    pub health_timeout: Duration,
    pub request_timeout: Duration,
    pub default_timezone: Tz,
    pub lookup_failure_policy: LookupFailurePolicy,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so parsing can be tested
    /// without touching the process environment.
    pub fn from_lookup<F>(get: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = get("DATABASE_URL").context("DATABASE_URL must be set")?;
        let model = get("OLLAMA_MODEL")
            .filter(|m| !m.trim().is_empty())
            .context("OLLAMA_MODEL must be set to an Ollama model name (e.g. 'mistral:latest')")?;

        let default_timezone = {
            let name = get("DEFAULT_TIMEZONE").unwrap_or_else(|| "UTC".into());
            name.parse::<Tz>()
                .map_err(|_| anyhow::anyhow!("DEFAULT_TIMEZONE is not a known IANA zone: {name}"))?
        };

        let lookup_failure_policy = match get("LOOKUP_FAILURE_POLICY") {
            Some(v) => v.parse()?,
            None => LookupFailurePolicy::Store,
        };

        Ok(Self {
            database_url,
            database_max_connections: parse_or(&get, "DATABASE_MAX_CONNECTIONS", 10),
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port: parse_or(&get, "APP_PORT", 8080),
            fdc: FdcConfig {
                api_key: get("FDC_API_KEY").unwrap_or_else(|| "DEMO_KEY".into()),
                base_url: get("FDC_BASE_URL")
                    .unwrap_or_else(|| "https://api.nal.usda.gov/fdc/v1".into())
                    .trim_end_matches('/')
                    .to_string(),
                timeout: Duration::from_secs(parse_or(&get, "FDC_TIMEOUT_SECS", 5)),
                max_retries: parse_or(&get, "FDC_MAX_RETRIES", 2),
                total_timeout: Duration::from_secs(parse_or(&get, "FDC_TOTAL_TIMEOUT_SECS", 10)),
            },
            ollama: OllamaConfig {
                base_url: get("OLLAMA_URL")
                    .unwrap_or_else(|| "http://localhost:11434".into())
                    .trim_end_matches('/')
                    .to_string(),
                model,
                timeout: Duration::from_secs(parse_or(&get, "FEEDBACK_TIMEOUT_SECS", 8)),
            },
            health_timeout: Duration::from_millis(parse_or(&get, "HEALTH_TIMEOUT_MS", 2000)),
            request_timeout: Duration::from_secs(parse_or(&get, "REQUEST_TIMEOUT_SECS", 30)),
            default_timezone,
            lookup_failure_policy,
        })
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let Some(raw) = get(key) else {
        return default;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => v,
        Err(_) => {
            warn!(key, value = %raw, "unparseable setting; using default");
            default
        }
    }
}
