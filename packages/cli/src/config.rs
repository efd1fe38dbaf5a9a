// ABOUTME: Server configuration loaded from environment variables
// ABOUTME: Validated once at startup into a typed Config

use std::env;
use std::net::IpAddr;
use std::num::ParseIntError;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use hellafresh_core::database_file;
use hellafresh_review::PromotionPolicy;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid port number: {0}")]
    InvalidPort(#[from] ParseIntError),
    #[error("Port {0} is out of valid range (1-65535)")]
    PortOutOfRange(u16),
    #[error("Invalid host address: {0}")]
    InvalidHost(String),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("Invalid review policy: {0}")]
    InvalidPolicy(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub cors_origins: Vec<String>,
    pub api_tokens: Vec<String>,
    pub policy: PromotionPolicy,
    pub similarity_threshold: u32,
    pub request_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup; unset keys take their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("HELLAFRESH_PORT")
            .unwrap_or_else(|| "8000".to_string())
            .parse::<u16>()?;
        if port == 0 {
            return Err(ConfigError::PortOutOfRange(port));
        }

        let host_str = lookup("HELLAFRESH_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let host = host_str
            .parse::<IpAddr>()
            .map_err(|_| ConfigError::InvalidHost(host_str.clone()))?;

        let database_path = lookup("HELLAFRESH_DATABASE_PATH")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(database_file);

        let cors_origins = split_list(
            &lookup("CORS_ORIGINS")
                .unwrap_or_else(|| "http://localhost:5173,http://localhost:3000".to_string()),
        );
        let api_tokens = split_list(&lookup("HELLAFRESH_API_TOKENS").unwrap_or_default());

        let policy = PromotionPolicy {
            min_votes: parse_or(&lookup, "REVIEW_MIN_VOTES", 3)?,
            approve_ratio: parse_or(&lookup, "REVIEW_APPROVE_RATIO", 0.67)?,
            reject_ratio: parse_or(&lookup, "REVIEW_REJECT_RATIO", 0.67)?,
        };
        policy.validate().map_err(ConfigError::InvalidPolicy)?;

        let similarity_threshold = parse_or(&lookup, "SIMILARITY_THRESHOLD", 1)?;

        let timeout_ms: u64 = parse_or(&lookup, "REQUEST_TIMEOUT_MS", 5000)?;
        if timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "REQUEST_TIMEOUT_MS",
                value: "0".to_string(),
            });
        }

        Ok(Config {
            host,
            port,
            database_path,
            cors_origins,
            api_tokens,
            policy,
            similarity_threshold,
            request_timeout: Duration::from_millis(timeout_ms),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => {
            let trimmed = raw.trim();
            trimmed.parse::<T>().map_err(|_| ConfigError::InvalidValue {
                key,
                value: trimmed.to_string(),
            })
        }
        _ => Ok(default),
    }
}
