//! Application configuration module
//!
//! Handles loading and validating configuration from environment variables.

use crate::jobs::DEFAULT_RETAINED_JOBS;
use crate::sync::enumerate::HistoryPaging;
use crate::sync::SyncOptions;
use serde::Deserialize;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: Ipv4Addr,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::new(0, 0, 0, 0),
            port: 3000,
        }
    }
}

/// CORS configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:3001".to_string()],
        }
    }
}

/// Chain source configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChainConfig {
    /// JSON fixture served by the in-memory chain; empty chain when unset
    pub fixture_path: Option<PathBuf>,
}

/// Storage pool configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub pool: String,
    /// Host used in object URLs
    pub host: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./storage"),
            pool: "governance".to_string(),
            host: "shdw-drive.genesysgo.net".to_string(),
        }
    }
}

/// Sync pipeline tunables
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub concurrency: usize,
    pub tx_page_size: usize,
    pub tx_max_pages: usize,
    pub tx_page_retries: u32,
    /// Finished jobs kept in the registry
    pub job_retention: usize,
    /// Mint -> decimals, built-in stablecoins and wrapped SOL plus `KNOWN_TOKENS`
    pub known_tokens: HashMap<String, u8>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            concurrency: 8,
            tx_page_size: 50,
            tx_max_pages: 200,
            tx_page_retries: 0,
            job_retention: DEFAULT_RETAINED_JOBS,
            known_tokens: default_known_tokens(),
        }
    }
}

fn default_known_tokens() -> HashMap<String, u8> {
    [
        ("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v", 6),
        ("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB", 6),
        ("So11111111111111111111111111111111111111112", 9),
    ]
    .into_iter()
    .map(|(mint, decimals)| (mint.to_string(), decimals))
    .collect()
}

/// Complete application settings
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub server: ServerConfig,
    pub cors: CorsConfig,
    pub chain: ChainConfig,
    pub storage: StorageConfig,
    pub sync: SyncConfig,
}

impl Settings {
    /// Load settings from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if it exists (ignore errors if file not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup
    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Settings::default();

        let server = ServerConfig {
            host: parse_or(&get, "HOST", defaults.server.host)?,
            port: parse_or(&get, "PORT", defaults.server.port)?,
        };

        let cors = CorsConfig {
            allowed_origins: get("ALLOWED_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors.allowed_origins),
        };

        let chain = ChainConfig {
            fixture_path: get("CHAIN_FIXTURE_PATH")
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };

        let storage = StorageConfig {
            root: get("STORAGE_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.storage.root),
            pool: get("STORAGE_POOL").unwrap_or(defaults.storage.pool),
            host: match get("STORAGE_HOST") {
                Some(host) => validate_host(&host)?,
                None => defaults.storage.host,
            },
        };

        let mut known_tokens = defaults.sync.known_tokens;
        if let Some(raw) = get("KNOWN_TOKENS") {
            known_tokens.extend(parse_known_tokens(&raw)?);
        }

        let sync = SyncConfig {
            concurrency: parse_or(&get, "SYNC_CONCURRENCY", defaults.sync.concurrency)?,
            tx_page_size: parse_or(&get, "TX_PAGE_SIZE", defaults.sync.tx_page_size)?,
            tx_max_pages: parse_or(&get, "TX_MAX_PAGES", defaults.sync.tx_max_pages)?,
            tx_page_retries: parse_or(&get, "TX_PAGE_RETRIES", defaults.sync.tx_page_retries)?,
            job_retention: parse_or(&get, "JOB_RETENTION", defaults.sync.job_retention)?,
            known_tokens,
        };

        if sync.concurrency == 0 || sync.tx_page_size == 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_CONCURRENCY and TX_PAGE_SIZE must be positive".to_string(),
            ));
        }

        Ok(Self {
            server,
            cors,
            chain,
            storage,
            sync,
        })
    }

    /// Options handed to every sync job
    pub fn sync_options(&self) -> SyncOptions {
        SyncOptions {
            pool: self.storage.pool.clone(),
            concurrency: self.sync.concurrency,
            paging: HistoryPaging {
                page_size: self.sync.tx_page_size,
                max_pages: self.sync.tx_max_pages,
                retries: self.sync.tx_page_retries,
                retry_delay: Duration::from_millis(250),
            },
            known_tokens: self.sync.known_tokens.clone(),
            prune: true,
        }
    }
}

fn parse_or<F, T>(get: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::ParseError(format!("{}={}", key, raw))),
        None => Ok(default),
    }
}

/// Accepts a bare host (`storage.example.com`) or a URL and keeps the host
fn validate_host(raw: &str) -> Result<String, ConfigError> {
    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    url::Url::parse(&candidate)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .ok_or_else(|| ConfigError::InvalidValue(format!("STORAGE_HOST={}", raw)))
}

/// Parse `mint:decimals,mint:decimals`
fn parse_known_tokens(raw: &str) -> Result<HashMap<String, u8>, ConfigError> {
    raw.split(',')
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .map(|pair| -> Result<(String, u8), ConfigError> {
            let (mint, decimals) = pair
                .split_once(':')
                .ok_or_else(|| ConfigError::ParseError(format!("KNOWN_TOKENS entry {}", pair)))?;
            let decimals = decimals
                .trim()
                .parse()
                .map_err(|_| ConfigError::ParseError(format!("KNOWN_TOKENS entry {}", pair)))?;
            Ok((mint.trim().to_string(), decimals))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_server_config() {
        let config = ServerConfig::default();
        assert_eq!(config.host, Ipv4Addr::new(0, 0, 0, 0));
        assert_eq!(config.port, 3000);
    }

    #[test]
    fn test_defaults_when_nothing_is_set() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.storage.pool, "governance");
        assert_eq!(settings.sync.tx_page_size, 50);
        assert_eq!(settings.sync.tx_page_retries, 0);
        assert_eq!(settings.sync.job_retention, 100);
        assert!(settings.chain.fixture_path.is_none());
        assert_eq!(
            settings.sync.known_tokens.get("So11111111111111111111111111111111111111112"),
            Some(&9)
        );
    }

    #[test]
    fn test_overrides_and_known_tokens() {
        let settings = Settings::from_lookup(lookup(&[
            ("PORT", "8080"),
            ("STORAGE_HOST", "https://cdn.example.com/ignored"),
            ("KNOWN_TOKENS", "MintA:4, MintB:0"),
            ("TX_PAGE_RETRIES", "3"),
            ("JOB_RETENTION", "5"),
        ]))
        .unwrap();

        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.storage.host, "cdn.example.com");
        assert_eq!(settings.sync.known_tokens.get("MintA"), Some(&4));
        assert_eq!(settings.sync.known_tokens.get("MintB"), Some(&0));
        assert_eq!(settings.sync.job_retention, 5);

        let options = settings.sync_options();
        assert_eq!(options.paging.retries, 3);
        assert_eq!(options.pool, "governance");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("KNOWN_TOKENS", "MintA")])),
            Err(ConfigError::ParseError(_))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("SYNC_CONCURRENCY", "0")])),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("STORAGE_HOST", "https://")])),
            Err(ConfigError::InvalidValue(_))
        ));
    }
}
