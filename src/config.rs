use crate::error::ConfigError;
use crate::pagination::MAX_PAGE_SIZE;
use crate::rate_limiter::permit_interval;
use alloy_primitives::Address;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

const DEFAULT_PAGE_SIZE: u64 = MAX_PAGE_SIZE;
const DEFAULT_REQUESTS_PER_SECOND: f64 = 24.0;
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./pairs.db";

/// The database location alone, for tools that never touch the chain.
pub fn database_url_from_env() -> String {
    dotenv::dotenv().ok();
    std::env::var("DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// One query per window over the known event signatures.
    Topics,
    /// One query per window and factory, scoped to the factory address.
    Factories,
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "topics" | "topic" => Ok(ScanMode::Topics),
            "factories" | "factory" => Ok(ScanMode::Factories),
            other => Err(format!("expected 'topics' or 'factories', got '{other}'")),
        }
    }
}

/// A factory contract to scan in factory mode.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FactoryEntry {
    #[serde(rename = "internal_deployer")]
    pub address: Address,
    #[serde(default)]
    pub entity_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub json_rpc_url: String,
    pub database_url: String,
    pub start_block: u64,
    /// Exclusive. `None` scans up to the chain head seen at start-up.
    pub end_block: Option<u64>,
    pub page_size: u64,
    pub requests_per_second: f64,
    pub scan_mode: ScanMode,
    pub scan_addresses: Vec<Address>,
    pub factories: Vec<FactoryEntry>,
    pub concurrency: usize,
    pub inclusive_window_end: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::parse(|key| std::env::var(key).ok())?;

        config.merge_factories_file(std::env::var("FACTORIES_FILE").ok())?;

        config.validate()?;
        Ok(config)
    }

    /// Builds a config from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = Self::parse(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Appends the factories listed in `path`. A blank path counts as unset.
    pub fn merge_factories_file(&mut self, path: Option<String>) -> Result<()> {
        let Some(path) = path.filter(|p| !p.trim().is_empty()) else {
            return Ok(());
        };
        self.factories.extend(load_factories(Path::new(path.trim()))?);
        Ok(())
    }

    fn parse<F>(lookup: F) -> std::result::Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let json_rpc_url = get("JSON_RPC_URL").ok_or(ConfigError::Missing("JSON_RPC_URL"))?;

        let database_url = get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let start_block = parse_or("START_BLOCK", get("START_BLOCK"), 0)?;
        let end_block = get("END_BLOCK")
            .map(|v| parse_value("END_BLOCK", &v))
            .transpose()?;
        let page_size = parse_or("PAGE_SIZE", get("PAGE_SIZE"), DEFAULT_PAGE_SIZE)?;
        let requests_per_second = parse_or(
            "REQUESTS_PER_SECOND",
            get("REQUESTS_PER_SECOND"),
            DEFAULT_REQUESTS_PER_SECOND,
        )?;
        let scan_mode = parse_or("SCAN_MODE", get("SCAN_MODE"), ScanMode::Topics)?;
        let scan_addresses = parse_addresses("SCAN_ADDRESSES", get("SCAN_ADDRESSES"))?;
        let factories = parse_addresses("FACTORY_ADDRESSES", get("FACTORY_ADDRESSES"))?
            .into_iter()
            .map(|address| FactoryEntry {
                address,
                entity_id: None,
            })
            .collect();
        let concurrency = parse_or("SCAN_CONCURRENCY", get("SCAN_CONCURRENCY"), 1)?;
        let inclusive_window_end =
            parse_or("WINDOW_INCLUSIVE_END", get("WINDOW_INCLUSIVE_END"), false)?;

        Ok(Config {
            json_rpc_url,
            database_url,
            start_block,
            end_block,
            page_size,
            requests_per_second,
            scan_mode,
            scan_addresses,
            factories,
            concurrency,
            inclusive_window_end,
        })
    }

    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid {
                key: "PAGE_SIZE",
                reason: format!("must be between 1 and {MAX_PAGE_SIZE}"),
            });
        }
        permit_interval(self.requests_per_second)?;
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid {
                key: "SCAN_CONCURRENCY",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.scan_mode == ScanMode::Factories && self.factories.is_empty() {
            return Err(ConfigError::Invalid {
                key: "FACTORY_ADDRESSES",
                reason: "factory mode needs at least one factory".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_value<T>(key: &'static str, value: &str) -> std::result::Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
        key,
        reason: e.to_string(),
    })
}

fn parse_or<T>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> std::result::Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse_value(key, &v),
        None => Ok(default),
    }
}

fn parse_addresses(
    key: &'static str,
    value: Option<String>,
) -> std::result::Result<Vec<Address>, ConfigError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };

    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Address::from_str(s).map_err(|_| ConfigError::Invalid {
                key,
                reason: format!("invalid address '{s}'"),
            })
        })
        .collect()
}

/// Reads a JSON array of `{"internal_deployer": "0x..", "entity_id": ".."}`.
pub fn load_factories(path: &Path) -> Result<Vec<FactoryEntry>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_factories(&data).with_context(|| format!("Invalid factory list in {}", path.display()))
}

pub fn parse_factories(json: &str) -> Result<Vec<FactoryEntry>> {
    Ok(serde_json::from_str(json)?)
}
