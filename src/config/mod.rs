use anyhow::{anyhow, Context};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::engine::time::parse_zone;
use crate::engine::{ExtrapolationPolicy, ReportEngine};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    pub api_server: ServerConfig,
    pub data: DataConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// Directory holding store_status.csv, menu_hours.csv and timezones.csv
    pub dir: PathBuf,
    /// Reload the CSV feeds into the database when the server starts
    pub load_on_startup: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub output_dir: PathBuf,
    /// Zone for stores without an assignment
    pub default_timezone: Tz,
    /// Fail the report on an unparsable store zone instead of using the default
    pub strict_timezones: bool,
    pub extrapolation: ExtrapolationPolicy,
}

impl ReportConfig {
    pub fn engine(&self) -> ReportEngine {
        ReportEngine::new(self.default_timezone)
            .with_strict_zones(self.strict_timezones)
            .with_policy(self.extrapolation)
    }
}

impl DatabaseConfig {
    const fn default_max_connections() -> u32 {
        5
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = var("DATABASE_URL", "sqlite://./storewatch.db");
        let max_connections = match lookup("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse::<u32>()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            None => DatabaseConfig::default_max_connections(),
        };

        let api_host = var("API_HOST", "127.0.0.1");
        let api_port = var("API_PORT", "8000")
            .parse::<u16>()
            .context("API_PORT must be a port number")?;

        let data_dir = PathBuf::from(var("DATA_DIR", "data"));
        let load_on_startup = lookup("LOAD_DATA_ON_STARTUP")
            .map(|v| parse_flag(&v))
            .unwrap_or(true);

        let output_dir = PathBuf::from(var("REPORTS_DIR", "reports"));

        let zone_name = var("DEFAULT_TIMEZONE", "America/Chicago");
        let default_timezone = parse_zone(&zone_name)
            .ok_or_else(|| anyhow!("DEFAULT_TIMEZONE '{zone_name}' is not a known IANA time zone"))?;

        let strict_timezones = lookup("STRICT_TIMEZONES")
            .map(|v| parse_flag(&v))
            .unwrap_or(false);

        let extrapolation = match lookup("EXTRAPOLATION_POLICY") {
            Some(raw) => ExtrapolationPolicy::parse(&raw).ok_or_else(|| {
                anyhow!(
                    "Unknown EXTRAPOLATION_POLICY '{raw}'. Supported values: fixed_weight, time_weighted"
                )
            })?,
            None => ExtrapolationPolicy::default(),
        };

        Ok(Config {
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            api_server: ServerConfig {
                host: api_host,
                port: api_port,
            },
            data: DataConfig {
                dir: data_dir,
                load_on_startup,
            },
            report: ReportConfig {
                output_dir,
                default_timezone,
                strict_timezones,
                extrapolation,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.database.url, "sqlite://./storewatch.db");
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.api_server.port, 8000);
        assert_eq!(config.data.dir, PathBuf::from("data"));
        assert!(config.data.load_on_startup);
        assert_eq!(config.report.output_dir, PathBuf::from("reports"));
        assert_eq!(config.report.default_timezone, chrono_tz::America::Chicago);
        assert!(!config.report.strict_timezones);
        assert_eq!(config.report.extrapolation, ExtrapolationPolicy::FixedWeight);
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("API_PORT", "9100"),
            ("DEFAULT_TIMEZONE", "Europe/Berlin"),
            ("STRICT_TIMEZONES", "yes"),
            ("LOAD_DATA_ON_STARTUP", "false"),
            ("EXTRAPOLATION_POLICY", "time_weighted"),
        ]))
        .unwrap();

        assert_eq!(config.api_server.port, 9100);
        assert_eq!(config.report.default_timezone, chrono_tz::Europe::Berlin);
        assert!(config.report.strict_timezones);
        assert!(!config.data.load_on_startup);
        assert_eq!(config.report.extrapolation, ExtrapolationPolicy::TimeWeighted);
    }

    #[test]
    fn test_invalid_default_timezone_is_fatal() {
        let err = Config::from_lookup(lookup(&[("DEFAULT_TIMEZONE", "Atlantis/Central")]))
            .unwrap_err();
        assert!(err.to_string().contains("Atlantis/Central"));
    }

    #[test]
    fn test_invalid_port() {
        assert!(Config::from_lookup(lookup(&[("API_PORT", "eighty")])).is_err());
    }

    #[test]
    fn test_unknown_policy_is_rejected() {
        assert!(Config::from_lookup(lookup(&[("EXTRAPOLATION_POLICY", "guess")])).is_err());
    }
}
