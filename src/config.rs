//! Configuration handling for the database admin client.
//!
//! This module provides configuration management via CLI arguments and environment variables.

use crate::api::DEFAULT_API_URL;
use crate::cache::{CacheSettings, DEFAULT_RETRY};
use crate::cli::Command;
use crate::format::OutputFormat;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_STALE_TIME_SECS: u64 = 5 * 60;
pub const DEFAULT_GC_TIME_SECS: u64 = 30 * 60;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;
pub const MAX_RETRY: u32 = 10;

/// File name of the token document under the home directory.
pub const DEFAULT_TOKEN_FILE: &str = ".dbadmin/session.json";

/// Cache timing options.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheOptions {
    /// Freshness window in seconds (default: 300)
    pub stale_time_secs: Option<u64>,
    /// Time an unread entry is kept, in seconds (default: 1800)
    pub gc_time_secs: Option<u64>,
    /// Retries for reads failing with a transport error (default: 1)
    pub retry: Option<u32>,
    /// Delay between retries in milliseconds (default: 1000)
    pub retry_delay_ms: Option<u64>,
}

impl CacheOptions {
    /// Get stale_time with default value.
    pub fn stale_time_or_default(&self) -> u64 {
        self.stale_time_secs.unwrap_or(DEFAULT_STALE_TIME_SECS)
    }

    /// Get gc_time with default value.
    pub fn gc_time_or_default(&self) -> u64 {
        self.gc_time_secs.unwrap_or(DEFAULT_GC_TIME_SECS)
    }

    /// Get retry with default value.
    pub fn retry_or_default(&self) -> u32 {
        self.retry.unwrap_or(DEFAULT_RETRY)
    }

    /// Get retry_delay with default value.
    pub fn retry_delay_or_default(&self) -> u64 {
        self.retry_delay_ms.unwrap_or(DEFAULT_RETRY_DELAY_MS)
    }

    /// Validate cache options and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if let Some(gc) = self.gc_time_secs {
            if gc == 0 {
                return Err("gc_time must be greater than 0".to_string());
            }
            let stale = self.stale_time_or_default();
            if gc < stale {
                return Err(format!(
                    "gc_time ({}) cannot be shorter than stale_time ({})",
                    gc, stale
                ));
            }
        }
        if let Some(retry) = self.retry {
            if retry > MAX_RETRY {
                return Err(format!("retry cannot exceed {}", MAX_RETRY));
            }
        }
        Ok(())
    }

    /// Settings for a [`QueryCache`](crate::cache::QueryCache).
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            stale_time: Duration::from_secs(self.stale_time_or_default()),
            gc_time: Duration::from_secs(self.gc_time_or_default()),
            retry: self.retry_or_default(),
            retry_delay: Duration::from_millis(self.retry_delay_or_default()),
        }
    }
}

/// Configuration for the database admin client.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "dbadmin",
    about = "Command-line client for a REST database administration backend",
    version,
    author
)]
pub struct Config {
    /// Base URL of the backend API
    #[arg(long, default_value = DEFAULT_API_URL, env = "DBADMIN_API_URL", global = true)]
    pub api_url: String,

    /// File the session token is persisted in (default: ~/.dbadmin/session.json)
    #[arg(long, value_name = "PATH", env = "DBADMIN_TOKEN_FILE", global = true)]
    pub token_file: Option<PathBuf>,

    /// Seconds a cached read stays fresh
    #[arg(long, value_name = "SECS", env = "DBADMIN_STALE_TIME", global = true)]
    pub stale_time: Option<u64>,

    /// Seconds an unread cache entry is kept
    #[arg(long, value_name = "SECS", env = "DBADMIN_GC_TIME", global = true)]
    pub gc_time: Option<u64>,

    /// Retries for reads failing with a network error
    #[arg(long, value_name = "N", env = "DBADMIN_RETRY", global = true)]
    pub retry: Option<u32>,

    /// Request timeout in seconds (unset: no timeout)
    #[arg(long, value_name = "SECS", env = "DBADMIN_REQUEST_TIMEOUT", global = true)]
    pub request_timeout: Option<u64>,

    /// Output format for tabular results
    #[arg(
        short,
        long,
        value_enum,
        default_value = "table",
        env = "DBADMIN_FORMAT",
        global = true
    )]
    pub format: OutputFormat,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "DBADMIN_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Enable JSON logging format
    #[arg(long, env = "DBADMIN_JSON_LOGS", global = true)]
    pub json_logs: bool,

    /// Enable logging output (disabled by default to keep command output clean)
    #[arg(long, env = "DBADMIN_ENABLE_LOGS", global = true)]
    pub enable_logs: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

impl Config {
    /// Parse configuration from command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Create a default configuration (useful for testing).
    pub fn default_config() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token_file: None,
            stale_time: None,
            gc_time: None,
            retry: None,
            request_timeout: None,
            format: OutputFormat::Table,
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
            command: None,
        }
    }

    /// Cache options from the command line.
    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            stale_time_secs: self.stale_time,
            gc_time_secs: self.gc_time,
            retry: self.retry,
            retry_delay_ms: None,
        }
    }

    /// Token file, falling back to one under the home directory.
    pub fn token_file_or_default(&self) -> PathBuf {
        self.token_file.clone().unwrap_or_else(|| {
            std::env::var_os("HOME")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("."))
                .join(DEFAULT_TOKEN_FILE)
        })
    }

    /// Get the request timeout as a Duration.
    pub fn request_timeout_duration(&self) -> Option<Duration> {
        self.request_timeout.map(Duration::from_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(config.request_timeout_duration().is_none());
        assert!(config.command.is_none());
        assert!(!config.enable_logs);
    }

    #[test]
    fn test_cache_option_defaults() {
        let options = CacheOptions::default();
        assert_eq!(options.stale_time_or_default(), 300);
        assert_eq!(options.gc_time_or_default(), 1800);
        assert_eq!(options.retry_or_default(), 1);
        assert!(options.validate().is_ok());

        let settings = options.settings();
        assert_eq!(settings.stale_time, Duration::from_secs(300));
        assert_eq!(settings.gc_time, Duration::from_secs(1800));
        assert_eq!(settings, CacheSettings::default());
    }

    #[test]
    fn test_cache_options_validation() {
        let zero_gc = CacheOptions {
            gc_time_secs: Some(0),
            ..Default::default()
        };
        assert!(zero_gc.validate().is_err());

        let short_gc = CacheOptions {
            stale_time_secs: Some(600),
            gc_time_secs: Some(60),
            ..Default::default()
        };
        assert!(short_gc.validate().unwrap_err().contains("cannot be shorter"));

        let too_many_retries = CacheOptions {
            retry: Some(MAX_RETRY + 1),
            ..Default::default()
        };
        assert!(too_many_retries.validate().is_err());
    }

    #[test]
    fn test_config_cache_options() {
        let config = Config {
            stale_time: Some(10),
            retry: Some(0),
            ..Config::default()
        };
        let options = config.cache_options();
        assert_eq!(options.stale_time_or_default(), 10);
        assert_eq!(options.retry_or_default(), 0);
        assert_eq!(options.gc_time_or_default(), DEFAULT_GC_TIME_SECS);
    }

    #[test]
    fn test_token_file_override() {
        let config = Config {
            token_file: Some(PathBuf::from("/tmp/t.json")),
            ..Config::default()
        };
        assert_eq!(config.token_file_or_default(), PathBuf::from("/tmp/t.json"));
        assert!(
            Config::default()
                .token_file_or_default()
                .ends_with(DEFAULT_TOKEN_FILE)
        );
    }

    #[test]
    fn test_parse_subcommand_and_globals() {
        let config = Config::try_parse_from([
            "dbadmin",
            "rows",
            "users",
            "--page",
            "2",
            "--format",
            "json",
            "--stale-time",
            "5",
        ])
        .unwrap();
        assert_eq!(config.stale_time, Some(5));
        assert_eq!(config.format, OutputFormat::Json);
        assert!(matches!(config.command, Some(Command::Rows { .. })));
    }
}
