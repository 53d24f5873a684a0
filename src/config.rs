//! Startup configuration
//!
//! The database path comes from `--data` or `DB_PATH`; everything else is
//! read from the environment.

use crate::chat::UserId;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_REPORTS_DIR: &str = "src";
const DEFAULT_PYTHON_BIN: &str = "python3";
const DEFAULT_REPORT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Parser)]
#[command(version, about = "Personal income and expense ledger bot")]
pub struct Args {
    /// Path to the SQLite database file
    #[arg(long, env = "DB_PATH")]
    pub data: Option<PathBuf>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub api_token: String,
    pub allowed_user: UserId,
    pub reports_dir: PathBuf,
    pub python_bin: String,
    pub report_timeout: Duration,
}

impl Config {
    /// Build the configuration from parsed arguments and an environment
    /// lookup. Blank values count as unset.
    pub fn resolve(
        args: Args,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let db_path = args
            .data
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ConfigError::Missing("DB_PATH"))?;
        let api_token = var("API_TOKEN").ok_or(ConfigError::Missing("API_TOKEN"))?;

        let allowed_user = var("ALLOWED_USER_ID").ok_or(ConfigError::Missing("ALLOWED_USER_ID"))?;
        let allowed_user = allowed_user
            .trim()
            .parse::<i64>()
            .map(UserId)
            .map_err(|_| ConfigError::Invalid {
                name: "ALLOWED_USER_ID",
                value: allowed_user.clone(),
            })?;

        let report_timeout = match var("REPORT_TIMEOUT_SECS") {
            None => DEFAULT_REPORT_TIMEOUT_SECS,
            Some(value) => value
                .trim()
                .parse::<u64>()
                .ok()
                .filter(|secs| *secs > 0)
                .ok_or(ConfigError::Invalid {
                    name: "REPORT_TIMEOUT_SECS",
                    value,
                })?,
        };

        Ok(Self {
            db_path,
            api_token: api_token.trim().to_string(),
            allowed_user,
            reports_dir: var("REPORTS_DIR")
                .map_or_else(|| PathBuf::from(DEFAULT_REPORTS_DIR), PathBuf::from),
            python_bin: var("PYTHON_BIN").unwrap_or_else(|| DEFAULT_PYTHON_BIN.to_string()),
            report_timeout: Duration::from_secs(report_timeout),
        })
    }
}
