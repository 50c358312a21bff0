//! Configuration management for the account update function.

use std::env;
use std::time::Duration;

use crate::{Error, Result};

/// Default environment variable carrying the invocation payload in script runtimes.
pub const DEFAULT_PAYLOAD_VAR: &str = "APPWRITE_FUNCTION_DATA";

/// Default wait for stdin before giving up on it.
pub const DEFAULT_STDIN_TIMEOUT_MS: u64 = 250;

/// Application configuration loaded once from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// API base URL, e.g. `https://cloud.appwrite.io/v1`
    pub endpoint: String,
    /// Project id sent with every request
    pub project_id: String,
    /// Administrative API key
    pub api_key: String,
    /// Database holding the profile collection
    pub database_id: String,
    /// Profile collection id
    pub collection_id: String,
    /// Environment variable the payload may be read from
    pub payload_var: String,
    /// How long to wait for stdin
    pub stdin_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{} is not set", name)))
        };

        let stdin_timeout_ms = match lookup("STDIN_TIMEOUT_MS") {
            Some(raw) => raw.trim().parse::<u64>().map_err(|e| {
                Error::Config(format!("STDIN_TIMEOUT_MS is not a number: {}", e))
            })?,
            None => DEFAULT_STDIN_TIMEOUT_MS,
        };

        Ok(Self {
            endpoint: required("APPWRITE_ENDPOINT")?
                .trim_end_matches('/')
                .to_string(),
            project_id: required("APPWRITE_PROJECT_ID")?,
            api_key: required("APPWRITE_API_KEY")?,
            database_id: required("APPWRITE_DATABASE_ID")?,
            collection_id: required("APPWRITE_PROFILES_COLLECTION_ID")?,
            payload_var: lookup("PAYLOAD_ENV_VAR")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_PAYLOAD_VAR.to_string()),
            stdin_timeout: Duration::from_millis(stdin_timeout_ms),
        })
    }
}
