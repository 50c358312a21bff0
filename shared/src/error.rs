//! Error types for the account update function.

use serde_json::{json, Value};
use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while updating an account.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Current password could not be verified
    #[error("Authorization error: {0}")]
    Unauthorized(String),

    /// Upstream service answered with a non-success status
    #[error("Remote call failed with status {status}")]
    Remote { status: u16, body: Value },

    /// Auth record update failed, possibly after some attributes were written
    #[error("Account update failed: {source}")]
    AccountUpdate {
        #[source]
        source: Box<Error>,
        account: Option<Value>,
    },

    /// Profile update failed after the auth record was (possibly) updated
    #[error("Profile update failed: {source}")]
    ProfileUpdate {
        #[source]
        source: Box<Error>,
        account: Option<Value>,
    },

    /// Transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::Validation(_) => 400,
            Error::Unauthorized(_) => 401,
            Error::Remote { .. } | Error::AccountUpdate { .. } | Error::ProfileUpdate { .. } => 502,
            _ => 500,
        }
    }

    /// Human-readable message for the caller.
    pub fn public_message(&self) -> String {
        match self {
            Error::Config(_) => self.to_string(),
            Error::Validation(msg) | Error::Unauthorized(msg) => msg.clone(),
            Error::Remote { .. } => "Remote call failed".to_string(),
            Error::AccountUpdate { .. } => "Failed to update account".to_string(),
            Error::ProfileUpdate { .. } => "Failed to update profile".to_string(),
            _ => "Unexpected error".to_string(),
        }
    }

    /// Upstream context worth echoing back to the caller, if any.
    pub fn detail(&self) -> Option<Value> {
        match self {
            Error::Remote { status, body } => Some(json!({ "status": status, "body": body })),
            Error::AccountUpdate { source, .. } | Error::ProfileUpdate { source, .. } => {
                source.detail().or_else(|| Some(Value::String(source.to_string())))
            }
            Error::Unauthorized(_) | Error::Validation(_) | Error::Config(_) => None,
            other => Some(Value::String(other.to_string())),
        }
    }

    /// Account record already written before the failure happened.
    pub fn partial_account(&self) -> Option<&Value> {
        match self {
            Error::AccountUpdate { account, .. } | Error::ProfileUpdate { account, .. } => {
                account.as_ref()
            }
            _ => None,
        }
    }
}
