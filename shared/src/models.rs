//! Shared data models.

use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use validator::Validate;

use crate::identifier::{login_identifier, phone_digits};
use crate::{Error, Result};

/// Account update request payload.
#[derive(Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    #[serde(default, alias = "profile_id", deserialize_with = "lenient_string")]
    #[validate(required(message = "profileId is required"))]
    pub profile_id: Option<String>,

    #[serde(default, alias = "account_id", deserialize_with = "lenient_string")]
    #[validate(required(message = "accountId is required"))]
    pub account_id: Option<String>,

    #[serde(default, alias = "current_password", deserialize_with = "lenient_string")]
    pub current_password: Option<String>,

    #[serde(default, alias = "new_phone", deserialize_with = "lenient_string")]
    pub new_phone: Option<String>,

    #[serde(default, alias = "new_email", deserialize_with = "lenient_string")]
    pub new_email: Option<String>,

    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,

    #[serde(default, alias = "new_password", deserialize_with = "lenient_string")]
    pub new_password: Option<String>,

    #[serde(default, alias = "verify_current_password", deserialize_with = "lenient_bool")]
    pub verify_current_password: Option<bool>,
}

impl UpdateRequest {
    /// Build a request from a resolved payload object.
    pub fn from_payload(payload: Map<String, Value>) -> Result<Self> {
        serde_json::from_value(Value::Object(payload))
            .map_err(|e| Error::Validation(format!("Invalid request: {}", e)))
    }

    /// Check that both ids are present, returning them.
    pub fn required_ids(&self) -> Result<(&str, &str)> {
        if let Err(errors) = self.validate() {
            let mut messages: Vec<String> = errors
                .field_errors()
                .values()
                .flat_map(|errs| errs.iter())
                .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                .collect();
            messages.sort();
            return Err(Error::Validation(messages.join(", ")));
        }

        match (self.profile_id.as_deref(), self.account_id.as_deref()) {
            (Some(profile_id), Some(account_id)) => Ok((profile_id, account_id)),
            _ => Err(Error::Validation("profileId and accountId are required".to_string())),
        }
    }

    /// Whether the current password must be checked before mutating anything.
    ///
    /// An explicit flag wins; without one, supplying a current password opts in.
    pub fn verification_password(&self) -> Result<Option<&str>> {
        let requested = self
            .verify_current_password
            .unwrap_or(self.current_password.is_some());

        match (requested, self.current_password.as_deref()) {
            (false, _) => Ok(None),
            (true, Some(password)) => Ok(Some(password)),
            (true, None) => Err(Error::Validation(
                "currentPassword is required to verify the account".to_string(),
            )),
        }
    }

    /// Login identifier derived from the requested phone/email, if any.
    pub fn login_identifier(&self) -> Option<String> {
        login_identifier(self.new_phone.as_deref(), self.new_email.as_deref())
    }

    /// Sparse auth record update.
    pub fn account_patch(&self) -> AccountPatch {
        AccountPatch {
            email: self.login_identifier(),
            name: self.name.clone(),
            password: self.new_password.clone(),
        }
    }

    /// Sparse profile document update.
    ///
    /// Phone and email are stored as entered (digits only, trimmed), independent
    /// of which one became the login identifier.
    pub fn profile_patch(&self) -> ProfilePatch {
        ProfilePatch {
            phone: self
                .new_phone
                .as_deref()
                .map(phone_digits)
                .filter(|d| !d.is_empty()),
            email: self
                .new_email
                .as_deref()
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
            name: self.name.clone(),
        }
    }
}

impl fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("profile_id", &self.profile_id)
            .field("account_id", &self.account_id)
            .field("current_password", &self.current_password.as_ref().map(|_| "***"))
            .field("new_phone", &self.new_phone)
            .field("new_email", &self.new_email)
            .field("name", &self.name)
            .field("new_password", &self.new_password.as_ref().map(|_| "***"))
            .field("verify_current_password", &self.verify_current_password)
            .finish()
    }
}

/// Fields to change on the auth record.
#[derive(Clone, Default, PartialEq, Serialize)]
pub struct AccountPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl AccountPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.name.is_none() && self.password.is_none()
    }
}

impl fmt::Debug for AccountPatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountPatch")
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Fields to change on the profile document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.phone.is_none() && self.email.is_none() && self.name.is_none()
    }
}

/// Outcome of one invocation, emitted exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateResult {
    pub ok: bool,
    pub account: Option<Value>,
    pub profile: Option<Value>,
    pub message: Option<String>,
    pub detail: Option<Value>,
}

impl UpdateResult {
    pub fn success(account: Option<Value>, profile: Option<Value>) -> Self {
        Self {
            ok: true,
            account,
            profile,
            message: None,
            detail: None,
        }
    }

    pub fn failure(message: impl Into<String>, detail: Option<Value>) -> Self {
        Self {
            ok: false,
            account: None,
            profile: None,
            message: Some(message.into()),
            detail,
        }
    }

    /// Convert any error into the failure shape.
    pub fn from_error(err: &Error) -> Self {
        Self {
            account: err.partial_account().cloned(),
            ..Self::failure(err.public_message(), err.detail())
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            serde_json::json!({ "ok": false, "message": format!("Failed to encode result: {}", e) })
        })
    }
}

impl From<Result<UpdateResult>> for UpdateResult {
    fn from(result: Result<UpdateResult>) -> Self {
        result.unwrap_or_else(|e| UpdateResult::from_error(&e))
    }
}

impl Serialize for UpdateResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("ok", &self.ok)?;
        if self.ok {
            // Both keys are part of the success contract, even when null.
            map.serialize_entry("account", &self.account)?;
            map.serialize_entry("profile", &self.profile)?;
        } else {
            if let Some(account) = &self.account {
                map.serialize_entry("account", account)?;
            }
            if let Some(profile) = &self.profile {
                map.serialize_entry("profile", profile)?;
            }
        }
        if let Some(message) = &self.message {
            map.serialize_entry("message", message)?;
        }
        if let Some(detail) = &self.detail {
            map.serialize_entry("detail", detail)?;
        }
        map.end()
    }
}

fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<bool>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    })
}
