//! Account update orchestration.
//!
//! Sequence: validate ids, optionally verify the current password, update the
//! auth record, update the profile document. The first failure short-circuits.
//! A profile failure after a successful auth update is not rolled back; the
//! updated account travels with the error instead.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::identifier::phone_login;
use crate::models::{AccountPatch, ProfilePatch, UpdateRequest, UpdateResult};
use crate::{Error, Result};

/// Identity and document operations the orchestrator depends on.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Fetch the profile document.
    async fn get_profile(&self, profile_id: &str) -> Result<Value>;

    /// Start a session with a login and password; success proves the password.
    async fn create_session(&self, login: &str, password: &str) -> Result<Value>;

    /// Remove a session created for verification.
    async fn delete_session(&self, account_id: &str, session_id: &str) -> Result<()>;

    /// Apply a sparse update to the auth record, returning the updated record.
    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<Value>;

    /// Apply a sparse update to the profile document, returning the updated document.
    async fn update_profile(&self, profile_id: &str, patch: &ProfilePatch) -> Result<Value>;
}

/// Runs one account update against a backend.
pub struct AccountUpdater<'a, B: ?Sized> {
    backend: &'a B,
}

impl<'a, B: Backend + ?Sized> AccountUpdater<'a, B> {
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Handle a resolved payload, always producing a result.
    pub async fn handle_payload(&self, payload: Map<String, Value>) -> UpdateResult {
        UpdateResult::from(self.execute_payload(payload).await)
    }

    /// Parse a resolved payload and run the update sequence.
    pub async fn execute_payload(&self, payload: Map<String, Value>) -> Result<UpdateResult> {
        let request = UpdateRequest::from_payload(payload)?;
        self.execute(&request).await
    }

    /// Run the update sequence.
    pub async fn execute(&self, request: &UpdateRequest) -> Result<UpdateResult> {
        let (profile_id, account_id) = request.required_ids()?;
        let current_password = request.verification_password()?;

        info!(profile_id, account_id, "Updating account");

        if let Some(password) = current_password {
            self.verify_password(profile_id, account_id, password).await?;
        }

        let account_patch = request.account_patch();
        let account = if account_patch.is_empty() {
            None
        } else {
            let account = self
                .backend
                .update_account(account_id, &account_patch)
                .await
                .map_err(|e| {
                    error!("Failed to update account {}: {}", account_id, e);
                    match e {
                        partial @ Error::AccountUpdate { .. } => partial,
                        other => Error::AccountUpdate {
                            source: Box::new(other),
                            account: None,
                        },
                    }
                })?;
            info!(account_id, "Account updated");
            Some(account)
        };

        let profile_patch = request.profile_patch();
        let profile = if profile_patch.is_empty() {
            None
        } else {
            let profile = self
                .backend
                .update_profile(profile_id, &profile_patch)
                .await
                .map_err(|e| {
                    error!("Failed to update profile {}: {}", profile_id, e);
                    Error::ProfileUpdate {
                        source: Box::new(e),
                        account: account.clone(),
                    }
                })?;
            info!(profile_id, "Profile updated");
            Some(profile)
        };

        Ok(UpdateResult::success(account, profile))
    }

    async fn verify_password(&self, profile_id: &str, account_id: &str, password: &str) -> Result<()> {
        let profile = self.backend.get_profile(profile_id).await?;
        let login = stored_login(&profile).ok_or_else(|| {
            Error::Unauthorized("Profile has no email or phone to verify against".to_string())
        })?;

        let session = self
            .backend
            .create_session(&login, password)
            .await
            .map_err(|e| {
                warn!(account_id, "Password verification failed: {}", e);
                Error::Unauthorized("Current password is incorrect".to_string())
            })?;

        let session_user = session.get("userId").and_then(Value::as_str);

        if let Some(session_id) = session.get("$id").and_then(Value::as_str) {
            let owner = session_user.unwrap_or(account_id);
            if let Err(e) = self.backend.delete_session(owner, session_id).await {
                warn!("Failed to remove verification session {}: {}", session_id, e);
            }
        }

        match session_user {
            Some(user) if user != account_id => Err(Error::Unauthorized(
                "Current password does not belong to this account".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Login identifier recorded on a profile document: email, else phone.
fn stored_login(profile: &Value) -> Option<String> {
    let field = |name: &str| {
        profile
            .get(name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    field("email")
        .map(str::to_string)
        .or_else(|| field("phone").and_then(phone_login))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        GetProfile(String),
        CreateSession(String, String),
        DeleteSession(String, String),
        UpdateAccount(String, AccountPatch),
        UpdateProfile(String, ProfilePatch),
    }

    struct FakeBackend {
        calls: Mutex<Vec<Call>>,
        stored_profile: Value,
        valid_password: &'static str,
        session_user: &'static str,
        fail_account: bool,
        fail_profile: bool,
    }

    impl Default for FakeBackend {
        fn default() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                stored_profile: json!({ "$id": "p1", "email": "old@y.com", "phone": "5550100" }),
                valid_password: "old-secret",
                session_user: "a1",
                fail_account: false,
                fail_profile: false,
            }
        }
    }

    impl FakeBackend {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn get_profile(&self, profile_id: &str) -> Result<Value> {
            self.record(Call::GetProfile(profile_id.to_string()));
            Ok(self.stored_profile.clone())
        }

        async fn create_session(&self, login: &str, password: &str) -> Result<Value> {
            self.record(Call::CreateSession(login.to_string(), password.to_string()));
            if password == self.valid_password {
                Ok(json!({ "$id": "s1", "userId": self.session_user }))
            } else {
                Err(Error::Remote {
                    status: 401,
                    body: json!({ "message": "Invalid credentials" }),
                })
            }
        }

        async fn delete_session(&self, account_id: &str, session_id: &str) -> Result<()> {
            self.record(Call::DeleteSession(account_id.to_string(), session_id.to_string()));
            Ok(())
        }

        async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<Value> {
            self.record(Call::UpdateAccount(account_id.to_string(), patch.clone()));
            if self.fail_account {
                return Err(Error::Remote {
                    status: 409,
                    body: json!({ "message": "user_already_exists" }),
                });
            }
            Ok(json!({ "$id": account_id, "email": patch.email, "name": patch.name }))
        }

        async fn update_profile(&self, profile_id: &str, patch: &ProfilePatch) -> Result<Value> {
            self.record(Call::UpdateProfile(profile_id.to_string(), patch.clone()));
            if self.fail_profile {
                return Err(Error::Remote {
                    status: 500,
                    body: json!({ "message": "document write failed" }),
                });
            }
            Ok(json!({ "$id": profile_id, "data": patch }))
        }
    }

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    async fn run(backend: &FakeBackend, input: Value) -> UpdateResult {
        AccountUpdater::new(backend).handle_payload(payload(input)).await
    }

    #[tokio::test]
    async fn test_missing_ids_make_no_calls() {
        for input in [
            json!({ "accountId": "a1", "newEmail": "x@y.com" }),
            json!({ "profileId": "p1", "name": "Ada" }),
            json!({}),
        ] {
            let backend = FakeBackend::default();
            let result = run(&backend, input).await;

            assert!(!result.ok);
            assert!(result.message.unwrap().contains("is required"));
            assert!(backend.calls().is_empty());
        }
    }

    #[tokio::test]
    async fn test_no_mutable_fields_is_a_no_op() {
        let backend = FakeBackend::default();
        let result = run(&backend, json!({ "profileId": "p1", "accountId": "a1" })).await;

        assert_eq!(
            result.to_value(),
            json!({ "ok": true, "account": null, "profile": null })
        );
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_email_change_updates_both_records() {
        let backend = FakeBackend::default();
        let result = run(
            &backend,
            json!({ "profileId": "p1", "accountId": "a1", "newEmail": "x@y.com" }),
        )
        .await;

        assert!(result.ok);
        assert_eq!(result.account.unwrap()["email"], "x@y.com");
        assert_eq!(result.profile.unwrap()["data"], json!({ "email": "x@y.com" }));
        assert_eq!(
            backend.calls(),
            vec![
                Call::UpdateAccount(
                    "a1".to_string(),
                    AccountPatch {
                        email: Some("x@y.com".to_string()),
                        ..Default::default()
                    }
                ),
                Call::UpdateProfile(
                    "p1".to_string(),
                    ProfilePatch {
                        email: Some("x@y.com".to_string()),
                        ..Default::default()
                    }
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_name_only_touches_name() {
        let backend = FakeBackend::default();
        run(&backend, json!({ "profileId": "p1", "accountId": "a1", "name": "Ada" })).await;

        assert_eq!(
            backend.calls(),
            vec![
                Call::UpdateAccount(
                    "a1".to_string(),
                    AccountPatch {
                        name: Some("Ada".to_string()),
                        ..Default::default()
                    }
                ),
                Call::UpdateProfile(
                    "p1".to_string(),
                    ProfilePatch {
                        name: Some("Ada".to_string()),
                        ..Default::default()
                    }
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_phone_wins_identifier_in_either_order() {
        for raw in [
            r#"{"profileId":"p1","accountId":"a1","newPhone":"(987) 654-3210","newEmail":"x@y.com"}"#,
            r#"{"profileId":"p1","accountId":"a1","newEmail":"x@y.com","newPhone":"(987) 654-3210"}"#,
        ] {
            let backend = FakeBackend::default();
            let input: Value = serde_json::from_str(raw).unwrap();
            run(&backend, input).await;

            let calls = backend.calls();
            assert_eq!(
                calls[0],
                Call::UpdateAccount(
                    "a1".to_string(),
                    AccountPatch {
                        email: Some("9876543210@phone.local".to_string()),
                        ..Default::default()
                    }
                )
            );
            assert_eq!(
                calls[1],
                Call::UpdateProfile(
                    "p1".to_string(),
                    ProfilePatch {
                        phone: Some("9876543210".to_string()),
                        email: Some("x@y.com".to_string()),
                        name: None,
                    }
                )
            );
        }
    }

    #[tokio::test]
    async fn test_account_failure_skips_profile_update() {
        let backend = FakeBackend {
            fail_account: true,
            ..Default::default()
        };
        let result = run(
            &backend,
            json!({ "profileId": "p1", "accountId": "a1", "newEmail": "x@y.com" }),
        )
        .await;

        assert_eq!(
            result.to_value(),
            json!({
                "ok": false,
                "message": "Failed to update account",
                "detail": { "status": 409, "body": { "message": "user_already_exists" } }
            })
        );
        assert!(!backend
            .calls()
            .iter()
            .any(|c| matches!(c, Call::UpdateProfile(..))));
    }

    #[tokio::test]
    async fn test_profile_failure_reports_updated_account() {
        let backend = FakeBackend {
            fail_profile: true,
            ..Default::default()
        };
        let result = run(
            &backend,
            json!({ "profileId": "p1", "accountId": "a1", "name": "Ada" }),
        )
        .await;

        assert!(!result.ok);
        assert_eq!(result.message.as_deref(), Some("Failed to update profile"));
        assert_eq!(result.account.unwrap()["name"], "Ada");
        assert_eq!(result.detail.unwrap()["status"], 500);
    }

    #[tokio::test]
    async fn test_verified_password_change() {
        let backend = FakeBackend::default();
        let result = run(
            &backend,
            json!({
                "profileId": "p1",
                "accountId": "a1",
                "currentPassword": "old-secret",
                "newPassword": "new-secret",
            }),
        )
        .await;

        assert!(result.ok);
        assert_eq!(result.profile, None);
        assert_eq!(
            backend.calls(),
            vec![
                Call::GetProfile("p1".to_string()),
                Call::CreateSession("old@y.com".to_string(), "old-secret".to_string()),
                Call::DeleteSession("a1".to_string(), "s1".to_string()),
                Call::UpdateAccount(
                    "a1".to_string(),
                    AccountPatch {
                        password: Some("new-secret".to_string()),
                        ..Default::default()
                    }
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_wrong_password_mutates_nothing() {
        let backend = FakeBackend::default();
        let result = run(
            &backend,
            json!({
                "profileId": "p1",
                "accountId": "a1",
                "currentPassword": "guess",
                "newPassword": "new-secret",
                "name": "Ada",
            }),
        )
        .await;

        assert_eq!(
            result.to_value(),
            json!({ "ok": false, "message": "Current password is incorrect" })
        );
        assert!(!backend
            .calls()
            .iter()
            .any(|c| matches!(c, Call::UpdateAccount(..) | Call::UpdateProfile(..))));
    }

    #[tokio::test]
    async fn test_verification_falls_back_to_stored_phone() {
        let backend = FakeBackend {
            stored_profile: json!({ "$id": "p1", "email": "", "phone": "+1 555 0100" }),
            ..Default::default()
        };
        let result = run(
            &backend,
            json!({
                "profileId": "p1",
                "accountId": "a1",
                "currentPassword": "old-secret",
                "verifyCurrentPassword": true,
                "name": "Ada",
            }),
        )
        .await;

        assert!(result.ok);
        assert_eq!(
            backend.calls()[1],
            Call::CreateSession("15550100@phone.local".to_string(), "old-secret".to_string())
        );
    }

    #[tokio::test]
    async fn test_session_for_another_account_is_rejected() {
        let backend = FakeBackend {
            session_user: "someone-else",
            ..Default::default()
        };
        let result = run(
            &backend,
            json!({
                "profileId": "p1",
                "accountId": "a1",
                "currentPassword": "old-secret",
                "name": "Ada",
            }),
        )
        .await;

        assert!(!result.ok);
        assert_eq!(
            result.message.as_deref(),
            Some("Current password does not belong to this account")
        );
        assert!(backend
            .calls()
            .contains(&Call::DeleteSession("someone-else".to_string(), "s1".to_string())));
        assert!(!backend
            .calls()
            .iter()
            .any(|c| matches!(c, Call::UpdateAccount(..))));
    }

    #[tokio::test]
    async fn test_verification_can_be_disabled() {
        let backend = FakeBackend::default();
        let result = run(
            &backend,
            json!({
                "profileId": "p1",
                "accountId": "a1",
                "currentPassword": "anything",
                "verifyCurrentPassword": false,
                "name": "Ada",
            }),
        )
        .await;

        assert!(result.ok);
        assert!(!backend
            .calls()
            .iter()
            .any(|c| matches!(c, Call::GetProfile(_) | Call::CreateSession(..))));
    }

    #[test]
    fn test_stored_login_prefers_email() {
        assert_eq!(
            stored_login(&json!({ "email": " a@b.c ", "phone": "555" })).as_deref(),
            Some("a@b.c")
        );
        assert_eq!(
            stored_login(&json!({ "phone": "(555) 0100" })).as_deref(),
            Some("5550100@phone.local")
        );
        assert_eq!(stored_login(&json!({ "email": null })), None);
    }
}
