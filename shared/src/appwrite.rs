//! Appwrite REST client for the identity and document services.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::{debug, error};
use urlencoding::encode;

use crate::models::{AccountPatch, ProfilePatch};
use crate::orchestrator::Backend;
use crate::{Config, Error, Result};

/// Client for the Appwrite users, account and databases endpoints.
#[derive(Debug, Clone)]
pub struct AppwriteClient {
    http_client: reqwest::Client,
    endpoint: String,
    project_id: String,
    api_key: String,
    database_id: String,
    collection_id: String,
}

impl AppwriteClient {
    /// Create a new client from the loaded configuration.
    pub fn new(config: &Config) -> Self {
        Self::with_http_client(reqwest::Client::new(), config)
    }

    pub fn with_http_client(http_client: reqwest::Client, config: &Config) -> Self {
        Self {
            http_client,
            endpoint: config.endpoint.clone(),
            project_id: config.project_id.clone(),
            api_key: config.api_key.clone(),
            database_id: config.database_id.clone(),
            collection_id: config.collection_id.clone(),
        }
    }

    fn document_path(&self, document_id: &str) -> String {
        format!(
            "/databases/{}/collections/{}/documents/{}",
            encode(&self.database_id),
            encode(&self.collection_id),
            encode(document_id)
        )
    }

    /// Request carrying only the project header, as a client app would send.
    fn public_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.endpoint, path))
            .header("x-appwrite-project", &self.project_id)
    }

    /// Request authorized with the admin API key.
    fn admin_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.public_request(method, path)
            .header("x-appwrite-key", &self.api_key)
    }

    async fn send(request: RequestBuilder) -> Result<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or(Value::String(text))
        };

        if !status.is_success() {
            error!("Appwrite responded with {}: {}", status, body);
            return Err(Error::Remote {
                status: status.as_u16(),
                body,
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl Backend for AppwriteClient {
    async fn get_profile(&self, profile_id: &str) -> Result<Value> {
        let path = self.document_path(profile_id);
        Self::send(self.admin_request(Method::GET, &path)).await
    }

    async fn create_session(&self, login: &str, password: &str) -> Result<Value> {
        let request = self
            .public_request(Method::POST, "/account/sessions/email")
            .json(&json!({ "email": login, "password": password }));
        Self::send(request).await
    }

    async fn delete_session(&self, account_id: &str, session_id: &str) -> Result<()> {
        let path = format!("/users/{}/sessions/{}", encode(account_id), encode(session_id));
        Self::send(self.admin_request(Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn update_account(&self, account_id: &str, patch: &AccountPatch) -> Result<Value> {
        // Appwrite exposes one endpoint per attribute; the last response is the freshest record.
        let updates = [
            ("email", &patch.email),
            ("name", &patch.name),
            ("password", &patch.password),
        ];

        let mut account = None;
        for (field, value) in updates {
            let Some(value) = value else { continue };
            debug!("Updating {} of account {}", field, account_id);

            let path = format!("/users/{}/{}", encode(account_id), field);
            let request = self
                .admin_request(Method::PATCH, &path)
                .json(&json!({ field: value }));
            match Self::send(request).await {
                Ok(updated) => account = Some(updated),
                // Earlier attributes are already written; report them with the failure.
                Err(e) if account.is_some() => {
                    return Err(Error::AccountUpdate {
                        source: Box::new(e),
                        account,
                    })
                }
                Err(e) => return Err(e),
            }
        }

        account.ok_or_else(|| Error::Internal("Account patch is empty".to_string()))
    }

    async fn update_profile(&self, profile_id: &str, patch: &ProfilePatch) -> Result<Value> {
        let path = self.document_path(profile_id);
        let request = self
            .admin_request(Method::PATCH, &path)
            .json(&json!({ "data": patch }));
        Self::send(request).await
    }
}
