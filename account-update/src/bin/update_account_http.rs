//! Account Update Lambda - HTTP endpoint.
//!
//! The request body carries the update as JSON, a JSON string, or a
//! form-encoded `body`/`payload`/`data` field. Failures keep the JSON result
//! shape; the status code mirrors the error kind.

use lambda_http::{run, service_fn, Body, Error, Request, Response};
use serde_json::Value;
use shared::http::{body_text, json_response, outcome_response};
use shared::{
    AccountUpdater, AppwriteClient, Config, EnvVarSource, EventSource, PayloadResolver,
    UpdateResult,
};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    config: Config,
    client: AppwriteClient,
}

async fn handler(state: Arc<AppState>, event: Request) -> Result<Response<Body>, Error> {
    info!("{} {}", event.method(), event.uri().path());

    let payload = PayloadResolver::new()
        .with_source(EventSource(Value::String(body_text(event.body()))))
        .with_source(EnvVarSource::new(state.config.payload_var.as_str()))
        .resolve()
        .await;

    let outcome = AccountUpdater::new(&state.client)
        .execute_payload(payload)
        .await;

    outcome_response(outcome)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            let status = e.status_code();
            let failure = UpdateResult::from_error(&e);
            return run(service_fn(move |_: Request| {
                let response = json_response(status, &failure);
                async move { response }
            }))
            .await;
        }
    };

    let state = Arc::new(AppState {
        client: AppwriteClient::new(&config),
        config,
    });

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
