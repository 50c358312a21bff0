//! Account Update Lambda - direct invocation.
//!
//! The invoking runtime hands over the request as the event payload, possibly
//! wrapped (`body`, `payload`, `data`) or JSON-encoded. The payload variable
//! from the environment is the fallback. The result object is returned as the
//! invocation result.

use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde_json::Value;
use shared::{
    AccountUpdater, AppwriteClient, Config, EnvVarSource, EventSource, PayloadResolver,
    UpdateResult,
};
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

/// Application state
struct AppState {
    config: Config,
    client: AppwriteClient,
}

impl AppState {
    fn new(config: Config) -> Self {
        let client = AppwriteClient::new(&config);
        Self { config, client }
    }
}

async fn handler(state: Arc<AppState>, event: LambdaEvent<Value>) -> Result<Value, Error> {
    let payload = PayloadResolver::new()
        .with_source(EventSource(event.payload))
        .with_source(EnvVarSource::new(state.config.payload_var.as_str()))
        .resolve()
        .await;

    let result = AccountUpdater::new(&state.client)
        .handle_payload(payload)
        .await;

    Ok(result.to_value())
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
            // Every invocation reports the configuration error and nothing else.
            let failure = UpdateResult::from_error(&e).to_value();
            return run(service_fn(move |_: LambdaEvent<Value>| {
                let failure = failure.clone();
                async move { Ok::<Value, Error>(failure) }
            }))
            .await;
        }
    };

    let state = Arc::new(AppState::new(config));

    run(service_fn(move |event| {
        let state = Arc::clone(&state);
        async move { handler(state, event).await }
    }))
    .await
}
