//! Account Update - script runtime.
//!
//! Reads the request from the payload environment variable, falling back to
//! stdin for a short, bounded wait. Writes exactly one JSON result line to
//! stdout; logs go to stderr.

use std::io::Write;

use shared::{
    AccountUpdater, AppwriteClient, Config, EnvVarSource, PayloadResolver, StreamSource,
    UpdateResult,
};
use tracing::error;
use tracing_subscriber::EnvFilter;

async fn update(config: &Config) -> UpdateResult {
    let payload = PayloadResolver::new()
        .with_source(EnvVarSource::new(config.payload_var.as_str()))
        .with_source(StreamSource::stdin(config.stdin_timeout))
        .resolve()
        .await;

    let client = AppwriteClient::new(config);
    AccountUpdater::new(&client).handle_payload(payload).await
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let result = match Config::from_env() {
        Ok(config) => update(&config).await,
        Err(e) => {
            error!("{}", e);
            UpdateResult::from_error(&e)
        }
    };

    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, &result)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
