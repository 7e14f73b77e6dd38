//! Healthcheck command used by container probes.

use anyhow::Result;

use crate::config::Config;

/// Checks whether the configured server answers its health endpoint.
pub async fn healthcheck(config: Config) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("http://{}/health", config.http_addr);

    tracing::debug!("sending healthcheck request to {}", url);
    let response = client.get(&url).send().await?;
    if !response.status().is_success() {
        anyhow::bail!("Bad Status: {}", response.status());
    }

    tracing::info!("OK");
    Ok(())
}
