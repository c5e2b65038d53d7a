use serde_json::{json, Value};
use std::time::Duration;

use crate::cli::utils::{output_error, output_success};
use crate::cli::OutputFormat;
use crate::config;

const TIMEOUT: Duration = Duration::from_secs(5);

pub async fn handle(url: Option<String>, output_format: OutputFormat) -> anyhow::Result<()> {
    let base = url.unwrap_or_else(|| config::config().server.base_url.clone());
    let endpoint = format!("{}/health", base.trim_end_matches('/'));

    let client = reqwest::Client::builder().timeout(TIMEOUT).build()?;
    let response = match client.get(&endpoint).send().await {
        Ok(response) => response,
        Err(e) => {
            output_error(output_format, &format!("{} unreachable: {}", endpoint, e), Some("UNREACHABLE"))?;
            anyhow::bail!("health check failed");
        }
    };

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);

    if status.is_success() {
        output_success(
            output_format,
            &format!("{} is healthy", base),
            Some(json!({ "status": status.as_u16(), "body": body })),
        )
    } else {
        output_error(
            output_format,
            &format!("{} returned {}", endpoint, status),
            Some("UNHEALTHY"),
        )?;
        anyhow::bail!("health check failed")
    }
}
